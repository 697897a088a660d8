//! The backing Block of a pool, and who owns it.

use std::alloc::Layout;

use blockpool_core::{Block, Platform};

use tracing::info;

/// Backing.
///
/// The backing Block of a pool: either acquired from a Platform, and returned to it on drop, or supplied by the caller,
/// and left untouched on drop.
pub(crate) struct Backing<P>
    where
        P: Platform
{
    block: Block,
    owner: Option<(P, Layout)>,
}

impl<P> Backing<P>
    where
        P: Platform
{
    /// Acquires a Block of `layout` from `platform`.
    ///
    /// Returns None if the platform cannot satisfy the request.
    pub(crate) fn acquire(platform: P, layout: Layout) -> Option<Self> {
        debug_assert!(layout.size() > 0);

        //  Safety:
        //  -   `layout.size()` is non-zero.
        let pointer = unsafe { platform.allocate(layout) }?;
        let block = Block::new(pointer, layout.size());

        Some(Self { block, owner: Some((platform, layout)) })
    }

    /// Wraps a caller-supplied Block.
    pub(crate) fn borrow(block: Block) -> Self { Self { block, owner: None } }

    /// Returns the Block.
    pub(crate) fn block(&self) -> Block { self.block }

    /// Returns whether the Block is returned to a Platform on drop.
    pub(crate) fn is_owned(&self) -> bool { self.owner.is_some() }
}

impl<P> Drop for Backing<P>
    where
        P: Platform
{
    fn drop(&mut self) {
        let Some((platform, layout)) = self.owner.take() else { return };
        let Some(pointer) = self.block.pointer() else { return };

        info!(address = self.block.begin(), size = layout.size(), "releasing backing block");

        //  Safety:
        //  -   `pointer` was allocated by `platform`, with `layout`.
        //  -   The pool, and therefore any chunk, is no longer in use.
        unsafe { platform.deallocate(pointer, layout) };

        self.block.invalidate();
    }
}
