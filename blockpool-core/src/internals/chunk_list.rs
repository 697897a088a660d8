//! The intrusive list of free chunks.
//!
//! Whilst allocated, the content of a chunk is purely in the hands of the user. Whilst free, however, the first bytes
//! of the chunk are reused to store the address of the next free chunk.
//!
//! Note: ChunkNodes are never _constructed_, instead raw memory is reinterpreted as nodes.

use core::{
    marker::PhantomData,
    ptr::{self, NonNull},
};

use crate::{PowerOf2, utils};

/// ChunkNode.
///
/// The header of a free chunk.
#[repr(C)]
pub(crate) struct ChunkNode {
    next: Option<NonNull<ChunkNode>>,
}

impl ChunkNode {
    /// In-place constructs a `ChunkNode`, linked to `next`.
    ///
    /// #   Safety
    ///
    /// -   Assumes that access to the memory location is exclusive.
    /// -   Assumes that there is sufficient memory available.
    /// -   Assumes that the pointer is correctly aligned.
    #[allow(clippy::cast_ptr_alignment)]
    pub(crate) unsafe fn initialize(at: NonNull<u8>, next: Option<NonNull<ChunkNode>>) -> NonNull<ChunkNode> {
        debug_assert!(utils::is_sufficiently_aligned_for(at, PowerOf2::align_of::<ChunkNode>()));

        //  Safety:
        //  -   `at` is assumed to be sufficiently aligned.
        let ptr = at.as_ptr() as *mut ChunkNode;

        //  Safety:
        //  -   Access to the memory location is exclusive.
        //  -   `ptr` is assumed to be sufficiently sized.
        ptr::write(ptr, ChunkNode { next });

        at.cast()
    }

    //  Returns the successor of `node`.
    //
    //  #   Safety
    //
    //  -   Assumes that `node` points to an initialized node.
    unsafe fn next(node: NonNull<ChunkNode>) -> Option<NonNull<ChunkNode>> { (*node.as_ptr()).next }

    //  Sets the successor of `node`.
    //
    //  #   Safety
    //
    //  -   Assumes that `node` points to an initialized node, exclusively accessed.
    unsafe fn set_next(node: NonNull<ChunkNode>, next: Option<NonNull<ChunkNode>>) { (*node.as_ptr()).next = next; }
}

/// ChunkList.
///
/// A singly-linked list of free chunks, threaded through the chunks themselves.
///
/// The list does not own the chunks; its owner guarantees that every linked node remains valid, and is exclusively
/// accessed through the list.
#[derive(Default)]
pub(crate) struct ChunkList {
    head: Option<NonNull<ChunkNode>>,
}

impl ChunkList {
    /// Returns whether the list is empty, or not.
    pub(crate) fn is_empty(&self) -> bool { self.head.is_none() }

    /// Returns the head of the list, if any.
    pub(crate) fn peek(&self) -> Option<NonNull<ChunkNode>> { self.head }

    /// Empties the list, leaving the chunks untouched.
    pub(crate) fn clear(&mut self) { self.head = None; }

    /// Rebuilds the list from `count` contiguous chunks of `chunk_size` bytes starting at `begin`.
    ///
    /// Chunk `i` links to chunk `i + 1`; the last chunk links to nothing; the head is chunk 0.
    ///
    /// #   Safety
    ///
    /// -   Assumes that access to the `count * chunk_size` bytes starting at `begin` is exclusive.
    /// -   Assumes that `begin` and `chunk_size` are suitably aligned for a `ChunkNode`.
    /// -   Assumes that `chunk_size` is large enough for a `ChunkNode`.
    pub(crate) unsafe fn thread(&mut self, begin: NonNull<u8>, chunk_size: usize, count: usize) {
        let mut next = None;

        for index in (0..count).rev() {
            //  Safety:
            //  -   `index * chunk_size` is within the `count * chunk_size` bytes starting at `begin`.
            let at = NonNull::new_unchecked(begin.as_ptr().add(index * chunk_size));

            next = Some(ChunkNode::initialize(at, next));
        }

        self.head = next;
    }

    /// Pops the head of the list, if any.
    pub(crate) fn pop(&mut self) -> Option<NonNull<ChunkNode>> {
        let result = self.head?;

        //  Safety:
        //  -   Non-null, and valid instance.
        self.head = unsafe { ChunkNode::next(result) };

        Some(result)
    }

    /// Prepends the chunk at `chunk` to the head of the list.
    ///
    /// #   Safety
    ///
    /// -   Assumes that access to the chunk is exclusive, and that it is not already linked.
    /// -   Assumes that the chunk is suitably sized and aligned for a `ChunkNode`.
    pub(crate) unsafe fn push(&mut self, chunk: NonNull<u8>) {
        let node = ChunkNode::initialize(chunk, self.head);

        self.head = Some(node);
    }

    /// Inserts the chunk at `chunk` in front of the first node with a greater address.
    ///
    /// If the list is sorted by increasing addresses, it remains sorted.
    ///
    /// Returns false, without modifying the list, if `chunk` is found to be already linked on the way.
    ///
    /// #   Panics
    ///
    /// If the walk reaches a node for which `within` returns false.
    ///
    /// #   Safety
    ///
    /// -   Assumes that access to the chunk is exclusive, unless already linked.
    /// -   Assumes that the chunk is suitably sized and aligned for a `ChunkNode`.
    pub(crate) unsafe fn insert_sorted<F>(&mut self, chunk: NonNull<u8>, within: F) -> bool
        where
            F: Fn(NonNull<ChunkNode>) -> bool,
    {
        let address = chunk.as_ptr() as usize;

        let mut current = match self.head {
            Some(head) if (head.as_ptr() as usize) < address => head,
            Some(head) if (head.as_ptr() as usize) == address => return false,
            _ => {
                self.push(chunk);
                return true;
            },
        };

        loop {
            assert!(within(current), "Free list escaped its block at {:x}", current.as_ptr() as usize);

            //  Safety:
            //  -   `current` is linked, hence initialized.
            let next = ChunkNode::next(current);

            match next {
                Some(node) if (node.as_ptr() as usize) < address => current = node,
                Some(node) if (node.as_ptr() as usize) == address => return false,
                _ => {
                    let node = ChunkNode::initialize(chunk, next);

                    //  Safety:
                    //  -   `current` is linked, and accessed exclusively through this list.
                    ChunkNode::set_next(current, Some(node));

                    return true;
                },
            }
        }
    }

    /// Returns an iterator over the chunks, in list order.
    pub(crate) fn iter(&self) -> FreeChunks<'_> { FreeChunks { next: self.head, _marker: PhantomData } }
}

/// FreeChunks.
///
/// An iterator over the addresses of free chunks, in list order.
pub struct FreeChunks<'a> {
    next: Option<NonNull<ChunkNode>>,
    _marker: PhantomData<&'a ChunkList>,
}

impl<'a> Iterator for FreeChunks<'a> {
    type Item = NonNull<u8>;

    fn next(&mut self) -> Option<NonNull<u8>> {
        let current = self.next?;

        //  Safety:
        //  -   `current` is linked, and the list is borrowed for the lifetime of the iterator.
        self.next = unsafe { ChunkNode::next(current) };

        Some(current.cast())
    }
}

// mod tests
