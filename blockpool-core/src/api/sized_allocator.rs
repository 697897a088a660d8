//! Sized Allocator
//!
//! The contract implemented by every allocator owning a single backing Block for its whole lifetime.
//!
//! Generic containers and smart-pointer factories program against this contract, so that one concrete allocator may
//! be substituted for another without changing call sites.

use core::ptr::NonNull;

use super::Block;

/// SizedAllocator
///
/// An allocator carving allocations out of a single backing `Block`, established at construction.
///
/// Failures are never signalled by panicking:
/// -   An allocation which cannot be satisfied returns an invalid `Block`.
/// -   A deallocation of memory not recognized as belonging to this allocator returns `false`, and leaves the allocator
///     untouched.
pub trait SizedAllocator {
    /// Returns the backing Block.
    fn block(&self) -> Block;

    /// Allocates at least `size` bytes from the backing Block.
    ///
    /// Returns a Block of at least `size` bytes lying within the backing Block, or an invalid Block if the request
    /// cannot be satisfied.
    fn allocate(&self, size: usize) -> Block;

    /// Deallocates `block`.
    ///
    /// Returns true, and invalidates `block`, if the memory was recognized and reclaimed. Returns false otherwise.
    fn deallocate(&self, block: &mut Block) -> bool;

    /// Deallocates the memory pointed to by `pointer`.
    ///
    /// Returns true if the memory was recognized and reclaimed, false otherwise.
    fn deallocate_ptr(&self, pointer: NonNull<u8>) -> bool;

    /// Reclaims every outstanding allocation at once.
    ///
    /// Any Block previously handed out must no longer be used.
    fn deallocate_all(&self) -> bool;

    /// Resets the allocator to its just-constructed state, without releasing the backing Block.
    ///
    /// Any Block previously handed out must no longer be used.
    fn zeroize(&self);

    /// Returns whether `pointer` lies within the backing Block.
    fn contains(&self, pointer: *const u8) -> bool { self.block().contains(pointer) }
}
