//! Platform
//!
//! The Platform trait is used by allocators to acquire their backing Block, and to release it once they are done. By
//! abstracting the underlying platform, it becomes possible to back a pool with the system heap, with pages mapped
//! directly from the OS, or with a bare-metal memory region.

use core::{
    alloc::Layout,
    ptr::NonNull,
};

/// Abstraction of platform specific memory allocation and deallocation.
pub trait Platform {
    /// Allocates a fresh block of memory as per the specified layout.
    ///
    /// May return None if the allocation request cannot be satisfied.
    ///
    /// #   Safety
    ///
    /// The caller may assume that if a pointer is returned then:
    /// -   The number of usable bytes is _greater than or equal_ to `layout.size()`.
    /// -   The pointer is _at least_ aligned to `layout.align()`.
    ///
    /// `allocate` assumes that:
    /// -   `layout.size()` is non-zero.
    unsafe fn allocate(&self, layout: Layout) -> Option<NonNull<u8>>;

    /// Deallocates the supplied block of memory.
    ///
    /// #   Safety
    ///
    /// The caller should no longer reference the memory after calling this function.
    ///
    /// `deallocate` assumes that:
    /// -   `pointer` was allocated by this instance of `Platform`, with `layout` as argument.
    /// -   `pointer` is the value returned by `Platform`, and not an interior pointer.
    unsafe fn deallocate(&self, pointer: NonNull<u8>, layout: Layout);
}
