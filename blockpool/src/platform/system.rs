//! Backing Blocks from the global system allocator.

use std::{
    alloc::{GlobalAlloc, Layout, System},
    ptr::NonNull,
};

use blockpool_core::Platform;

/// Implementation of the Platform trait, over the system allocator.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemPlatform;

impl SystemPlatform {
    /// Creates an instance.
    pub const fn new() -> Self { Self }
}

impl Platform for SystemPlatform {
    unsafe fn allocate(&self, layout: Layout) -> Option<NonNull<u8>> {
        debug_assert!(layout.size() > 0);

        //  Safety:
        //  -   `layout.size()` is assumed to be non-zero.
        NonNull::new(System.alloc(layout))
    }

    unsafe fn deallocate(&self, pointer: NonNull<u8>, layout: Layout) {
        //  Safety:
        //  -   `pointer` was allocated by `System`, with `layout`, as assumed.
        System.dealloc(pointer.as_ptr(), layout);
    }
}
