//! Backing Blocks mapped directly from the Linux kernel.

use core::{alloc::Layout, ptr};

use blockpool_core::{Platform, PowerOf2};

/// Implementation of the Platform trait, for Linux.
///
/// Each backing Block is a private anonymous mapping of its own, rounded up to whole pages, and unmapped on
/// deallocation.
#[derive(Clone, Copy, Debug, Default)]
pub struct MmapPlatform;

impl MmapPlatform {
    /// Creates an instance.
    pub const fn new() -> Self { Self }

    /// Returns the size of a page.
    pub fn page_size() -> PowerOf2 {
        //  Safety:
        //  -   `sysconf` has no pre-condition.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };

        //  The smallest page size in use, should the query fail.
        const FALLBACK: PowerOf2 = unsafe { PowerOf2::new_unchecked(4096) };

        if size <= 0 {
            return FALLBACK;
        }

        PowerOf2::new(size as usize).unwrap_or(FALLBACK)
    }
}

impl Platform for MmapPlatform {
    unsafe fn allocate(&self, layout: Layout) -> Option<ptr::NonNull<u8>> {
        let page_size = Self::page_size();
        let size = page_size.round_up(layout.size());

        if layout.align() <= page_size.value() {
            return mmap_allocate(size);
        }

        //  Safety:
        //  -   `layout.align()` is a power of 2, as guaranteed by `Layout`.
        let alignment = PowerOf2::new_unchecked(layout.align());

        mmap_over(size, alignment)
    }

    unsafe fn deallocate(&self, pointer: ptr::NonNull<u8>, layout: Layout) {
        let size = Self::page_size().round_up(layout.size());

        munmap_deallocate(pointer.as_ptr(), size);
    }
}

//  Attempts to allocate the required size, aligned on `alignment`.
//
//  Ensures the alignment is met by over-allocating then trimming front and back.
//
//  `size` is assumed to be a multiple of the page size, and `alignment` greater than the page size.
fn mmap_over(size: usize, alignment: PowerOf2) -> Option<ptr::NonNull<u8>> {
    let over_size = size.checked_add(alignment.value())?;
    let front_pointer = mmap_allocate(over_size)?;

    let front_size = (alignment.value() - (front_pointer.as_ptr() as usize) % alignment) % alignment;
    let back_size = over_size - size - front_size;

    debug_assert!(front_size < alignment.value(), "{} >= {}", front_size, alignment.value());
    debug_assert!(front_size + size + back_size == over_size,
        "{} + {} + {} != {}", front_size, size, back_size, over_size);

    //  Safety:
    //  -   `front_size` is less than `over_size`, hence the result is within the allocated block.
    let aligned_pointer = unsafe { front_pointer.as_ptr().add(front_size) };

    debug_assert!(aligned_pointer as usize % alignment == 0,
        "{:x} not {:x}-aligned!", aligned_pointer as usize, alignment.value());

    //  Safety:
    //  -   `front_size + size` is less than or equal to `over_size`, hence the result is within the allocated block,
    //      or pointing to its end.
    let back_pointer = unsafe { aligned_pointer.add(size) };

    if front_size > 0 {
        //  Safety:
        //  -   `front_pointer` points to a `mmap`ed area of at least `front_size` bytes.
        //  -   `[front_pointer, front_pointer + front_size)` is no longer in use.
        unsafe { munmap_deallocate(front_pointer.as_ptr(), front_size) };
    }

    if back_size > 0 {
        //  Safety:
        //  -   `back_pointer` points to a `mmap`ed area of at least `back_size` bytes.
        //  -   `[back_pointer, back_pointer + back_size)` is no longer in use.
        unsafe { munmap_deallocate(back_pointer, back_size) };
    }

    ptr::NonNull::new(aligned_pointer)
}

//  Wrapper around `mmap`.
//
//  Returns a pointer to `size` bytes of memory, aligned on a page boundary.
fn mmap_allocate(size: usize) -> Option<ptr::NonNull<u8>> {
    let length = size;
    let prot = libc::PROT_READ | libc::PROT_WRITE;
    let flags = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

    //  No specific address hint.
    let addr = ptr::null_mut();
    //  When used in conjunction with MAP_ANONYMOUS, fd is mandated to be -1 on some implementations.
    let fd = -1;
    //  When used in conjunction with MAP_ANONYMOUS, offset is mandated to be 0 on some implementations.
    let offset = 0;

    //  Safety:
    //  -   `addr`, `fd`, and `offset` are suitable for MAP_ANONYMOUS.
    let result = unsafe { libc::mmap(addr, length, prot, flags, fd, offset) };

    let result = if result != libc::MAP_FAILED { result as *mut u8 } else { ptr::null_mut() };
    ptr::NonNull::new(result)
}

//  Wrapper around `munmap`.
//
//  #   Panics
//
//  If `munmap` returns a non-0 result.
//
//  #   Safety
//
//  -   Assumes that `addr` points to a `mmap`ed area of at least `size` bytes.
//  -   Assumes that the range `[addr, addr + size)` is no longer in use.
unsafe fn munmap_deallocate(addr: *mut u8, size: usize) {
    let result = libc::munmap(addr as *mut libc::c_void, size);
    assert!(result == 0, "Could not munmap {:x}, {}: {}", addr as usize, size, result);
}
