//! Margin
//!
//! A boundary tag, packing the size of a region and whether it is allocated in a single machine word.
//!
//! Allocators layered on top of a pool place a Margin before (header) and/or after (footer) each region, so that
//! neighbouring regions can be identified, and coalesced, by looking at the words surrounding a region.
//!
//! Sizes are always even: bit 0 is reserved for the allocation flag.

use core::{
    mem,
    ptr::{self, NonNull},
};

use super::Block;

/// Margin
///
/// A view over a single word: bit 0 is the allocation flag, the remaining bits the (even) size of the region.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Margin(usize);

impl Margin {
    const ALLOCATED: usize = 1;

    /// Creates a Margin.
    ///
    /// `size` is rounded down to an even number.
    pub const fn new(size: usize, allocated: bool) -> Self {
        let flag = if allocated { Self::ALLOCATED } else { 0 };

        Self((size & !Self::ALLOCATED) | flag)
    }

    /// Creates a Margin from its raw word.
    pub const fn from_value(value: usize) -> Self { Self(value) }

    /// Returns the raw word.
    pub const fn value(&self) -> usize { self.0 }

    /// Returns whether the region is allocated.
    pub const fn is_allocated(&self) -> bool { self.0 & Self::ALLOCATED != 0 }

    /// Returns the size of the region, always even.
    pub const fn size(&self) -> usize { (self.0 >> 1) << 1 }

    /// Sets the size of the region, preserving the allocation flag.
    ///
    /// `size` is rounded down to an even number.
    pub fn set_size(&mut self, size: usize) {
        self.0 = (size & !Self::ALLOCATED) | (self.0 & Self::ALLOCATED);
    }

    /// Marks the region as allocated, preserving the size.
    pub fn set_allocated(&mut self) { self.0 |= Self::ALLOCATED; }

    /// Marks the region as deallocated, preserving the size.
    pub fn set_deallocated(&mut self) { self.0 &= !Self::ALLOCATED; }

    /// Reads the Margin stored at `at`.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `at` is valid for reads of a machine word.
    pub unsafe fn read(at: NonNull<u8>) -> Self { ptr::read_unaligned(at.as_ptr() as *const Margin) }

    /// Writes the Margin at `at`.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `at` is valid for writes of a machine word.
    /// -   Assumes that access to the memory location is exclusive.
    pub unsafe fn write(self, at: NonNull<u8>) { ptr::write_unaligned(at.as_ptr() as *mut Margin, self) }
}

/// BoundaryTag
///
/// Helpers to frame a region with a header Margin at its start and an identical footer Margin at its end.
///
/// The size recorded is the size of the whole region, Margins included.
pub struct BoundaryTag;

impl BoundaryTag {
    /// Size of a single Margin.
    pub const MARGIN_SIZE: usize = mem::size_of::<Margin>();

    /// Number of bytes consumed by the header and footer.
    pub const OVERHEAD: usize = 2 * Self::MARGIN_SIZE;

    /// Writes the header and footer of `region`, returning the Margin written.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `region` is valid, writable, and exclusively accessed.
    /// -   Assumes that `region` is at least `OVERHEAD` bytes.
    pub unsafe fn tag(region: Block, allocated: bool) -> Margin {
        debug_assert!(region.is_valid());
        debug_assert!(region.size() >= Self::OVERHEAD, "{} < {}", region.size(), Self::OVERHEAD);

        let margin = Margin::new(region.size(), allocated);

        margin.write(Self::header_pointer(region));
        margin.write(Self::footer_pointer(region));

        margin
    }

    /// Reads the header of `region`.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `region` was previously tagged.
    pub unsafe fn header(region: Block) -> Margin { Margin::read(Self::header_pointer(region)) }

    /// Reads the footer of `region`.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `region` was previously tagged.
    pub unsafe fn footer(region: Block) -> Margin { Margin::read(Self::footer_pointer(region)) }

    /// Returns the payload of `region`, between header and footer.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `region` is valid, and at least `OVERHEAD` bytes.
    pub unsafe fn payload(region: Block) -> Block {
        let begin = Self::header_pointer(region).as_ptr().add(Self::MARGIN_SIZE);

        Block::from_raw(begin, region.size() - Self::OVERHEAD)
    }

    /// Returns the region whose footer immediately precedes `region`, if `region` does not start `within`.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `region` lies within `within`.
    /// -   Assumes that every region of `within` was tagged.
    pub unsafe fn previous(region: Block, within: Block) -> Option<Block> {
        if region.begin() < within.begin() + Self::OVERHEAD {
            return None;
        }

        let footer = region.as_ptr().sub(Self::MARGIN_SIZE);
        let size = Margin::read(NonNull::new_unchecked(footer)).size();

        debug_assert!(size <= region.begin() - within.begin(), "{} > {}", size, region.begin() - within.begin());

        Some(Block::from_raw(region.as_ptr().sub(size), size))
    }

    /// Returns the region immediately following `region`, if `region` does not end `within`.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `region` lies within `within`.
    /// -   Assumes that every region of `within` was tagged.
    pub unsafe fn next(region: Block, within: Block) -> Option<Block> {
        if region.end() + Self::OVERHEAD > within.end() {
            return None;
        }

        let header = region.as_ptr().add(region.size());
        let size = Margin::read(NonNull::new_unchecked(header)).size();

        debug_assert!(region.end() + size <= within.end(), "{} > {}", region.end() + size, within.end());

        Some(Block::from_raw(header, size))
    }

    //  #   Safety
    //
    //  -   Assumes that `region` is valid.
    unsafe fn header_pointer(region: Block) -> NonNull<u8> {
        debug_assert!(region.is_valid());

        NonNull::new_unchecked(region.as_ptr())
    }

    //  #   Safety
    //
    //  -   Assumes that `region` is valid, and at least `MARGIN_SIZE` bytes.
    unsafe fn footer_pointer(region: Block) -> NonNull<u8> {
        debug_assert!(region.is_valid());

        NonNull::new_unchecked(region.as_ptr().add(region.size() - Self::MARGIN_SIZE))
    }
}
