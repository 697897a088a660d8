//! Block
//!
//! A Block describes a region of memory: where it starts, and how many bytes it spans.
//!
//! A Block is the currency exchanged between allocators and their users. It carries no ownership of its own: whoever
//! holds a Block is responsible for handing it back to the allocator which produced it.

use core::ptr::{self, NonNull};

/// Block
///
/// A `{ pointer, size }` descriptor of a memory region.
///
/// An invalid Block has no pointer, and a size of 0; it is returned by allocators which cannot satisfy a request.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub struct Block {
    pointer: Option<NonNull<u8>>,
    size: usize,
}

impl Block {
    /// Creates a Block spanning `size` bytes from `pointer`.
    pub const fn new(pointer: NonNull<u8>, size: usize) -> Self { Self { pointer: Some(pointer), size } }

    /// Creates an invalid Block.
    pub const fn invalid() -> Self { Self { pointer: None, size: 0 } }

    /// Creates a Block from a raw, possibly null, pointer.
    ///
    /// A null `pointer` results in an invalid Block, regardless of `size`.
    pub fn from_raw(pointer: *mut u8, size: usize) -> Self {
        match NonNull::new(pointer) {
            Some(pointer) => Self::new(pointer, size),
            None => Self::invalid(),
        }
    }

    /// Returns whether the Block points anywhere.
    pub const fn is_valid(&self) -> bool { self.pointer.is_some() }

    /// Returns the pointer to the start of the Block, if valid.
    pub const fn pointer(&self) -> Option<NonNull<u8>> { self.pointer }

    /// Returns the pointer to the start of the Block, or null if invalid.
    pub fn as_ptr(&self) -> *mut u8 {
        self.pointer.map(NonNull::as_ptr).unwrap_or(ptr::null_mut())
    }

    /// Returns the number of bytes spanned by the Block.
    pub const fn size(&self) -> usize { self.size }

    /// Returns the address of the first byte of the Block, or 0 if invalid.
    pub fn begin(&self) -> usize { self.as_ptr() as usize }

    /// Returns the address one past the last byte of the Block, or 0 if invalid.
    pub fn end(&self) -> usize { self.begin() + self.size }

    /// Returns whether `pointer` points within `[begin, end)`.
    ///
    /// An invalid Block contains nothing.
    pub fn contains(&self, pointer: *const u8) -> bool {
        let address = pointer as usize;

        self.is_valid() && self.begin() <= address && address < self.end()
    }

    /// Turns the Block into an invalid Block.
    pub fn invalidate(&mut self) { *self = Self::invalid(); }
}

//  Safety:
//  -   A Block is a mere description of a memory region, it grants no access by itself.
unsafe impl Send for Block {}

//  Safety:
//  -   A Block is a mere description of a memory region, it grants no access by itself.
unsafe impl Sync for Block {}
