//! Pad Object
//!
//! A cache-line of inline storage, able to carry any small value without a heap allocation.
//!
//! Job delegates and events embed a PadObject to attach a small context to themselves, while keeping their own size
//! fixed to a multiple of the cache-line; arrays of them never share a cache-line across threads.
//!
//! The layout is a fixed ABI shared by producers and consumers:
//!
//! -   Byte 0 is the dirty sentinel, non-zero when the PadObject holds a value.
//! -   Bytes 1 to 63 hold the raw bytes of the value.
//!
//! No record of the type of the value is kept: retrieving a value as a different type than it was assigned as is
//! undefined behavior.

use core::{
    fmt,
    mem::{self, MaybeUninit},
};

use crate::memory;

//  Number of bytes following the dirty sentinel.
const PAYLOAD_SIZE: usize = 63;

/// PadObject
///
/// 64 bytes of inline storage for a single value of a `Copy` type of at most 63 bytes.
///
/// Copying a PadObject copies all 64 bytes; the source retains its content.
#[repr(C, align(64))]
#[derive(Clone, Copy)]
pub struct PadObject {
    dirty: u8,
    payload: [MaybeUninit<u8>; PAYLOAD_SIZE],
}

impl PadObject {
    /// Size, in bytes, of a PadObject.
    pub const SIZE: usize = 64;

    /// Maximum size, in bytes, of a value stored in a PadObject.
    pub const CAPACITY: usize = PAYLOAD_SIZE;

    /// Creates a clear instance.
    pub const fn new() -> Self { Self { dirty: 0, payload: [MaybeUninit::new(0); PAYLOAD_SIZE] } }

    /// Returns whether a value was assigned since construction, or the last `clear`.
    pub fn is_dirty(&self) -> bool { self.dirty != 0 }

    /// Zeroes all 64 bytes, dirty sentinel included.
    pub fn clear(&mut self) { *self = Self::new(); }

    /// Stores `value`, overwriting any previous value.
    ///
    /// #   Panics
    ///
    /// If `T` is larger than `CAPACITY` bytes.
    pub fn assign_data<T: Copy>(&mut self, value: T) {
        assert!(mem::size_of::<T>() <= Self::CAPACITY,
            "Payload too large: {} > {}", mem::size_of::<T>(), Self::CAPACITY);

        //  Safety:
        //  -   `value` is readable for `size_of::<T>()` bytes.
        //  -   `payload` is writable for `CAPACITY` bytes, which is no less than `size_of::<T>()`.
        //  -   `value` is a local, distinct from `payload`.
        unsafe {
            memory::copy_bytes(
                self.payload.as_mut_ptr() as *mut u8,
                &value as *const T as *const u8,
                mem::size_of::<T>());
        }

        self.dirty = 1;
    }

    /// Retrieves the stored value.
    ///
    /// #   Panics
    ///
    /// If `T` is larger than `CAPACITY` bytes.
    ///
    /// #   Safety
    ///
    /// -   Assumes that the last value assigned was of type `T`, or, if none was, that all zeroes is a valid `T`.
    pub unsafe fn retrieve_data<T: Copy>(&self) -> T {
        assert!(mem::size_of::<T>() <= Self::CAPACITY,
            "Payload too large: {} > {}", mem::size_of::<T>(), Self::CAPACITY);

        let mut value = MaybeUninit::<T>::uninit();

        //  Safety:
        //  -   `payload` is readable for `CAPACITY` bytes, which is no less than `size_of::<T>()`.
        //  -   `value` is writable for `size_of::<T>()` bytes.
        //  -   `value` is a local, distinct from `payload`.
        memory::copy_bytes(
            value.as_mut_ptr() as *mut u8,
            self.payload.as_ptr() as *const u8,
            mem::size_of::<T>());

        //  Safety:
        //  -   The bytes are those of a `T`, as assumed.
        value.assume_init()
    }

    /// Retrieves the stored value, if any.
    ///
    /// #   Safety
    ///
    /// -   Assumes that the last value assigned, if any, was of type `T`.
    pub unsafe fn try_retrieve_data<T: Copy>(&self) -> Option<T> {
        if self.is_dirty() { Some(self.retrieve_data()) } else { None }
    }

    /// Invokes `fun` on the stored value, then stores the possibly modified value back.
    ///
    /// #   Safety
    ///
    /// -   Assumes that the last value assigned was of type `T`.
    pub unsafe fn with_data_mut<T, R, F>(&mut self, fun: F) -> R
        where
            T: Copy,
            F: FnOnce(&mut T) -> R,
    {
        let mut value = self.retrieve_data::<T>();

        let result = fun(&mut value);

        self.assign_data(value);

        result
    }
}

impl Default for PadObject {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for PadObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PadObject").field("dirty", &self.is_dirty()).finish()
    }
}
