//! Memory functions.
//!
//! Low-level helpers shared by the allocators and the inline storage types: copying raw bytes a word at a time, and
//! obtaining the address of a value.

use core::{
    mem::{self, MaybeUninit},
    ptr,
};

/// Returns the address of `value`, as an integer.
pub fn address_of<T: ?Sized>(value: &T) -> usize { value as *const T as *const u8 as usize }

/// Copies `count` bytes from `source` to `destination`.
///
/// The bulk of the copy is performed a machine word at a time, the tail byte by byte. Neither pointer is required to
/// be aligned. The bytes are copied as-is, including uninitialized padding bytes.
///
/// #   Safety
///
/// -   Assumes that `source` is valid for reads of `count` bytes.
/// -   Assumes that `destination` is valid for writes of `count` bytes.
/// -   Assumes that the two ranges do not overlap.
pub unsafe fn copy_bytes(destination: *mut u8, source: *const u8, count: usize) {
    const WORD: usize = mem::size_of::<usize>();

    debug_assert!(
        (destination as usize) + count <= (source as usize) || (source as usize) + count <= (destination as usize),
        "Overlapping copy: {:x} <- {:x} ({} bytes)", destination as usize, source as usize, count);

    let words = count / WORD;

    for index in 0..words {
        let offset = index * WORD;

        //  Safety:
        //  -   `offset + WORD <= count`, hence within both ranges.
        //  -   `MaybeUninit` tolerates padding bytes.
        let word = ptr::read_unaligned(source.add(offset) as *const MaybeUninit<usize>);
        ptr::write_unaligned(destination.add(offset) as *mut MaybeUninit<usize>, word);
    }

    for offset in (words * WORD)..count {
        //  Safety:
        //  -   `offset < count`, hence within both ranges.
        let byte = ptr::read(source.add(offset) as *const MaybeUninit<u8>);
        ptr::write(destination.add(offset) as *mut MaybeUninit<u8>, byte);
    }
}

#[cfg(test)]
mod tests {

use super::*;

#[test]
fn address_of_value() {
    let array = [1u32, 2, 3];

    let base = address_of(&array);

    assert_eq!(base, array.as_ptr() as usize);
    assert_eq!(base + 4, address_of(&array[1]));
    assert_eq!(base + 8, address_of(&array[2]));
}

#[test]
fn copy_bytes_whole_words() {
    let source: [u8; 16] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16];
    let mut destination = [0u8; 16];

    //  Safety:
    //  -   Both arrays are 16 bytes, and distinct.
    unsafe { copy_bytes(destination.as_mut_ptr(), source.as_ptr(), 16) };

    assert_eq!(source, destination);
}

#[test]
fn copy_bytes_with_tail() {
    let source: [u8; 11] = [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
    let mut destination = [0xfeu8; 13];

    //  Safety:
    //  -   11 bytes fit within both arrays, which are distinct.
    unsafe { copy_bytes(destination.as_mut_ptr(), source.as_ptr(), 11) };

    assert_eq!(&source[..], &destination[..11]);
    assert_eq!(&[0xfeu8, 0xfe][..], &destination[11..]);
}

#[test]
fn copy_bytes_unaligned() {
    let source: [u8; 12] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11];
    let mut destination = [0u8; 12];

    //  Safety:
    //  -   9 bytes starting at offset 1, resp. 3, fit within both arrays.
    unsafe { copy_bytes(destination.as_mut_ptr().add(3), source.as_ptr().add(1), 9) };

    assert_eq!([0, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9], destination);
}

#[test]
fn copy_bytes_nothing() {
    let source = [7u8; 4];
    let mut destination = [0u8; 4];

    //  Safety:
    //  -   0 bytes are always valid.
    unsafe { copy_bytes(destination.as_mut_ptr(), source.as_ptr(), 0) };

    assert_eq!([0u8; 4], destination);
}

}
