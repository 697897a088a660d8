//! The configuration of blockpool-core.
//!
//! The Configuration instance allows adjusting the allocation granularity of a pool to the underlying platform: every
//! chunk size is rounded up to a multiple of the granularity, and every chunk starts on such a boundary.

use core::{
    alloc::Layout,
    mem,
};

use super::PowerOf2;

/// Configuration
///
/// The Configuration instance allows adjusting the allocation granularity of a pool.
pub trait Configuration {
    /// The granularity of chunks.
    ///
    /// The effective granularity is never lower than the alignment of a pointer, as free chunks store a pointer.
    const CHUNK_ALIGNMENT: PowerOf2;
}

/// Default configuration, with a granularity of one machine word.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoolConfiguration;

impl Configuration for PoolConfiguration {
    const CHUNK_ALIGNMENT: PowerOf2 = PowerOf2::align_of::<usize>();
}

/// Properties
///
/// Properties of a given Configuration.
///
/// Work-around for the inability to implement static methods directly on a trait.
pub struct Properties<C>(C);

impl<C> Properties<C>
    where
        C: Configuration
{
    /// Returns the alignment of chunks holding values of type `T`.
    pub const fn chunk_alignment<T>() -> PowerOf2 {
        C::CHUNK_ALIGNMENT
            .max(PowerOf2::align_of::<T>())
            .max(PowerOf2::align_of::<*const u8>())
    }

    /// Returns the size of chunks holding values of type `T`.
    ///
    /// The size is large enough to hold either a `T` or a pointer, rounded up to a multiple of the chunk alignment.
    pub const fn chunk_aligned_size<T>() -> usize {
        let size = mem::size_of::<T>();
        let pointer = mem::size_of::<*const u8>();
        let size = if size >= pointer { size } else { pointer };

        Self::chunk_alignment::<T>().round_up(size)
    }

    /// Returns the layout of a backing Block for `chunk_count` chunks of `T`.
    ///
    /// Returns None if the size overflows.
    pub fn backing_layout<T>(chunk_count: usize) -> Option<Layout> {
        let size = chunk_count.checked_mul(Self::chunk_aligned_size::<T>())?;

        Layout::from_size_align(size, Self::chunk_alignment::<T>().value()).ok()
    }
}

#[cfg(test)]
mod tests {

use super::*;

struct PageConfiguration;

impl Configuration for PageConfiguration {
    const CHUNK_ALIGNMENT: PowerOf2 = unsafe { PowerOf2::new_unchecked(64) };
}

#[repr(align(32))]
struct Wide([u8; 40]);

type WordProperties = Properties<PoolConfiguration>;
type PageProperties = Properties<PageConfiguration>;

const WORD: usize = mem::size_of::<usize>();

#[test]
fn properties_chunk_alignment() {
    assert_eq!(WORD, WordProperties::chunk_alignment::<u8>().value());
    assert_eq!(WORD, WordProperties::chunk_alignment::<usize>().value());
    assert_eq!(32, WordProperties::chunk_alignment::<Wide>().value());

    assert_eq!(64, PageProperties::chunk_alignment::<u8>().value());
    assert_eq!(64, PageProperties::chunk_alignment::<Wide>().value());
}

#[test]
fn properties_chunk_aligned_size() {
    assert_eq!(WORD, WordProperties::chunk_aligned_size::<u8>());
    assert_eq!(WORD, WordProperties::chunk_aligned_size::<usize>());
    assert_eq!(8, WordProperties::chunk_aligned_size::<u64>());
    assert_eq!(WORD * 3, WordProperties::chunk_aligned_size::<[usize; 3]>());
    assert_eq!(64, WordProperties::chunk_aligned_size::<Wide>());

    assert_eq!(64, PageProperties::chunk_aligned_size::<u8>());
    assert_eq!(128, PageProperties::chunk_aligned_size::<[u8; 65]>());
}

#[test]
fn properties_backing_layout() {
    let layout = WordProperties::backing_layout::<u64>(4).unwrap();

    assert_eq!(32, layout.size());
    assert_eq!(WordProperties::chunk_alignment::<u64>().value(), layout.align());

    let layout = PageProperties::backing_layout::<u8>(3).unwrap();

    assert_eq!(192, layout.size());
    assert_eq!(64, layout.align());

    assert!(WordProperties::backing_layout::<u64>(usize::MAX).is_none());
}

}
