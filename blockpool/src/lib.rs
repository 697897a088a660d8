#![deny(missing_docs)]

//! A thread-safe, fixed-chunk, Pool Allocator library.
//!
//! The type `LockingPoolAllocator` carves a single backing `Block` into chunks sized for a type `T`, and serves them
//! to any number of threads, behind a single lock.
//!
//! #   Warning
//!
//! A pool never grows: once all chunks are allocated, further allocations fail until chunks are returned.

mod allocator;
mod backing;
mod error;
mod platform;

pub use allocator::LockingPoolAllocator;
pub use error::PoolError;
pub use platform::SystemPlatform;

#[cfg(target_os = "linux")]
pub use platform::MmapPlatform;

pub use blockpool_core::{
    Block, BoundaryTag, Configuration, Margin, PadObject, Platform, PoolConfiguration, PowerOf2, Properties,
    ReclaimPolicy, SizedAllocator,
};

use backing::Backing;
