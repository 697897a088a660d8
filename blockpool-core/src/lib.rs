#![no_std]

#![deny(missing_docs)]

//! Building blocks for fixed-chunk pool allocators.
//!
//! blockpool-core is a set of building blocks to build pool allocators, and the types exchanged with them. It contains:
//! -   A `Block` type, the `{ pointer, size }` currency passed between allocators and their users.
//! -   A `SizedAllocator` trait, the contract every allocator owning a single backing `Block` implements.
//! -   A `ChunkPool`, the unsynchronized engine carving a `Block` into fixed-size chunks.
//! -   A `Margin` boundary tag, for allocators layering headers and footers on top of a pool.
//! -   A `PadObject`, a cache-line of inline storage for small payloads.

mod api;
mod internals;
mod utils;

pub mod memory;

pub use api::*;
