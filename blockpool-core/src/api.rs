//! The API of blockpool-core.

mod block;
mod chunk_pool;
mod configuration;
mod margin;
mod pad_object;
mod platform;
mod sized_allocator;

pub use block::Block;
pub use chunk_pool::{ChunkPool, ReclaimPolicy};
pub use configuration::{Configuration, PoolConfiguration, Properties};
pub use margin::{BoundaryTag, Margin};
pub use pad_object::PadObject;
pub use platform::Platform;
pub use sized_allocator::SizedAllocator;

pub use crate::internals::FreeChunks;
pub use crate::utils::PowerOf2;
