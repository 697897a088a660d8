//! Errors reported when constructing a pool.
//!
//! Once constructed, a pool never reports errors: exhaustion is signalled by invalid Blocks, and foreign deallocations
//! by a `false` return.

use thiserror::Error;

/// Failure to construct a pool.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum PoolError {
    /// A pool acquiring its own backing Block requires at least one chunk.
    #[error("a pool requires at least one chunk of {chunk_size} bytes")]
    ZeroChunks {
        /// The size of a chunk.
        chunk_size: usize,
    },

    /// The size of the backing Block overflows.
    #[error("{chunk_count} chunks of {chunk_size} bytes overflow the address space")]
    SizeOverflow {
        /// The number of chunks requested.
        chunk_count: usize,
        /// The size of a chunk.
        chunk_size: usize,
    },

    /// The platform could not provide the backing Block.
    #[error("the platform could not allocate {size} bytes aligned on {align}")]
    OutOfMemory {
        /// The number of bytes requested.
        size: usize,
        /// The alignment requested.
        align: usize,
    },

    /// The caller-supplied backing Block does not point anywhere.
    #[error("the backing block is invalid")]
    InvalidBlock,

    /// The caller-supplied backing Block is not suitably aligned for the chunks.
    #[error("the backing block at {address:#x} is not aligned on {align}")]
    MisalignedBlock {
        /// The address of the backing Block.
        address: usize,
        /// The alignment required.
        align: usize,
    },
}
