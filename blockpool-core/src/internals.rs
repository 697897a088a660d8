//! The internals of blockpool-core.
//!
//! The internals manipulate raw memory; the API wraps them.

mod chunk_list;

pub(crate) use chunk_list::{ChunkList, ChunkNode};

pub use chunk_list::FreeChunks;


#[cfg(test)]
pub(crate) use test::ChunkArena;
