//! Chunk Pool
//!
//! The engine of pool allocators: a single backing Block carved into fixed-size chunks, the free ones linked together
//! through their own first bytes.
//!
//! A ChunkPool is not synchronized; it is meant to be wrapped, for example behind a lock.

use core::{mem, ptr::NonNull};

use crate::{
    internals::{ChunkList, ChunkNode, FreeChunks},
    PowerOf2,
    utils,
};

use super::Block;

/// ReclaimPolicy
///
/// The strategy used to return a freed chunk to the list of free chunks.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum ReclaimPolicy {
    /// The chunk is pushed at the head of the list, in O(1).
    ///
    /// The list of free chunks is unordered.
    #[default]
    Constant,
    /// The chunk is spliced in front of the first free chunk with a greater address, in O(free chunks).
    ///
    /// The list of free chunks stays sorted by address, as long as every chunk is reclaimed with this policy, and
    /// chunks are then handed out in address order. Reclaiming a chunk which is already free is detected, and refused.
    Sorted,
}

/// ChunkPool
///
/// Fixed-size chunks carved out of a single backing Block.
///
/// Every chunk is either free, and linked in the list of free chunks, or allocated, and opaque to the pool.
pub struct ChunkPool {
    block: Block,
    chunk_size: usize,
    free: ChunkList,
}

impl ChunkPool {
    /// Creates a pool carving `block` into chunks of `chunk_size` bytes.
    ///
    /// The trailing bytes of `block`, if any, are never handed out. A `block` too small for a single chunk results in
    /// a pool which is permanently exhausted.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `block`, if valid, is readable, writable, and exclusively accessed through the pool for the
    ///     lifetime of the pool.
    /// -   Assumes that `block`, if valid, is aligned for a pointer.
    /// -   Assumes that `chunk_size` is at least the size of a pointer, and a multiple of its alignment.
    pub unsafe fn new(block: Block, chunk_size: usize) -> Self {
        debug_assert!(chunk_size >= mem::size_of::<ChunkNode>(),
            "Chunk too small: {} < {}", chunk_size, mem::size_of::<ChunkNode>());
        debug_assert!(chunk_size % PowerOf2::align_of::<ChunkNode>() == 0,
            "Chunk size misaligned: {}", chunk_size);
        debug_assert!(block.pointer()
            .map(|pointer| utils::is_sufficiently_aligned_for(pointer, PowerOf2::align_of::<ChunkNode>()))
            .unwrap_or(true));

        let mut pool = Self { block, chunk_size, free: ChunkList::default() };
        pool.initialize();

        pool
    }

    /// Returns the backing Block.
    pub fn block(&self) -> Block { self.block }

    /// Returns the size of a chunk.
    pub fn chunk_size(&self) -> usize { self.chunk_size }

    /// Returns the number of chunks carved out of the backing Block.
    pub fn chunk_count(&self) -> usize { self.block.size() / self.chunk_size }

    /// Returns whether `pointer` lies within the backing Block.
    pub fn contains(&self, pointer: *const u8) -> bool { self.block.contains(pointer) }

    /// Returns whether `pointer` points to the start of a chunk.
    ///
    /// This is a structural check only; it cannot tell whether the chunk is currently allocated.
    pub fn is_chunk_ptr(&self, pointer: *const u8) -> bool {
        self.contains(pointer) && self.is_within_chunks(pointer)
            && (pointer as usize - self.block.begin()) % self.chunk_size == 0
    }

    /// Returns whether no chunk is free.
    pub fn is_exhausted(&self) -> bool { self.free.is_empty() }

    /// Returns the number of free chunks, in O(free chunks).
    pub fn free_chunk_count(&self) -> usize { self.free.iter().count() }

    /// Returns an iterator over the free chunks, in the order they would be handed out.
    pub fn free_chunks(&self) -> FreeChunks<'_> { self.free.iter() }

    /// Links every chunk, in address order, into the list of free chunks.
    ///
    /// Any chunk previously handed out must no longer be used.
    pub fn initialize(&mut self) {
        let count = self.chunk_count();

        match self.block.pointer() {
            //  Safety:
            //  -   `count` chunks fit within the block, which is exclusively accessed through the pool.
            //  -   The block, and chunk size, are suitably aligned, as assumed at construction.
            Some(begin) if count > 0 => unsafe { self.free.thread(begin, self.chunk_size, count) },
            _ => self.free.clear(),
        }
    }

    /// Allocates a chunk, if `size` fits within a chunk and a chunk is free.
    ///
    /// Returns an invalid Block otherwise.
    pub fn allocate(&mut self, size: usize) -> Block {
        if size > self.chunk_size {
            return Block::invalid();
        }

        match self.free.pop() {
            Some(node) => Block::new(node.cast(), self.chunk_size),
            None => Block::invalid(),
        }
    }

    /// Deallocates the chunk described by `block`, invalidating `block` on success.
    ///
    /// Returns false, leaving the pool untouched, if `block` is not exactly a chunk of this pool, or if the `Sorted`
    /// policy finds it already free.
    pub fn deallocate(&mut self, block: &mut Block, policy: ReclaimPolicy) -> bool {
        if block.size() != self.chunk_size {
            return false;
        }

        let Some(pointer) = block.pointer() else { return false };

        if !self.deallocate_ptr(pointer, policy) {
            return false;
        }

        block.invalidate();

        true
    }

    /// Deallocates the chunk starting at `pointer`.
    ///
    /// Returns false, leaving the pool untouched, if `pointer` is not the start of a chunk of this pool, or if the
    /// `Sorted` policy finds it already free.
    pub fn deallocate_ptr(&mut self, pointer: NonNull<u8>, policy: ReclaimPolicy) -> bool {
        if !self.is_chunk_ptr(pointer.as_ptr()) {
            return false;
        }

        match policy {
            ReclaimPolicy::Constant => {
                //  Safety:
                //  -   `pointer` is a chunk of this pool, assumed to be allocated, and thus exclusively accessed.
                unsafe { self.free.push(pointer) };

                true
            },
            ReclaimPolicy::Sorted => {
                let block = &self.block;
                let within = |node: NonNull<ChunkNode>| block.contains(node.as_ptr() as *const u8);

                //  Safety:
                //  -   `pointer` is a chunk of this pool, either allocated or linked.
                unsafe { self.free.insert_sorted(pointer, within) }
            },
        }
    }

    //  Returns whether `pointer` is before the trailing bytes of the block which do not form a whole chunk.
    fn is_within_chunks(&self, pointer: *const u8) -> bool {
        (pointer as usize) < self.block.begin() + self.chunk_count() * self.chunk_size
    }
}

//  Safety:
//  -   The pool exclusively manages the memory of its backing Block, from whichever thread it is used.
unsafe impl Send for ChunkPool {}

// mod tests
