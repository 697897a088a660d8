//! Allocator

use core::{
    fmt,
    marker::PhantomData,
    ptr::NonNull,
};

use blockpool_core::{Block, ChunkPool, Configuration, PoolConfiguration, Properties, ReclaimPolicy, SizedAllocator};
use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::{Backing, Platform, PoolError, SystemPlatform};

/// Locking Pool Allocator.
///
/// Serves chunks of `CHUNK_ALIGNED_SIZE` bytes, large enough for a `T`, out of a single backing `Block`.
///
/// All operations touching the list of free chunks are serialized behind a single lock; the lock is only held for the
/// duration of the operation, never while the user accesses an allocated chunk.
///
/// The backing `Block` is either acquired from a `Platform` at construction, and returned to it on drop, or supplied
/// by the caller.
pub struct LockingPoolAllocator<T, C = PoolConfiguration, P = SystemPlatform>
    where
        P: Platform
{
    state: Mutex<State>,
    backing: Backing<P>,
    _marker: PhantomData<fn(T, C) -> (T, C)>,
}

impl<T> LockingPoolAllocator<T> {
    /// Creates a pool of `chunk_count` chunks, acquired from the system allocator.
    ///
    /// Freed chunks are reclaimed in constant time.
    pub fn new(chunk_count: usize) -> Result<Self, PoolError> {
        Self::with_platform(SystemPlatform::new(), chunk_count, ReclaimPolicy::default())
    }

    /// Creates a pool over a caller-supplied `block`.
    ///
    /// The trailing bytes of `block` which do not form a whole chunk are never handed out; a `block` too small for a
    /// single chunk results in a permanently exhausted pool.
    ///
    /// Freed chunks are reclaimed in constant time.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `block` is readable, writable, and exclusively accessed through the pool, for the lifetime of
    ///     the pool.
    pub unsafe fn from_block(block: Block) -> Result<Self, PoolError> {
        Self::from_block_with_policy(block, ReclaimPolicy::default())
    }
}

impl<T, C, P> LockingPoolAllocator<T, C, P>
    where
        C: Configuration,
        P: Platform,
{
    /// Size of a chunk.
    pub const CHUNK_ALIGNED_SIZE: usize = Properties::<C>::chunk_aligned_size::<T>();

    /// Creates a pool of `chunk_count` chunks, acquired from `platform`.
    ///
    /// `policy` is the default reclaim policy of deallocations.
    pub fn with_platform(platform: P, chunk_count: usize, policy: ReclaimPolicy) -> Result<Self, PoolError> {
        let chunk_size = Self::CHUNK_ALIGNED_SIZE;

        if chunk_count == 0 {
            return Err(PoolError::ZeroChunks { chunk_size });
        }

        let size = chunk_count.checked_mul(chunk_size)
            .ok_or(PoolError::SizeOverflow { chunk_count, chunk_size })?;

        Self::with_size(platform, size, policy)
    }

    /// Creates a pool of at least `size` bytes, acquired from `platform`.
    ///
    /// `size` is rounded down to a whole number of chunks. `policy` is the default reclaim policy of deallocations.
    pub fn with_size(platform: P, size: usize, policy: ReclaimPolicy) -> Result<Self, PoolError> {
        let chunk_size = Self::CHUNK_ALIGNED_SIZE;
        let chunk_count = size / chunk_size;

        if chunk_count == 0 {
            return Err(PoolError::ZeroChunks { chunk_size });
        }

        let layout = Properties::<C>::backing_layout::<T>(chunk_count)
            .ok_or(PoolError::SizeOverflow { chunk_count, chunk_size })?;

        let backing = Backing::acquire(platform, layout)
            .ok_or(PoolError::OutOfMemory { size: layout.size(), align: layout.align() })?;

        Ok(Self::assemble(backing, policy))
    }

    /// Creates a pool over a caller-supplied `block`.
    ///
    /// The trailing bytes of `block` which do not form a whole chunk are never handed out; a `block` too small for a
    /// single chunk results in a permanently exhausted pool.
    ///
    /// `policy` is the default reclaim policy of deallocations.
    ///
    /// #   Safety
    ///
    /// -   Assumes that `block` is readable, writable, and exclusively accessed through the pool, for the lifetime of
    ///     the pool.
    pub unsafe fn from_block_with_policy(block: Block, policy: ReclaimPolicy) -> Result<Self, PoolError> {
        let Some(pointer) = block.pointer() else { return Err(PoolError::InvalidBlock) };

        let align = Properties::<C>::chunk_alignment::<T>();
        let address = pointer.as_ptr() as usize;

        if address % align != 0 {
            return Err(PoolError::MisalignedBlock { address, align: align.value() });
        }

        Ok(Self::assemble(Backing::borrow(block), policy))
    }

    /// Returns the size of a chunk, `CHUNK_ALIGNED_SIZE`.
    pub fn chunk_size(&self) -> usize { Self::CHUNK_ALIGNED_SIZE }

    /// Returns the number of chunks carved out of the backing Block.
    pub fn chunk_count(&self) -> usize { self.backing.block().size() / Self::CHUNK_ALIGNED_SIZE }

    /// Returns whether the backing Block will be released by the pool, on drop.
    pub fn owns_block(&self) -> bool { self.backing.is_owned() }

    /// Returns whether `pointer` points to the start of a chunk.
    ///
    /// This is a structural check only; it cannot tell whether the chunk is currently allocated.
    pub fn is_chunk_ptr(&self, pointer: *const u8) -> bool {
        let block = self.backing.block();

        if !block.contains(pointer) {
            return false;
        }

        let offset = pointer as usize - block.begin();

        offset < self.chunk_count() * Self::CHUNK_ALIGNED_SIZE && offset % Self::CHUNK_ALIGNED_SIZE == 0
    }

    /// Allocates a chunk.
    ///
    /// Returns an invalid Block if no chunk is free.
    pub fn allocate_chunk(&self) -> Block { self.allocate(Self::CHUNK_ALIGNED_SIZE) }

    /// Deallocates `block`, as per `policy`.
    ///
    /// Returns true, and invalidates `block`, if `block` is exactly a chunk of this pool and was reclaimed. Returns
    /// false, leaving the pool untouched, otherwise.
    pub fn deallocate_with(&self, block: &mut Block, policy: ReclaimPolicy) -> bool {
        let address = block.begin();
        let result = self.state.lock().pool.deallocate(block, policy);

        self.trace_deallocation(address, policy, result);

        result
    }

    /// Deallocates the chunk starting at `pointer`, as per `policy`.
    ///
    /// Returns true if `pointer` is the start of a chunk of this pool and was reclaimed. Returns false, leaving the
    /// pool untouched, otherwise.
    pub fn deallocate_ptr_with(&self, pointer: NonNull<u8>, policy: ReclaimPolicy) -> bool {
        let result = self.state.lock().pool.deallocate_ptr(pointer, policy);

        self.trace_deallocation(pointer.as_ptr() as usize, policy, result);

        result
    }

    /// Returns the reclaim policy used by `deallocate` and `deallocate_ptr`.
    pub fn default_reclaim_policy(&self) -> ReclaimPolicy { self.state.lock().policy }

    /// Sets the reclaim policy used by `deallocate` and `deallocate_ptr`.
    pub fn set_default_reclaim_policy(&self, policy: ReclaimPolicy) {
        debug!(?policy, "default reclaim policy");

        self.state.lock().policy = policy;
    }

    /// Returns whether no chunk is free.
    pub fn is_exhausted(&self) -> bool { self.state.lock().pool.is_exhausted() }

    /// Returns the number of free chunks, in O(free chunks).
    pub fn free_chunk_count(&self) -> usize { self.state.lock().pool.free_chunk_count() }

    /// Returns the free chunks, in the order they would be handed out.
    ///
    /// The result is a snapshot, which other threads may invalidate at any time.
    pub fn free_chunks(&self) -> Vec<NonNull<u8>> { self.state.lock().pool.free_chunks().collect() }

    //  Creates the pool proper, over the backing Block.
    fn assemble(backing: Backing<P>, policy: ReclaimPolicy) -> Self {
        let block = backing.block();

        //  Safety:
        //  -   The block is exclusively accessed through the pool, as guaranteed by `backing`.
        //  -   The block is aligned on the chunk alignment, either by construction or as checked.
        //  -   The chunk size is at least a pointer, and a multiple of the chunk alignment.
        let pool = unsafe { ChunkPool::new(block, Self::CHUNK_ALIGNED_SIZE) };

        debug!(address = block.begin(), size = block.size(), chunk_size = Self::CHUNK_ALIGNED_SIZE,
            chunk_count = pool.chunk_count(), owned = backing.is_owned(), ?policy, "pool initialized");

        let state = Mutex::new(State { pool, policy });

        Self { state, backing, _marker: PhantomData }
    }

    fn trace_deallocation(&self, address: usize, policy: ReclaimPolicy, result: bool) {
        if result {
            trace!(address, ?policy, "chunk deallocated");
        } else {
            warn!(address, ?policy, chunk_size = Self::CHUNK_ALIGNED_SIZE, "deallocation rejected");
        }
    }
}

impl<T, C, P> SizedAllocator for LockingPoolAllocator<T, C, P>
    where
        C: Configuration,
        P: Platform,
{
    fn block(&self) -> Block { self.backing.block() }

    fn allocate(&self, size: usize) -> Block {
        let (block, exhausted) = {
            let mut state = self.state.lock();
            let block = state.pool.allocate(size);
            (block, state.pool.is_exhausted())
        };

        if block.is_valid() {
            trace!(address = block.begin(), size, "chunk allocated");

            if exhausted {
                warn!(chunk_count = self.chunk_count(), "pool exhausted");
            }
        } else {
            trace!(size, chunk_size = Self::CHUNK_ALIGNED_SIZE, "allocation failed");
        }

        block
    }

    fn deallocate(&self, block: &mut Block) -> bool {
        let address = block.begin();

        let (result, policy) = {
            let mut state = self.state.lock();
            let policy = state.policy;
            (state.pool.deallocate(block, policy), policy)
        };

        self.trace_deallocation(address, policy, result);

        result
    }

    fn deallocate_ptr(&self, pointer: NonNull<u8>) -> bool {
        let (result, policy) = {
            let mut state = self.state.lock();
            let policy = state.policy;
            (state.pool.deallocate_ptr(pointer, policy), policy)
        };

        self.trace_deallocation(pointer.as_ptr() as usize, policy, result);

        result
    }

    fn deallocate_all(&self) -> bool {
        self.state.lock().pool.initialize();

        debug!(chunk_count = self.chunk_count(), "all chunks deallocated");

        true
    }

    fn zeroize(&self) {
        self.state.lock().pool.initialize();

        debug!(chunk_count = self.chunk_count(), "pool zeroized");
    }
}

impl<T, C, P> fmt::Debug for LockingPoolAllocator<T, C, P>
    where
        C: Configuration,
        P: Platform,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let block = self.backing.block();

        f.debug_struct("LockingPoolAllocator")
            .field("address", &format_args!("{:#x}", block.begin()))
            .field("size", &block.size())
            .field("chunk_size", &Self::CHUNK_ALIGNED_SIZE)
            .field("chunk_count", &self.chunk_count())
            .finish()
    }
}

//
//  Implementation
//

struct State {
    pool: ChunkPool,
    policy: ReclaimPolicy,
}

#[cfg(test)]
mod tests {

use std::sync::Arc;

use super::*;

#[repr(align(64))]
struct Storage([u8; 256]);

#[test]
fn locking_pool_allocator_chunk_aligned_size() {
    assert_eq!(8, LockingPoolAllocator::<u64>::CHUNK_ALIGNED_SIZE);
    assert_eq!(16, LockingPoolAllocator::<[u64; 2]>::CHUNK_ALIGNED_SIZE);
    assert_eq!(std::mem::size_of::<usize>(), LockingPoolAllocator::<u8>::CHUNK_ALIGNED_SIZE);
}

#[test]
fn locking_pool_allocator_new() {
    let pool = LockingPoolAllocator::<u64>::new(4).expect("Constructed");

    assert_eq!(4, pool.chunk_count());
    assert_eq!(8, pool.chunk_size());
    assert_eq!(32, pool.block().size());
    assert_eq!(4, pool.free_chunk_count());
    assert_eq!(ReclaimPolicy::Constant, pool.default_reclaim_policy());
    assert!(pool.owns_block());
    assert!(!pool.is_exhausted());
}

#[test]
fn locking_pool_allocator_new_zero() {
    let result = LockingPoolAllocator::<u64>::new(0);

    assert_eq!(Some(PoolError::ZeroChunks { chunk_size: 8 }), result.err());
}

#[test]
fn locking_pool_allocator_new_overflow() {
    let result = LockingPoolAllocator::<u64>::new(usize::MAX);

    assert_eq!(Some(PoolError::SizeOverflow { chunk_count: usize::MAX, chunk_size: 8 }), result.err());
}

#[test]
fn locking_pool_allocator_with_size() {
    let pool: LockingPoolAllocator<u64> =
        LockingPoolAllocator::with_size(SystemPlatform::new(), 30, ReclaimPolicy::Sorted).expect("Constructed");

    assert_eq!(3, pool.chunk_count());
    assert_eq!(24, pool.block().size());
    assert_eq!(ReclaimPolicy::Sorted, pool.default_reclaim_policy());

    let result: Result<LockingPoolAllocator<u64>, _> =
        LockingPoolAllocator::with_size(SystemPlatform::new(), 7, ReclaimPolicy::Sorted);

    assert_eq!(Some(PoolError::ZeroChunks { chunk_size: 8 }), result.err());
}

#[test]
fn locking_pool_allocator_from_block() {
    let mut storage = Storage([0; 256]);
    let block = Block::from_raw(storage.0.as_mut_ptr(), 100);

    //  Safety:
    //  -   `storage` outlives the pool, and is only accessed through it.
    let pool = unsafe { LockingPoolAllocator::<u64>::from_block(block) }.expect("Constructed");

    assert_eq!(12, pool.chunk_count());
    assert_eq!(block, pool.block());
    assert!(!pool.owns_block());
}

#[test]
fn locking_pool_allocator_from_block_invalid() {
    //  Safety:
    //  -   An invalid block is never accessed.
    let result = unsafe { LockingPoolAllocator::<u64>::from_block(Block::invalid()) };

    assert_eq!(Some(PoolError::InvalidBlock), result.err());
}

#[test]
fn locking_pool_allocator_from_block_misaligned() {
    let mut storage = Storage([0; 256]);

    //  Safety:
    //  -   Offset 4 is within `storage`.
    let pointer = unsafe { storage.0.as_mut_ptr().add(4) };
    let block = Block::from_raw(pointer, 64);

    //  Safety:
    //  -   `storage` outlives the pool, and is only accessed through it.
    let result = unsafe { LockingPoolAllocator::<u64>::from_block(block) };

    assert_eq!(Some(PoolError::MisalignedBlock { address: pointer as usize, align: 8 }), result.err());
}

#[test]
fn locking_pool_allocator_from_block_too_small() {
    let mut storage = Storage([0; 256]);
    let block = Block::from_raw(storage.0.as_mut_ptr(), 7);

    //  Safety:
    //  -   `storage` outlives the pool, and is only accessed through it.
    let pool = unsafe { LockingPoolAllocator::<u64>::from_block(block) }.expect("Constructed");

    assert_eq!(0, pool.chunk_count());
    assert!(pool.is_exhausted());
    assert!(!pool.allocate_chunk().is_valid());
}

#[test]
fn locking_pool_allocator_scenario() {
    let pool = LockingPoolAllocator::<u64>::new(4).expect("Constructed");

    let blocks: Vec<_> = (0..4).map(|_| pool.allocate(8)).collect();

    for (index, block) in blocks.iter().enumerate() {
        assert!(block.is_valid());
        assert_eq!(8, block.size());
        assert_eq!(pool.block().begin() + index * 8, block.begin());
    }

    assert!(!pool.allocate(8).is_valid());

    let mut second = blocks[1];

    assert!(pool.deallocate(&mut second));
    assert!(!second.is_valid());

    assert_eq!(blocks[1], pool.allocate(8));
}

#[test]
fn locking_pool_allocator_allocate_too_large() {
    let pool = LockingPoolAllocator::<u64>::new(4).expect("Constructed");

    assert!(!pool.allocate(9).is_valid());
    assert_eq!(4, pool.free_chunk_count());
}

#[test]
fn locking_pool_allocator_deallocate_ptr() {
    let pool = LockingPoolAllocator::<u64>::new(4).expect("Constructed");

    let block = pool.allocate_chunk();
    let pointer = block.pointer().expect("Valid");

    assert!(pool.deallocate_ptr(pointer));
    assert_eq!(4, pool.free_chunk_count());

    //  Safety:
    //  -   Offset 1 is within the backing block.
    let misaligned = NonNull::new(unsafe { pointer.as_ptr().add(1) }).expect("Non-null");

    assert!(!pool.deallocate_ptr(misaligned));
}

#[test]
fn locking_pool_allocator_default_policy() {
    let pool = LockingPoolAllocator::<u64>::new(4).expect("Constructed");

    pool.set_default_reclaim_policy(ReclaimPolicy::Sorted);
    assert_eq!(ReclaimPolicy::Sorted, pool.default_reclaim_policy());

    let mut blocks: Vec<_> = (0..4).map(|_| pool.allocate_chunk()).collect();

    for index in [2, 0, 3] {
        assert!(pool.deallocate(&mut blocks[index]));
    }

    let free: Vec<_> = pool.free_chunks().into_iter().map(|chunk| chunk.as_ptr() as usize).collect();
    let begin = pool.block().begin();

    assert_eq!(vec!(begin, begin + 16, begin + 24), free);
}

#[test]
fn locking_pool_allocator_zeroize() {
    let pool = LockingPoolAllocator::<u64>::new(4).expect("Constructed");

    let _ = pool.allocate_chunk();
    let _ = pool.allocate_chunk();

    pool.zeroize();

    assert_eq!(4, pool.free_chunk_count());
    assert!(pool.owns_block());
}

#[test]
fn locking_pool_allocator_deallocate_all() {
    let pool = LockingPoolAllocator::<u64>::new(4).expect("Constructed");

    while pool.allocate_chunk().is_valid() {}

    assert!(pool.deallocate_all());

    assert_eq!(4, pool.free_chunk_count());
}

#[test]
fn locking_pool_allocator_contains() {
    let pool = LockingPoolAllocator::<u64>::new(4).expect("Constructed");
    let block = pool.block();

    assert!(pool.contains(block.as_ptr()));
    assert!(pool.contains((block.end() - 1) as *const u8));
    assert!(!pool.contains(block.end() as *const u8));

    assert!(pool.is_chunk_ptr(block.as_ptr()));
    assert!(!pool.is_chunk_ptr((block.begin() + 4) as *const u8));
}

#[test]
fn locking_pool_allocator_is_chunk_ptr_trailing_bytes() {
    let mut storage = Storage([0; 256]);
    let block = Block::from_raw(storage.0.as_mut_ptr(), 100);

    //  Safety:
    //  -   `storage` outlives the pool, and is only accessed through it.
    let pool = unsafe { LockingPoolAllocator::<u64>::from_block(block) }.expect("Constructed");

    assert!(pool.is_chunk_ptr((block.begin() + 88) as *const u8));
    assert!(pool.contains((block.begin() + 96) as *const u8));
    assert!(!pool.is_chunk_ptr((block.begin() + 96) as *const u8));
}

#[test]
fn locking_pool_allocator_is_chunk_ptr_lock_free() {
    let pool = LockingPoolAllocator::<u64>::new(4).expect("Constructed");
    let begin = pool.block().begin();

    let _guard = pool.state.lock();

    assert!(pool.is_chunk_ptr((begin + 8) as *const u8));
    assert!(!pool.is_chunk_ptr((begin + 9) as *const u8));
}

#[test]
fn locking_pool_allocator_deallocate_with() {
    let pool = LockingPoolAllocator::<u64>::new(4).expect("Constructed");

    assert_eq!(ReclaimPolicy::Constant, pool.default_reclaim_policy());

    let mut blocks: Vec<_> = (0..4).map(|_| pool.allocate_chunk()).collect();

    for index in [3, 1, 2] {
        assert!(pool.deallocate_with(&mut blocks[index], ReclaimPolicy::Sorted));
        assert!(!blocks[index].is_valid());
    }

    let free: Vec<_> = pool.free_chunks().into_iter().map(|chunk| chunk.as_ptr() as usize).collect();
    let begin = pool.block().begin();

    assert_eq!(vec!(begin + 8, begin + 16, begin + 24), free);
    assert_eq!(ReclaimPolicy::Constant, pool.default_reclaim_policy());
}

#[test]
fn locking_pool_allocator_deallocate_with_rejected() {
    let pool = LockingPoolAllocator::<u64>::new(4).expect("Constructed");

    let chunk = pool.allocate_chunk();

    let mut wrong_size = Block::new(chunk.pointer().expect("Valid"), 4);

    assert!(!pool.deallocate_with(&mut wrong_size, ReclaimPolicy::Sorted));
    assert!(wrong_size.is_valid());

    let mut local = 0u64;
    let mut foreign = Block::new(NonNull::from(&mut local).cast(), 8);

    assert!(!pool.deallocate_with(&mut foreign, ReclaimPolicy::Constant));
    assert!(!pool.deallocate_with(&mut foreign, ReclaimPolicy::Sorted));
    assert!(foreign.is_valid());

    assert_eq!(3, pool.free_chunk_count());
}

struct FailingPlatform;

impl Platform for FailingPlatform {
    unsafe fn allocate(&self, _: std::alloc::Layout) -> Option<NonNull<u8>> { None }

    unsafe fn deallocate(&self, _: NonNull<u8>, _: std::alloc::Layout) {
        unreachable!("Nothing was ever allocated");
    }
}

#[test]
fn locking_pool_allocator_out_of_memory() {
    let result: Result<LockingPoolAllocator<u64, PoolConfiguration, FailingPlatform>, _> =
        LockingPoolAllocator::with_platform(FailingPlatform, 4, ReclaimPolicy::Constant);

    assert_eq!(Some(PoolError::OutOfMemory { size: 32, align: 8 }), result.err());
}

#[test]
fn locking_pool_allocator_as_dyn() {
    let pool: Arc<dyn SizedAllocator + Send + Sync> = Arc::new(LockingPoolAllocator::<u64>::new(2).expect("Constructed"));

    let mut block = pool.allocate(4);

    assert!(block.is_valid());
    assert!(pool.contains(block.as_ptr()));
    assert!(pool.deallocate(&mut block));
}

} // mod tests
