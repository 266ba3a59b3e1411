// cache.rs — LRU cache of generated blocks
//
// Keyed by a deterministic hash of (program revision, origin, lod, buffer
// size). Results are stored behind `Arc` so a hit is a reference-count bump,
// not a copy of a whole voxel block. Thread-safe via Mutex.

use crate::buffer::VoxelBuffer;
use crate::math::Vec3i;
use lru::LruCache;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

pub struct BlockCache {
    blocks: Mutex<LruCache<u64, Arc<VoxelBuffer>>>,
}

impl BlockCache {
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::new(1).unwrap());
        BlockCache {
            blocks: Mutex::new(LruCache::new(cap)),
        }
    }

    /// Cheap `Arc` clone on hit.
    pub fn get(&self, key: u64) -> Option<Arc<VoxelBuffer>> {
        self.blocks.lock().unwrap().get(&key).cloned()
    }

    pub fn put(&self, key: u64, block: Arc<VoxelBuffer>) {
        self.blocks.lock().unwrap().put(key, block);
    }

    /// Drop everything, e.g. after the host invalidates the generator.
    pub fn clear(&self) {
        self.blocks.lock().unwrap().clear();
    }

    pub fn len(&self) -> usize {
        self.blocks.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Deterministic cache key for one block request. The revision ties entries
/// to a specific compiled program; recompiling invalidates by key change,
/// not by flushing.
pub fn block_key(revision: u64, origin: Vec3i, lod: u8, size: Vec3i) -> u64 {
    let mut hasher = DefaultHasher::new();
    revision.hash(&mut hasher);
    origin.x.hash(&mut hasher);
    origin.y.hash(&mut hasher);
    origin.z.hash(&mut hasher);
    lod.hash(&mut hasher);
    size.x.hash(&mut hasher);
    size.y.hash(&mut hasher);
    size.z.hash(&mut hasher);
    hasher.finish()
}
