use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use super::FrameId;

/// Tracks the frames that are eligible for eviction, in least-recently-used
/// order. Pinned frames are never tracked. The internal mutex is redundant
/// under the buffer pool's lock but keeps the replacer safe standalone.
pub struct LruReplacer {
    frames: Mutex<LruCache<FrameId, ()>>,
    capacity: usize,
}

impl LruReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap())),
            capacity,
        }
    }

    /// Mark a frame evictable, moving it to the most-recent end if it is
    /// already tracked. Silently ignored at capacity.
    pub fn unpin(&self, frame_id: FrameId) {
        let mut frames = self.frames.lock().unwrap();
        if !frames.contains(&frame_id) && frames.len() >= self.capacity {
            return;
        }
        frames.put(frame_id, ());
    }

    /// Remove a frame from the eviction candidates
    pub fn pin(&self, frame_id: FrameId) {
        self.frames.lock().unwrap().pop(&frame_id);
    }

    /// Remove and return the least recently used frame
    pub fn victim(&self) -> Option<FrameId> {
        self.frames
            .lock()
            .unwrap()
            .pop_lru()
            .map(|(frame_id, ())| frame_id)
    }

    pub fn len(&self) -> usize {
        self.frames.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
