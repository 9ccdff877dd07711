use std::collections::HashMap;

use super::disk_manager::DiskManager;
use super::error::{FileError, FileResult};
use super::replacer::LruReplacer;
use super::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// One buffer pool frame: a page's bytes plus bookkeeping. Metadata is only
/// touched while the pool itself is borrowed; the byte buffer belongs to
/// whoever holds the pin.
struct Frame {
    data: Vec<u8>,
    page_id: PageId,
    pin_count: u32,
    dirty: bool,
}

impl Frame {
    fn new() -> Self {
        Self {
            data: vec![0u8; PAGE_SIZE],
            page_id: INVALID_PAGE_ID,
            pin_count: 0,
            dirty: false,
        }
    }

    fn reset(&mut self) {
        self.page_id = INVALID_PAGE_ID;
        self.pin_count = 0;
        self.dirty = false;
    }
}

/// Caches pages in a fixed set of frames. Frames come from the free list
/// first and the LRU replacer second; a dirty evictee is written back before
/// its frame is reused. Callers share the pool behind `Arc<Mutex<_>>` and
/// must pair every `fetch_page`/`new_page` with exactly one `unpin_page`.
pub struct BufferPoolManager {
    disk: DiskManager,
    frames: Vec<Frame>,
    free_list: Vec<FrameId>,
    page_table: HashMap<PageId, FrameId>,
    replacer: LruReplacer,
}

impl BufferPoolManager {
    pub fn new(pool_size: usize, disk: DiskManager) -> Self {
        let frames = (0..pool_size).map(|_| Frame::new()).collect();
        let free_list = (0..pool_size).rev().collect();
        Self {
            disk,
            frames,
            free_list,
            page_table: HashMap::new(),
            replacer: LruReplacer::new(pool_size),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.frames.len()
    }

    pub fn disk(&self) -> &DiskManager {
        &self.disk
    }

    /// Pin a page, reading it from disk if it is not already cached.
    /// `PageNotFound` means the page does not exist on disk.
    pub fn fetch_page(&mut self, page_id: PageId) -> FileResult<FrameId> {
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            self.frames[frame_id].pin_count += 1;
            self.replacer.pin(frame_id);
            return Ok(frame_id);
        }

        let frame_id = self.acquire_frame()?;
        if let Err(e) = self.disk.read_page(page_id, &mut self.frames[frame_id].data) {
            self.free_list.push(frame_id);
            return Err(e);
        }

        let frame = &mut self.frames[frame_id];
        frame.page_id = page_id;
        frame.pin_count = 1;
        frame.dirty = false;
        self.page_table.insert(page_id, frame_id);
        Ok(frame_id)
    }

    /// Install a freshly allocated page (its id comes from the free-space
    /// manager) with zeroed contents, pinned once.
    pub fn new_page(&mut self, page_id: PageId) -> FileResult<FrameId> {
        if page_id < 0 {
            return Err(FileError::InvalidPageId(page_id));
        }

        // A reused page id may still sit in the cache with stale contents.
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            if self.frames[frame_id].pin_count > 0 {
                return Err(FileError::PagePinned(page_id));
            }
            self.replacer.pin(frame_id);
            let frame = &mut self.frames[frame_id];
            frame.data.fill(0);
            frame.pin_count = 1;
            frame.dirty = false;
            return Ok(frame_id);
        }

        let frame_id = self.acquire_frame()?;
        let frame = &mut self.frames[frame_id];
        frame.data.fill(0);
        frame.page_id = page_id;
        frame.pin_count = 1;
        frame.dirty = false;
        self.page_table.insert(page_id, frame_id);
        Ok(frame_id)
    }

    /// Release one pin. Passing `dirty == true` commits the caller's writes;
    /// the flag sticks until the page is flushed or evicted.
    pub fn unpin_page(&mut self, page_id: PageId, dirty: bool) -> FileResult<()> {
        let frame_id = match self.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Err(FileError::PageNotFound(page_id)),
        };
        let frame = &mut self.frames[frame_id];
        if frame.pin_count == 0 {
            return Err(FileError::PageNotPinned(page_id));
        }
        frame.pin_count -= 1;
        if dirty {
            frame.dirty = true;
        }
        if frame.pin_count == 0 {
            self.replacer.unpin(frame_id);
        }
        Ok(())
    }

    /// Write a cached page back to disk and clear its dirty flag; no-op for
    /// pages that are not cached
    pub fn flush_page(&mut self, page_id: PageId) -> FileResult<()> {
        if let Some(&frame_id) = self.page_table.get(&page_id) {
            self.disk.write_page(page_id, &self.frames[frame_id].data)?;
            self.frames[frame_id].dirty = false;
        }
        Ok(())
    }

    /// Flush every cached page, then sync the file
    pub fn flush_all(&mut self) -> FileResult<()> {
        let page_ids: Vec<PageId> = self.page_table.keys().copied().collect();
        for page_id in page_ids {
            self.flush_page(page_id)?;
        }
        self.disk.sync()
    }

    /// Drop an unpinned page from the cache. The on-disk allocation is
    /// untouched; deallocation belongs to the free-space manager.
    pub fn delete_page(&mut self, page_id: PageId) -> FileResult<()> {
        let frame_id = match self.page_table.get(&page_id) {
            Some(&frame_id) => frame_id,
            None => return Ok(()),
        };
        if self.frames[frame_id].pin_count > 0 {
            return Err(FileError::PagePinned(page_id));
        }
        self.page_table.remove(&page_id);
        self.replacer.pin(frame_id);
        self.frames[frame_id].reset();
        self.free_list.push(frame_id);
        Ok(())
    }

    /// Raw bytes of a pinned page
    pub fn frame_data(&self, frame_id: FrameId) -> &[u8] {
        &self.frames[frame_id].data
    }

    /// Mutable raw bytes of a pinned page. Writers must still declare their
    /// intent with `unpin_page(.., true)`.
    pub fn frame_data_mut(&mut self, frame_id: FrameId) -> &mut [u8] {
        &mut self.frames[frame_id].data
    }

    pub fn is_cached(&self, page_id: PageId) -> bool {
        self.page_table.contains_key(&page_id)
    }

    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        self.page_table
            .get(&page_id)
            .map(|&frame_id| self.frames[frame_id].pin_count)
    }

    /// Find a frame for a new resident page: free list first, then the
    /// replacer. The previous occupant, if any, is written back when dirty
    /// and dropped from the page table.
    fn acquire_frame(&mut self) -> FileResult<FrameId> {
        let frame_id = match self.free_list.pop() {
            Some(frame_id) => frame_id,
            None => self.replacer.victim().ok_or(FileError::PoolExhausted)?,
        };
        if self.frames[frame_id].page_id != INVALID_PAGE_ID {
            let old_page_id = self.frames[frame_id].page_id;
            if self.frames[frame_id].dirty {
                self.disk
                    .write_page(old_page_id, &self.frames[frame_id].data)?;
            }
            self.page_table.remove(&old_page_id);
            self.frames[frame_id].reset();
        }
        Ok(frame_id)
    }
}

impl Drop for BufferPoolManager {
    fn drop(&mut self) {
        let _ = self.flush_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup(pool_size: usize) -> (TempDir, BufferPoolManager) {
        let temp_dir = tempfile::tempdir().unwrap();
        let disk = DiskManager::open(temp_dir.path().join("test.db")).unwrap();
        (temp_dir, BufferPoolManager::new(pool_size, disk))
    }

    #[test]
    fn test_fetch_missing_page() {
        let (_temp_dir, mut pool) = setup(3);
        let result = pool.fetch_page(0);
        assert!(matches!(result, Err(FileError::PageNotFound(0))));
        // the frame went back to the free list
        assert_eq!(pool.free_list.len(), 3);
    }

    #[test]
    fn test_new_page_write_fetch() {
        let (_temp_dir, mut pool) = setup(3);

        let frame_id = pool.new_page(0).unwrap();
        pool.frame_data_mut(frame_id)[0] = 42;
        pool.unpin_page(0, true).unwrap();

        let frame_id = pool.fetch_page(0).unwrap();
        assert_eq!(pool.frame_data(frame_id)[0], 42);
        assert_eq!(pool.pin_count(0), Some(1));
        pool.unpin_page(0, false).unwrap();
    }

    #[test]
    fn test_eviction_writes_dirty_page() {
        let (_temp_dir, mut pool) = setup(2);

        for page_id in 0..2 {
            let frame_id = pool.new_page(page_id).unwrap();
            pool.frame_data_mut(frame_id)[0] = 10 + page_id as u8;
            pool.unpin_page(page_id, true).unwrap();
        }

        // forces page 0 (the least recently used) out
        let frame_id = pool.new_page(2).unwrap();
        pool.frame_data_mut(frame_id)[0] = 12;
        pool.unpin_page(2, true).unwrap();
        assert!(!pool.is_cached(0));

        // page 0 must have been written back before its frame was reused
        let frame_id = pool.fetch_page(0).unwrap();
        assert_eq!(pool.frame_data(frame_id)[0], 10);
        pool.unpin_page(0, false).unwrap();
    }

    #[test]
    fn test_pinned_page_is_never_evicted() {
        let (_temp_dir, mut pool) = setup(2);

        pool.new_page(0).unwrap(); // stays pinned
        pool.new_page(1).unwrap();
        pool.unpin_page(1, false).unwrap();

        pool.new_page(2).unwrap();
        assert!(pool.is_cached(0));
        assert!(!pool.is_cached(1));
        assert!(pool.is_cached(2));
    }

    #[test]
    fn test_pool_exhausted() {
        let (_temp_dir, mut pool) = setup(2);

        pool.new_page(0).unwrap();
        pool.new_page(1).unwrap();

        let result = pool.new_page(2);
        assert!(matches!(result, Err(FileError::PoolExhausted)));
    }

    #[test]
    fn test_unpin_errors() {
        let (_temp_dir, mut pool) = setup(2);

        assert!(matches!(
            pool.unpin_page(0, false),
            Err(FileError::PageNotFound(0))
        ));

        pool.new_page(0).unwrap();
        pool.unpin_page(0, false).unwrap();
        assert!(matches!(
            pool.unpin_page(0, false),
            Err(FileError::PageNotPinned(0))
        ));
    }

    #[test]
    fn test_dirty_flag_sticks_until_flush() {
        let (_temp_dir, mut pool) = setup(2);

        let frame_id = pool.new_page(0).unwrap();
        pool.frame_data_mut(frame_id)[7] = 7;
        pool.unpin_page(0, true).unwrap();

        // a later clean unpin must not drop the earlier dirty intent
        pool.fetch_page(0).unwrap();
        pool.unpin_page(0, false).unwrap();

        pool.flush_page(0).unwrap();
        let mut buffer = vec![0u8; PAGE_SIZE];
        pool.disk().read_page(0, &mut buffer).unwrap();
        assert_eq!(buffer[7], 7);
    }

    #[test]
    fn test_delete_page() {
        let (_temp_dir, mut pool) = setup(2);

        pool.new_page(0).unwrap();
        assert!(matches!(
            pool.delete_page(0),
            Err(FileError::PagePinned(0))
        ));

        pool.unpin_page(0, false).unwrap();
        pool.delete_page(0).unwrap();
        assert!(!pool.is_cached(0));

        // deleting an uncached page is fine
        pool.delete_page(5).unwrap();
    }

    #[test]
    fn test_flush_all() {
        let (_temp_dir, mut pool) = setup(4);

        for page_id in 0..3 {
            let frame_id = pool.new_page(page_id).unwrap();
            pool.frame_data_mut(frame_id)[0] = page_id as u8;
            pool.unpin_page(page_id, true).unwrap();
        }
        pool.flush_all().unwrap();

        for page_id in 0..3 {
            let mut buffer = vec![0u8; PAGE_SIZE];
            pool.disk().read_page(page_id, &mut buffer).unwrap();
            assert_eq!(buffer[0], page_id as u8);
        }
    }

    #[test]
    fn test_drop_flushes_dirty_pages() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("test.db");

        {
            let disk = DiskManager::open(&path).unwrap();
            let mut pool = BufferPoolManager::new(2, disk);
            let frame_id = pool.new_page(0).unwrap();
            pool.frame_data_mut(frame_id)[0] = 88;
            pool.unpin_page(0, true).unwrap();
        }

        let disk = DiskManager::open(&path).unwrap();
        let mut pool = BufferPoolManager::new(2, disk);
        let frame_id = pool.fetch_page(0).unwrap();
        assert_eq!(pool.frame_data(frame_id)[0], 88);
        pool.unpin_page(0, false).unwrap();
    }
}
