use std::collections::LinkedList;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::common::{
    FrameId, PageId, Result, StratumError, DEFAULT_BUCKET_SIZE, HEADER_PAGE_ID,
};
use crate::container::ExtendibleHashTable;
use crate::storage::disk::{DiskManager, DiskScheduler};

use super::{LruKReplacer, Page, ReadPageGuard, WritePageGuard};

/// Free-frame and allocation state; its mutex is the pool's coordination
/// latch and is held across the whole frame-acquisition path.
struct PoolCore {
    /// Frames whose page id is invalid
    free_list: LinkedList<FrameId>,
    /// Monotonic page allocation counter
    next_page_id: i32,
}

/// State shared between the manager and outstanding page guards.
pub(crate) struct BufferPoolState {
    /// The buffer pool frames
    frames: Vec<Arc<Page>>,
    /// Page table: maps resident page IDs to frame IDs
    page_table: ExtendibleHashTable<PageId, FrameId>,
    /// LRU-K replacer for eviction decisions
    replacer: LruKReplacer,
    /// Coordination latch
    core: Mutex<PoolCore>,
}

impl BufferPoolState {
    /// Releases one pin on `page_id`. Returns false when the page is not
    /// resident or its pin count is already zero; in that case nothing
    /// changes. The dirty flag is only ever ORed in, never cleared here.
    pub(crate) fn unpin(&self, page_id: PageId, is_dirty: bool) -> bool {
        let Some(frame_id) = self.page_table.find(&page_id) else {
            return false;
        };
        let frame = &self.frames[frame_id.as_usize()];

        if frame.pin_count() == 0 {
            return false;
        }
        if is_dirty {
            frame.mark_dirty();
        }
        match frame.unpin() {
            None => false,
            Some(0) => {
                self.replacer.set_evictable(frame_id, true);
                true
            }
            Some(_) => true,
        }
    }
}

/// BufferPoolManager serves page requests out of a fixed array of frames,
/// backed by the disk manager. Frame acquisition consults the free list
/// first and falls back to the LRU-K replacer; a dirty victim is flushed
/// before its frame is reused. The pool never blocks waiting for a frame:
/// exhaustion is reported as an empty result.
pub struct BufferPoolManager {
    /// Number of frames in the buffer pool
    pool_size: usize,
    /// Shared state
    state: Arc<BufferPoolState>,
    /// Disk scheduler carrying all page I/O
    disk_scheduler: DiskScheduler,
}

impl BufferPoolManager {
    /// Creates a pool of `pool_size` frames with LRU-`replacer_k`
    /// replacement. Page ids start after the reserved header page.
    pub fn new(pool_size: usize, replacer_k: usize, disk_manager: Arc<DiskManager>) -> Self {
        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = LinkedList::new();

        for i in 0..pool_size {
            let frame_id = FrameId::new(i as i32);
            frames.push(Arc::new(Page::new(frame_id)));
            free_list.push_back(frame_id);
        }

        let state = Arc::new(BufferPoolState {
            frames,
            page_table: ExtendibleHashTable::new(DEFAULT_BUCKET_SIZE),
            replacer: LruKReplacer::new(pool_size, replacer_k),
            core: Mutex::new(PoolCore {
                free_list,
                next_page_id: HEADER_PAGE_ID.as_i32() + 1,
            }),
        });

        Self {
            pool_size,
            state,
            disk_scheduler: DiskScheduler::new(disk_manager),
        }
    }

    /// Allocates a fresh page id and pins it into a frame. The page comes
    /// back zeroed, clean, and with a pin count of one. Returns Ok(None)
    /// when no frame is free and nothing can be evicted.
    pub fn new_page(&self) -> Result<Option<Arc<Page>>> {
        let Some(frame_id) = self.allocate_page_frame()? else {
            return Ok(None);
        };
        Ok(Some(Arc::clone(&self.state.frames[frame_id.as_usize()])))
    }

    /// Like [`new_page`](Self::new_page), but hands the pinned page out
    /// behind a write guard in one step.
    pub fn new_page_write(&self) -> Result<Option<WritePageGuard<'_>>> {
        let Some(frame_id) = self.allocate_page_frame()? else {
            return Ok(None);
        };
        let state = self.state.as_ref();
        let page = state.frames[frame_id.as_usize()].as_ref();
        Ok(Some(WritePageGuard::new(page.page_id(), state, page)))
    }

    /// Pins `page_id` into the pool, reading it from disk on a miss.
    /// Returns Ok(None) when no frame can be obtained.
    pub fn fetch_page(&self, page_id: PageId) -> Result<Option<Arc<Page>>> {
        let Some(frame_id) = self.pin_page(page_id)? else {
            return Ok(None);
        };
        Ok(Some(Arc::clone(&self.state.frames[frame_id.as_usize()])))
    }

    /// Fetches `page_id` for shared access. The guard holds the pin and
    /// the page rw-latch and unpins on drop.
    pub fn read_page(&self, page_id: PageId) -> Result<Option<ReadPageGuard<'_>>> {
        let Some(frame_id) = self.pin_page(page_id)? else {
            return Ok(None);
        };
        let state = self.state.as_ref();
        let page = state.frames[frame_id.as_usize()].as_ref();
        Ok(Some(ReadPageGuard::new(page_id, state, page)))
    }

    /// Fetches `page_id` for exclusive access. The guard unpins on drop,
    /// dirty iff it was written through.
    pub fn write_page(&self, page_id: PageId) -> Result<Option<WritePageGuard<'_>>> {
        let Some(frame_id) = self.pin_page(page_id)? else {
            return Ok(None);
        };
        let state = self.state.as_ref();
        let page = state.frames[frame_id.as_usize()].as_ref();
        Ok(Some(WritePageGuard::new(page_id, state, page)))
    }

    /// Releases one pin; see [`BufferPoolState::unpin`].
    pub fn unpin_page(&self, page_id: PageId, is_dirty: bool) -> bool {
        self.state.unpin(page_id, is_dirty)
    }

    /// Writes `page_id` to disk and clears its dirty flag, regardless of
    /// pin state. Returns Ok(false) when the page is not resident.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Err(StratumError::InvalidPageId(page_id));
        }

        // Hold the coordination latch so eviction cannot retarget the
        // frame mid-flush.
        let _core = self.state.core.lock();

        let Some(frame_id) = self.state.page_table.find(&page_id) else {
            return Ok(false);
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        self.flush_frame(frame, page_id)?;
        Ok(true)
    }

    /// Writes every resident page to disk.
    pub fn flush_all_pages(&self) -> Result<()> {
        let _core = self.state.core.lock();
        for frame in &self.state.frames {
            if frame.is_free() {
                continue;
            }
            self.flush_frame(frame, frame.page_id())?;
        }
        Ok(())
    }

    /// Drops `page_id` from the pool and returns its frame to the free
    /// list. Returns Ok(true) when the page is absent, Ok(false) when it
    /// is still pinned.
    pub fn delete_page(&self, page_id: PageId) -> Result<bool> {
        if !page_id.is_valid() {
            return Err(StratumError::InvalidPageId(page_id));
        }

        let mut core = self.state.core.lock();

        let Some(frame_id) = self.state.page_table.find(&page_id) else {
            return Ok(true);
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        if frame.pin_count() > 0 {
            return Ok(false);
        }

        if frame.is_dirty() {
            self.flush_frame(frame, page_id)?;
        }

        self.state.page_table.remove(&page_id);
        self.state.replacer.remove(frame_id);
        frame.reset();
        core.free_list.push_back(frame_id);

        Ok(true)
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.core.lock().free_list.len()
    }

    /// Pin count of a resident page, None if not resident.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        self.state
            .page_table
            .find(&page_id)
            .map(|frame_id| self.state.frames[frame_id.as_usize()].pin_count())
    }

    pub fn disk_manager(&self) -> &Arc<DiskManager> {
        self.disk_scheduler.disk_manager()
    }

    /// Grabs a frame, stamps a freshly allocated page id on it and pins
    /// it. The payload is all zeroes (a reset frame).
    fn allocate_page_frame(&self) -> Result<Option<FrameId>> {
        let mut core = self.state.core.lock();

        let Some(frame_id) = self.acquire_frame(&mut core)? else {
            return Ok(None);
        };

        let page_id = PageId::new(core.next_page_id);
        core.next_page_id += 1;

        let frame = &self.state.frames[frame_id.as_usize()];
        frame.set_page_id(page_id);
        frame.pin();

        self.register_frame(page_id, frame_id);
        Ok(Some(frame_id))
    }

    /// Pins `page_id` into a frame: bumps the pin on a hit, otherwise
    /// grabs a frame and reads the page in from disk.
    fn pin_page(&self, page_id: PageId) -> Result<Option<FrameId>> {
        if !page_id.is_valid() {
            return Err(StratumError::InvalidPageId(page_id));
        }

        let mut core = self.state.core.lock();

        if let Some(frame_id) = self.state.page_table.find(&page_id) {
            let frame = &self.state.frames[frame_id.as_usize()];
            frame.pin();
            self.state.replacer.record_access(frame_id);
            self.state.replacer.set_evictable(frame_id, false);
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = self.acquire_frame(&mut core)? else {
            return Ok(None);
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        self.disk_scheduler
            .schedule_read_sync(page_id, frame.payload_mut().as_mut_slice())?;
        frame.set_page_id(page_id);
        frame.pin();

        self.register_frame(page_id, frame_id);
        Ok(Some(frame_id))
    }

    /// Pops a free frame, or evicts a victim. The frame comes back fully
    /// reset. The caller holds the coordination latch.
    fn acquire_frame(&self, core: &mut PoolCore) -> Result<Option<FrameId>> {
        if let Some(frame_id) = core.free_list.pop_front() {
            return Ok(Some(frame_id));
        }

        let Some(frame_id) = self.state.replacer.evict() else {
            return Ok(None);
        };

        let frame = &self.state.frames[frame_id.as_usize()];
        let old_page_id = frame.page_id();
        debug!(frame = %frame_id, page = %old_page_id, "evicting page");

        if frame.is_dirty() {
            self.flush_frame(frame, old_page_id)?;
        }

        self.state.page_table.remove(&old_page_id);
        frame.reset();
        Ok(Some(frame_id))
    }

    fn register_frame(&self, page_id: PageId, frame_id: FrameId) {
        self.state.page_table.insert(page_id, frame_id);
        self.state.replacer.record_access(frame_id);
        self.state.replacer.set_evictable(frame_id, false);
    }

    /// Writes the frame's payload out under its read latch.
    fn flush_frame(&self, frame: &Page, page_id: PageId) -> Result<()> {
        trace!(page = %page_id, "flushing page");
        self.disk_scheduler
            .schedule_write_sync(page_id, frame.payload().as_slice())?;
        frame.clear_dirty();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn create_bpm(pool_size: usize) -> (BufferPoolManager, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let dm = Arc::new(DiskManager::new(temp_file.path()).unwrap());
        let bpm = BufferPoolManager::new(pool_size, 2, dm);
        (bpm, temp_file)
    }

    #[test]
    fn test_buffer_pool_manager_new() {
        let (bpm, _temp) = create_bpm(10);
        assert_eq!(bpm.pool_size(), 10);
        assert_eq!(bpm.free_frame_count(), 10);
    }

    #[test]
    fn test_buffer_pool_manager_new_page() {
        let (bpm, _temp) = create_bpm(10);

        let page = bpm.new_page().unwrap().unwrap();
        assert_eq!(page.page_id(), PageId::new(1));
        assert_eq!(page.pin_count(), 1);
        assert_eq!(bpm.free_frame_count(), 9);
    }

    #[test]
    fn test_buffer_pool_manager_unpin_contract() {
        let (bpm, _temp) = create_bpm(10);

        let page = bpm.new_page().unwrap().unwrap();
        let pid = page.page_id();

        assert!(bpm.unpin_page(pid, false));
        // Unpin of an already-zero pin count returns false and changes
        // nothing.
        assert!(!bpm.unpin_page(pid, true));
        assert!(!page.is_dirty());
        // Not-resident page
        assert!(!bpm.unpin_page(PageId::new(99), false));
    }

    #[test]
    fn test_buffer_pool_manager_dirty_flag_is_sticky() {
        let (bpm, _temp) = create_bpm(10);

        let page = bpm.new_page().unwrap().unwrap();
        let pid = page.page_id();
        page.pin();

        assert!(bpm.unpin_page(pid, true));
        assert!(page.is_dirty());
        // A clean unpin must not clear the flag
        assert!(bpm.unpin_page(pid, false));
        assert!(page.is_dirty());
    }

    #[test]
    fn test_buffer_pool_manager_fetch_resident() {
        let (bpm, _temp) = create_bpm(10);

        let page = bpm.new_page().unwrap().unwrap();
        let pid = page.page_id();

        let fetched = bpm.fetch_page(pid).unwrap().unwrap();
        assert_eq!(fetched.page_id(), pid);
        assert_eq!(fetched.pin_count(), 2);

        assert!(bpm.unpin_page(pid, false));
        assert!(bpm.unpin_page(pid, false));
    }

    #[test]
    fn test_buffer_pool_manager_read_write_guards() {
        let (bpm, _temp) = create_bpm(10);

        let page = bpm.new_page().unwrap().unwrap();
        let pid = page.page_id();
        bpm.unpin_page(pid, false);

        {
            let mut guard = bpm.write_page(pid).unwrap().unwrap();
            guard.data_mut()[0] = 42;
            guard.data_mut()[100] = 255;
        }

        assert_eq!(bpm.get_pin_count(pid), Some(0));

        {
            let guard = bpm.read_page(pid).unwrap().unwrap();
            assert_eq!(guard.data()[0], 42);
            assert_eq!(guard.data()[100], 255);
        }
    }

    #[test]
    fn test_buffer_pool_manager_new_page_write_pins_once() {
        let (bpm, _temp) = create_bpm(10);

        let pid = {
            let mut guard = bpm.new_page_write().unwrap().unwrap();
            guard.data_mut()[0] = 9;
            assert_eq!(bpm.get_pin_count(guard.page_id()), Some(1));
            guard.page_id()
        };

        assert_eq!(bpm.get_pin_count(pid), Some(0));
        let guard = bpm.read_page(pid).unwrap().unwrap();
        assert_eq!(guard.data()[0], 9);
    }

    #[test]
    fn test_buffer_pool_manager_eviction_flushes_dirty_victim() {
        let (bpm, _temp) = create_bpm(3);

        let first = bpm.new_page().unwrap().unwrap().page_id();
        let second = bpm.new_page().unwrap().unwrap().page_id();
        let third = bpm.new_page().unwrap().unwrap().page_id();

        // Pool full of pinned pages: allocation reports exhaustion
        assert!(bpm.new_page().unwrap().is_none());
        assert!(bpm.fetch_page(PageId::new(99)).unwrap().is_none());

        {
            let mut guard = bpm.write_page(first).unwrap().unwrap();
            guard.data_mut()[0] = 7;
        }
        let writes_before = bpm.disk_manager().num_writes();
        assert!(bpm.unpin_page(first, true));

        // The dirty victim is written out before its frame is reused
        let fourth = bpm.new_page().unwrap().unwrap();
        assert_eq!(fourth.page_id(), PageId::new(4));
        assert!(bpm.disk_manager().num_writes() > writes_before);
        assert!(bpm.get_pin_count(first).is_none());

        // Refetching the evicted page brings its data back from disk
        bpm.unpin_page(fourth.page_id(), false);
        let guard = bpm.read_page(first).unwrap().unwrap();
        assert_eq!(guard.data()[0], 7);
        drop(guard);

        let _ = (second, third);
    }

    #[test]
    fn test_buffer_pool_manager_flush() {
        let (bpm, temp) = create_bpm(10);

        let pid = {
            let page = bpm.new_page().unwrap().unwrap();
            let pid = page.page_id();
            {
                let mut guard = bpm.write_page(pid).unwrap().unwrap();
                guard.data_mut()[0] = 42;
            }
            bpm.unpin_page(pid, true);
            pid
        };

        assert!(bpm.flush_page(pid).unwrap());
        assert!(!bpm.flush_page(PageId::new(77)).unwrap());

        drop(bpm);

        let dm = Arc::new(DiskManager::new(temp.path()).unwrap());
        let bpm2 = BufferPoolManager::new(10, 2, dm);
        let guard = bpm2.read_page(pid).unwrap().unwrap();
        assert_eq!(guard.data()[0], 42);
    }

    #[test]
    fn test_buffer_pool_manager_delete_page() {
        let (bpm, _temp) = create_bpm(10);

        let page = bpm.new_page().unwrap().unwrap();
        let pid = page.page_id();

        // Still pinned
        assert!(!bpm.delete_page(pid).unwrap());

        bpm.unpin_page(pid, false);
        assert!(bpm.delete_page(pid).unwrap());
        assert_eq!(bpm.get_pin_count(pid), None);
        assert_eq!(bpm.free_frame_count(), 10);

        // Absent page deletes trivially
        assert!(bpm.delete_page(pid).unwrap());
    }

    #[test]
    fn test_buffer_pool_manager_page_table_consistency() {
        let (bpm, _temp) = create_bpm(5);

        let mut pids = Vec::new();
        for _ in 0..5 {
            let page = bpm.new_page().unwrap().unwrap();
            pids.push(page.page_id());
            bpm.unpin_page(page.page_id(), false);
        }

        // Every mapped page id matches the frame's own id
        for &pid in &pids {
            let page = bpm.fetch_page(pid).unwrap().unwrap();
            assert_eq!(page.page_id(), pid);
            bpm.unpin_page(pid, false);
        }
    }
}
