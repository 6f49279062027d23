use std::ops::{Deref, DerefMut};

use parking_lot::{RwLockReadGuard, RwLockWriteGuard};

use crate::common::{PageId, PAGE_SIZE};

use super::buffer_pool_manager::BufferPoolState;
use super::Page;

/// Shared lease on a page: one pin plus the page rw-latch in read mode,
/// both returned when the guard goes out of scope. The lease borrows the
/// pool, so a guard can never outlive the frames it points into.
pub struct ReadPageGuard<'a> {
    page_id: PageId,
    pool: &'a BufferPoolState,
    latch: RwLockReadGuard<'a, Box<[u8; PAGE_SIZE]>>,
}

impl<'a> ReadPageGuard<'a> {
    /// Takes the page rw-latch; the caller has already pinned the page,
    /// which is what keeps the frame's identity stable underneath us.
    pub(crate) fn new(page_id: PageId, pool: &'a BufferPoolState, page: &'a Page) -> Self {
        Self {
            page_id,
            pool,
            latch: page.payload(),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        self.latch.as_slice()
    }
}

impl Deref for ReadPageGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl Drop for ReadPageGuard<'_> {
    fn drop(&mut self) {
        // The latch is released right after this by the field drop. An
        // eviction racing in on the freshly unpinned page still has to
        // queue on the latch before it can retarget the frame.
        self.pool.unpin(self.page_id, false);
    }
}

/// Exclusive lease on a page. Tracks whether the payload was actually
/// written through it and unpins with exactly that dirtiness, so an
/// untouched write guard hands its page back clean.
pub struct WritePageGuard<'a> {
    page_id: PageId,
    pool: &'a BufferPoolState,
    dirtied: bool,
    latch: RwLockWriteGuard<'a, Box<[u8; PAGE_SIZE]>>,
}

impl<'a> WritePageGuard<'a> {
    pub(crate) fn new(page_id: PageId, pool: &'a BufferPoolState, page: &'a Page) -> Self {
        Self {
            page_id,
            pool,
            dirtied: false,
            latch: page.payload_mut(),
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        self.latch.as_slice()
    }

    /// Hands out the payload for writing and remembers the page must go
    /// back dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.dirtied = true;
        self.latch.as_mut_slice()
    }
}

impl Deref for WritePageGuard<'_> {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.data()
    }
}

impl DerefMut for WritePageGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.data_mut()
    }
}

impl Drop for WritePageGuard<'_> {
    fn drop(&mut self) {
        self.pool.unpin(self.page_id, self.dirtied);
    }
}
