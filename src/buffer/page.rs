use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::common::{FrameId, PageId, INVALID_PAGE_ID, PAGE_SIZE};

/// A buffer frame and the page currently resident in it.
///
/// The payload bytes sit behind the page rw-latch; everything else is
/// lock-free. The identity word is a plain atomic rather than a lock of
/// its own: it is only ever rewritten while the buffer pool holds its
/// coordination latch, so readers never race a writer on it. Pin count
/// and dirty flag are touched from unpin paths that hold no latch at all.
pub struct Page {
    /// Index of this frame in the pool's page array
    frame_id: FrameId,
    /// Id of the resident page, INVALID_PAGE_ID while the frame is free.
    /// Rewritten only under the pool's coordination latch.
    page_id: AtomicI32,
    /// Number of callers currently using the payload
    pin_count: AtomicU32,
    /// Set when the payload diverges from disk, cleared by a flush
    is_dirty: AtomicBool,
    /// The payload bytes, guarded by the page rw-latch
    latch: RwLock<Box<[u8; PAGE_SIZE]>>,
}

impl Page {
    pub fn new(frame_id: FrameId) -> Self {
        Self {
            frame_id,
            page_id: AtomicI32::new(INVALID_PAGE_ID.as_i32()),
            pin_count: AtomicU32::new(0),
            is_dirty: AtomicBool::new(false),
            latch: RwLock::new(Box::new([0u8; PAGE_SIZE])),
        }
    }

    pub fn frame_id(&self) -> FrameId {
        self.frame_id
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(self.page_id.load(Ordering::Acquire))
    }

    pub fn set_page_id(&self, page_id: PageId) {
        self.page_id.store(page_id.as_i32(), Ordering::Release);
    }

    /// True while no page is resident in this frame.
    pub fn is_free(&self) -> bool {
        !self.page_id().is_valid()
    }

    pub fn pin_count(&self) -> u32 {
        self.pin_count.load(Ordering::Acquire)
    }

    /// Takes one pin and returns the new count.
    pub fn pin(&self) -> u32 {
        self.pin_count.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Drops one pin and returns the remaining count. Returns None when
    /// the count is already zero; the count never wraps below it.
    pub fn unpin(&self) -> Option<u32> {
        self.pin_count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| n.checked_sub(1))
            .ok()
            .map(|prev| prev - 1)
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty.load(Ordering::Acquire)
    }

    /// Records that the payload diverged from its on-disk image. The flag
    /// only travels one way here; a flush is what clears it.
    pub fn mark_dirty(&self) {
        self.is_dirty.store(true, Ordering::Release);
    }

    pub fn clear_dirty(&self) {
        self.is_dirty.store(false, Ordering::Release);
    }

    /// Acquires the page rw-latch in shared mode.
    pub fn payload(&self) -> RwLockReadGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.latch.read()
    }

    /// Acquires the page rw-latch in exclusive mode.
    pub fn payload_mut(&self) -> RwLockWriteGuard<'_, Box<[u8; PAGE_SIZE]>> {
        self.latch.write()
    }

    /// Wipes the slot so it can take on a new identity: invalid page id,
    /// zero pins, clean, zeroed payload.
    pub fn reset(&self) {
        self.set_page_id(INVALID_PAGE_ID);
        self.pin_count.store(0, Ordering::Release);
        self.clear_dirty();
        self.payload_mut().fill(0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_frame_is_free_and_clean() {
        let page = Page::new(FrameId::new(4));

        assert_eq!(page.frame_id(), FrameId::new(4));
        assert!(page.is_free());
        assert_eq!(page.pin_count(), 0);
        assert!(!page.is_dirty());
        assert!(page.payload().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_identity_assignment() {
        let page = Page::new(FrameId::new(0));

        page.set_page_id(PageId::new(9));
        assert_eq!(page.page_id(), PageId::new(9));
        assert!(!page.is_free());

        page.set_page_id(INVALID_PAGE_ID);
        assert!(page.is_free());
    }

    #[test]
    fn test_unpin_never_goes_below_zero() {
        let page = Page::new(FrameId::new(0));

        assert_eq!(page.unpin(), None);

        assert_eq!(page.pin(), 1);
        assert_eq!(page.pin(), 2);
        assert_eq!(page.unpin(), Some(1));
        assert_eq!(page.unpin(), Some(0));
        assert_eq!(page.unpin(), None);
        assert_eq!(page.pin_count(), 0);
    }

    #[test]
    fn test_dirty_flag_is_one_way_until_cleared() {
        let page = Page::new(FrameId::new(0));

        page.mark_dirty();
        page.mark_dirty();
        assert!(page.is_dirty());

        page.clear_dirty();
        assert!(!page.is_dirty());
    }

    #[test]
    fn test_payload_round_trip_through_latch() {
        let page = Page::new(FrameId::new(0));

        {
            let mut payload = page.payload_mut();
            payload[0] = 0xAA;
            payload[PAGE_SIZE - 1] = 0xBB;
        }

        let payload = page.payload();
        assert_eq!(payload[0], 0xAA);
        assert_eq!(payload[PAGE_SIZE - 1], 0xBB);
    }

    #[test]
    fn test_reset_wipes_identity_pins_and_payload() {
        let page = Page::new(FrameId::new(0));

        page.set_page_id(PageId::new(5));
        page.pin();
        page.mark_dirty();
        page.payload_mut().fill(0xFF);

        page.reset();

        assert!(page.is_free());
        assert_eq!(page.pin_count(), 0);
        assert!(!page.is_dirty());
        assert!(page.payload().iter().all(|&b| b == 0));
    }
}
