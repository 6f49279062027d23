use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::common::{FrameId, Timestamp};

/// Access history for a single frame
#[derive(Debug)]
struct FrameAccessInfo {
    /// The last k access timestamps, oldest at the front
    history: VecDeque<Timestamp>,
    /// Whether this frame is currently an eviction candidate
    is_evictable: bool,
}

impl FrameAccessInfo {
    fn new() -> Self {
        Self {
            history: VecDeque::new(),
            is_evictable: false,
        }
    }

    fn record_access(&mut self, timestamp: Timestamp, k: usize) {
        self.history.push_back(timestamp);
        while self.history.len() > k {
            self.history.pop_front();
        }
    }

    /// Timestamp of the k-th most recent access, or None when fewer than
    /// k accesses exist (+inf backward k-distance).
    fn kth_prev(&self, k: usize) -> Option<Timestamp> {
        if self.history.len() < k {
            None
        } else {
            // history is bounded at k entries, so the front is the k-th
            // most recent access
            self.history.front().copied()
        }
    }

    fn earliest(&self) -> Option<Timestamp> {
        self.history.front().copied()
    }
}

/// LRU-K replacement policy.
///
/// The replacer evicts the frame with the largest backward k-distance,
/// the difference between the current time and the timestamp of the k-th
/// most recent access. A frame with fewer than k recorded accesses has
/// +inf distance; among those, the frame with the earliest first access
/// is evicted. Only frames marked evictable are candidates.
pub struct LruKReplacer {
    /// Number of frames the replacer tracks; frame ids must be in range
    num_frames: usize,
    /// K value for the LRU-K algorithm
    k: usize,
    /// Monotonic clock; strictly increasing within the process
    current_timestamp: AtomicU64,
    /// Access history and evictability, per frame
    frame_info: Mutex<HashMap<FrameId, FrameAccessInfo>>,
    /// Number of evictable frames
    num_evictable: Mutex<usize>,
}

impl LruKReplacer {
    pub fn new(num_frames: usize, k: usize) -> Self {
        assert!(k > 0, "LRU-K requires k > 0");
        Self {
            num_frames,
            k,
            current_timestamp: AtomicU64::new(0),
            frame_info: Mutex::new(HashMap::new()),
            num_evictable: Mutex::new(0),
        }
    }

    /// Evicts the candidate with the largest backward k-distance and
    /// clears its history. Returns None if no frame is evictable.
    pub fn evict(&self) -> Option<FrameId> {
        let mut frame_info = self.frame_info.lock();
        let mut num_evictable = self.num_evictable.lock();

        if *num_evictable == 0 {
            return None;
        }

        let mut victim: Option<FrameId> = None;
        let mut victim_kth: Option<Timestamp> = None;
        let mut victim_earliest: Option<Timestamp> = None;

        for (frame_id, info) in frame_info.iter() {
            if !info.is_evictable {
                continue;
            }

            let kth = info.kth_prev(self.k);
            let earliest = info.earliest();

            let should_replace = match (victim_kth, kth) {
                // Candidate has full history, victim does not: keep victim
                (None, Some(_)) => false,
                // Victim has full history, candidate does not: replace
                (Some(_), None) => true,
                // Both below k accesses: earliest first access wins
                (None, None) => match (victim_earliest, earliest) {
                    (Some(v_ts), Some(c_ts)) => c_ts < v_ts,
                    (None, Some(_)) => true,
                    _ => false,
                },
                // Both have k accesses: earliest k-th-most-recent wins
                (Some(v_ts), Some(c_ts)) => c_ts < v_ts,
            };

            if victim.is_none() || should_replace {
                victim = Some(*frame_id);
                victim_kth = kth;
                victim_earliest = earliest;
            }
        }

        if let Some(frame_id) = victim {
            frame_info.remove(&frame_id);
            *num_evictable -= 1;
        }

        victim
    }

    /// Appends the current timestamp to the frame's history, creating the
    /// entry if absent. New frames start out non-evictable.
    pub fn record_access(&self, frame_id: FrameId) {
        self.check_frame_id(frame_id);

        let timestamp = self.current_timestamp.fetch_add(1, Ordering::Relaxed);
        let mut frame_info = self.frame_info.lock();

        frame_info
            .entry(frame_id)
            .or_insert_with(FrameAccessInfo::new)
            .record_access(timestamp, self.k);
    }

    /// Toggles a frame's evictability.
    pub fn set_evictable(&self, frame_id: FrameId, is_evictable: bool) {
        self.check_frame_id(frame_id);

        let mut frame_info = self.frame_info.lock();
        let mut num_evictable = self.num_evictable.lock();

        if let Some(info) = frame_info.get_mut(&frame_id) {
            if info.is_evictable != is_evictable {
                if is_evictable {
                    *num_evictable += 1;
                } else {
                    *num_evictable -= 1;
                }
                info.is_evictable = is_evictable;
            }
        } else if is_evictable {
            let mut info = FrameAccessInfo::new();
            info.is_evictable = true;
            frame_info.insert(frame_id, info);
            *num_evictable += 1;
        }
    }

    /// Drops a specific frame from the replacer. Removing a frame that is
    /// present but not evictable is a protocol error; removing an absent
    /// frame is a no-op.
    pub fn remove(&self, frame_id: FrameId) {
        self.check_frame_id(frame_id);

        let mut frame_info = self.frame_info.lock();
        let mut num_evictable = self.num_evictable.lock();

        if let Some(info) = frame_info.get(&frame_id) {
            if !info.is_evictable {
                panic!("protocol error: remove of non-evictable {frame_id}");
            }
            frame_info.remove(&frame_id);
            *num_evictable -= 1;
        }
    }

    /// Number of currently evictable frames.
    pub fn size(&self) -> usize {
        *self.num_evictable.lock()
    }

    pub fn k(&self) -> usize {
        self.k
    }

    fn check_frame_id(&self, frame_id: FrameId) {
        assert!(
            frame_id.as_i32() >= 0 && (frame_id.as_i32() as usize) < self.num_frames,
            "{frame_id} out of range for replacer of {} frames",
            self.num_frames
        );
    }
}
