//! Queue synchronization primitives.
//!
//! Every queue owns a timeline [`Fence`]. Each submission issues the next
//! value on that timeline and the GPU signals it when the work completes; the
//! pair `(queue, value)` is a [`SyncPoint`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::types::QueueType;

/// A point on a queue's timeline.
///
/// Waiting on a sync point means "do not start until the producing queue's
/// fence has reached `value`". Values on one queue only ever grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SyncPoint {
    queue: QueueType,
    value: u64,
}

impl SyncPoint {
    /// Create a sync point.
    pub fn new(queue: QueueType, value: u64) -> Self {
        Self { queue, value }
    }

    /// Queue that issued the sync point.
    pub fn queue(&self) -> QueueType {
        self.queue
    }

    /// Fence value the queue signals on completion.
    pub fn value(&self) -> u64 {
        self.value
    }
}

impl std::fmt::Display for SyncPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.queue, self.value)
    }
}

/// Monotonic timeline fence.
///
/// Clones share the same timeline.
#[derive(Debug, Clone)]
pub struct Fence {
    queue: QueueType,
    issued: Arc<AtomicU64>,
    completed: Arc<AtomicU64>,
}

impl Fence {
    /// Create a fence for `queue` with nothing issued yet.
    pub fn new(queue: QueueType) -> Self {
        Self {
            queue,
            issued: Arc::new(AtomicU64::new(0)),
            completed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Issue the next value for a new submission.
    pub fn issue(&self) -> SyncPoint {
        let value = self.issued.fetch_add(1, Ordering::AcqRel) + 1;
        SyncPoint::new(self.queue, value)
    }

    /// Last value handed out by [`issue`](Self::issue).
    pub fn last_issued(&self) -> u64 {
        self.issued.load(Ordering::Acquire)
    }

    /// Last value the GPU has signaled.
    pub fn completed_value(&self) -> u64 {
        self.completed.load(Ordering::Acquire)
    }

    /// Whether the GPU has reached `sync_point`.
    pub fn is_completed(&self, sync_point: SyncPoint) -> bool {
        self.completed_value() >= sync_point.value
    }

    /// Whether `sync_point` belongs to this timeline and has been issued.
    pub fn has_issued(&self, sync_point: SyncPoint) -> bool {
        sync_point.queue == self.queue && sync_point.value != 0 && sync_point.value <= self.last_issued()
    }

    /// Record that the GPU finished work up to `value`.
    ///
    /// Never moves the completed value backwards.
    pub(crate) fn signal(&self, value: u64) {
        self.completed.fetch_max(value, Ordering::AcqRel);
    }

    /// Block until the fence reaches `sync_point` or `timeout` elapses.
    ///
    /// Returns `true` if the sync point completed.
    pub fn wait_timeout(&self, sync_point: SyncPoint, timeout: Duration) -> bool {
        let start = Instant::now();
        while !self.is_completed(sync_point) {
            if start.elapsed() >= timeout {
                return false;
            }
            std::hint::spin_loop();
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_is_monotonic() {
        let fence = Fence::new(QueueType::Direct);
        let a = fence.issue();
        let b = fence.issue();
        assert_eq!(a.value(), 1);
        assert_eq!(b.value(), 2);
        assert!(a < b);
        assert_eq!(fence.last_issued(), 2);
    }

    #[test]
    fn test_sync_points_order_by_queue_then_value() {
        let mut points = vec![
            SyncPoint::new(QueueType::AsyncCompute, 1),
            SyncPoint::new(QueueType::Direct, 3),
            SyncPoint::new(QueueType::Direct, 2),
        ];
        points.sort();
        assert_eq!(
            points,
            vec![
                SyncPoint::new(QueueType::Direct, 2),
                SyncPoint::new(QueueType::Direct, 3),
                SyncPoint::new(QueueType::AsyncCompute, 1),
            ]
        );
    }

    #[test]
    fn test_signal_never_goes_back() {
        let fence = Fence::new(QueueType::AsyncCompute);
        let a = fence.issue();
        let b = fence.issue();
        fence.signal(b.value());
        fence.signal(a.value());
        assert_eq!(fence.completed_value(), 2);
        assert!(fence.is_completed(a));
    }

    #[test]
    fn test_has_issued() {
        let fence = Fence::new(QueueType::Direct);
        assert!(!fence.has_issued(SyncPoint::new(QueueType::Direct, 1)));
        let sp = fence.issue();
        assert!(fence.has_issued(sp));
        assert!(!fence.has_issued(SyncPoint::new(QueueType::AsyncCompute, 1)));
        assert!(!fence.has_issued(SyncPoint::new(QueueType::Direct, 0)));
    }

    #[test]
    fn test_signal_from_other_thread_and_wait() {
        let fence = Fence::new(QueueType::Direct);
        let sp = fence.issue();

        let gpu = fence.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            gpu.signal(sp.value());
        });

        assert!(fence.wait_timeout(sp, Duration::from_secs(5)));
    }

    #[test]
    fn test_wait_timeout_expires() {
        let fence = Fence::new(QueueType::Direct);
        let sp = fence.issue();
        assert!(!fence.wait_timeout(sp, Duration::from_millis(10)));
    }

    #[test]
    fn test_sync_point_display() {
        assert_eq!(SyncPoint::new(QueueType::AsyncCompute, 3).to_string(), "async-compute@3");
    }
}
