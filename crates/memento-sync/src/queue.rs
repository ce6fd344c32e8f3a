//! The coordinator's FIFO operation queue (spec §5 "Ordering guarantees"):
//! operations are processed in enqueue order; a retried operation loses its
//! original position and re-enters at the tail.
//!
//! Lock is held only for the brief push/pop (spec §5 "the coordinator must
//! not hold locks across suspension points other than the queue lock for
//! brief push/pop") — `parking_lot::Mutex` rather than `tokio::sync::Mutex`,
//! since nothing here ever awaits while holding it.

use parking_lot::Mutex;
use std::collections::VecDeque;

#[derive(Default)]
pub struct OperationQueue {
    inner: Mutex<VecDeque<String>>,
}

impl OperationQueue {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Mutex::new(VecDeque::new()) }
    }

    pub fn push_back(&self, op_id: String) {
        self.inner.lock().push_back(op_id);
    }

    pub fn pop_front(&self) -> Option<String> {
        self.inner.lock().pop_front()
    }

    /// Remove a specific operation from the queue (spec §4.1 `cancel`:
    /// "removes from queue/retry set"). Returns whether it was present.
    pub fn remove(&self, op_id: &str) -> bool {
        let mut guard = self.inner.lock();
        let before = guard.len();
        guard.retain(|id| id != op_id);
        guard.len() != before
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_is_preserved() {
        let q = OperationQueue::new();
        q.push_back("a".into());
        q.push_back("b".into());
        q.push_back("c".into());
        assert_eq!(q.pop_front().as_deref(), Some("a"));
        assert_eq!(q.pop_front().as_deref(), Some("b"));
        assert_eq!(q.pop_front().as_deref(), Some("c"));
        assert_eq!(q.pop_front(), None);
    }

    #[test]
    fn retry_requeue_goes_to_the_tail() {
        let q = OperationQueue::new();
        q.push_back("a".into());
        q.push_back("b".into());
        let retried = q.pop_front().unwrap();
        q.push_back(retried);
        assert_eq!(q.pop_front().as_deref(), Some("b"));
        assert_eq!(q.pop_front().as_deref(), Some("a"));
    }

    #[test]
    fn remove_drops_a_queued_operation() {
        let q = OperationQueue::new();
        q.push_back("a".into());
        q.push_back("b".into());
        assert!(q.remove("a"));
        assert!(!q.remove("a"));
        assert_eq!(q.pop_front().as_deref(), Some("b"));
    }
}
