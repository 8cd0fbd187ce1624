//! # Update Task Queue
//!
//! The single mutable structure shared between the change detectors
//! (producers) and the rotation orchestrator (consumer). Pending tasks are
//! keyed by canonical secret name, so a second detection of the same secret
//! before the next drain overwrites the pending task instead of duplicating
//! it (last write wins). Drains swap the whole map out under the lock, so a
//! detector pushing mid-drain lands either wholly in this batch or the next.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};

/// A pending rotation for one secret file, produced by a change detector and
/// consumed exactly once by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateTask {
    /// Canonical secret name (join key with cluster secret objects)
    pub canonical_name: String,
    /// Namespace the watched directory belongs to
    pub namespace: String,
    /// Watched directory path
    pub directory: String,
    /// Filename within the directory
    pub filename: String,
    /// File payload, base64-encoded for the Control API
    pub content: String,
    /// When the change was detected
    pub detected_at: DateTime<Utc>,
}

/// Coalescing queue of pending rotation tasks, cloneable across tasks.
#[derive(Debug, Clone, Default)]
pub struct UpdateQueue {
    inner: Arc<Mutex<HashMap<String, UpdateTask>>>,
}

impl UpdateQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the pending task for its canonical name.
    pub fn push(&self, task: UpdateTask) {
        let mut pending = self.inner.lock().expect("update queue poisoned");
        pending.insert(task.canonical_name.clone(), task);
    }

    /// Atomically take every pending task, leaving the queue empty.
    pub fn drain(&self) -> Vec<UpdateTask> {
        let mut pending = self.inner.lock().expect("update queue poisoned");
        let batch = std::mem::take(&mut *pending);
        batch.into_values().collect()
    }

    /// Detection time of the oldest pending task, if any. Drives the
    /// orchestrator's dwell check: a batch younger than the configured
    /// rotation interval is left to settle.
    pub fn first_detected_at(&self) -> Option<DateTime<Utc>> {
        let pending = self.inner.lock().expect("update queue poisoned");
        pending.values().map(|t| t.detected_at).min()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().expect("update queue poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str, content: &str) -> UpdateTask {
        UpdateTask {
            canonical_name: name.to_string(),
            namespace: "ns".to_string(),
            directory: "/run/secrets".to_string(),
            filename: format!("{}.txt", name),
            content: content.to_string(),
            detected_at: Utc::now(),
        }
    }

    #[test]
    fn test_push_coalesces_by_canonical_name() {
        let queue = UpdateQueue::new();
        queue.push(task("ns_a", "one"));
        queue.push(task("ns_a", "two"));
        queue.push(task("ns_b", "three"));

        assert_eq!(queue.len(), 2);
        let batch = queue.drain();
        let a = batch.iter().find(|t| t.canonical_name == "ns_a").unwrap();
        assert_eq!(a.content, "two", "last write wins");
    }

    #[test]
    fn test_drain_empties_queue() {
        let queue = UpdateQueue::new();
        queue.push(task("ns_a", "x"));
        assert_eq!(queue.drain().len(), 1);
        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_first_detected_at_tracks_oldest() {
        let queue = UpdateQueue::new();
        assert!(queue.first_detected_at().is_none());

        let mut old = task("ns_a", "x");
        old.detected_at = Utc::now() - chrono::Duration::seconds(30);
        let newer = task("ns_b", "y");

        queue.push(newer);
        queue.push(old.clone());
        assert_eq!(queue.first_detected_at(), Some(old.detected_at));
    }

    #[test]
    fn test_concurrent_push_during_drain_is_not_lost() {
        use std::thread;

        let queue = UpdateQueue::new();
        for i in 0..64 {
            queue.push(task(&format!("ns_{}", i), "x"));
        }

        let producer = {
            let queue = queue.clone();
            thread::spawn(move || {
                for i in 64..128 {
                    queue.push(task(&format!("ns_{}", i), "x"));
                }
            })
        };

        let mut drained = queue.drain().len();
        producer.join().unwrap();
        drained += queue.drain().len();
        assert_eq!(drained, 128);
    }
}
