//! Failed-transition tracker
//!
//! The set of blob identities (destination versions) known to have
//! failed. Under double-snapshot mode an entire plan is rejected up
//! front, before any I/O, if it intersects this set.

use super::UpdatePlan;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

/// Remembers which blobs failed so the driver can short-circuit retries.
#[derive(Default)]
pub struct FailedTransitionTracker {
    failed: Mutex<FxHashSet<u64>>,
}

impl FailedTransitionTracker {
    /// Create an empty tracker.
    pub fn new() -> FailedTransitionTracker {
        FailedTransitionTracker::default()
    }

    /// Record a failed blob by destination version.
    pub fn mark_failed(&self, version: u64) {
        self.failed.lock().insert(version);
    }

    /// Whether the blob with this destination version has failed before.
    pub fn contains(&self, version: u64) -> bool {
        self.failed.lock().contains(&version)
    }

    /// The first blob of `plan` known to have failed, if any.
    pub fn first_failed_in(&self, plan: &UpdatePlan) -> Option<u64> {
        let failed = self.failed.lock();
        plan.blobs()
            .iter()
            .map(|b| b.to_version())
            .find(|v| failed.contains(v))
    }

    /// Number of blobs marked failed.
    pub fn len(&self) -> usize {
        self.failed.lock().len()
    }

    /// Whether no blob is marked failed.
    pub fn is_empty(&self) -> bool {
        self.failed.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::refresh::Blob;

    #[test]
    fn test_mark_and_query() {
        let tracker = FailedTransitionTracker::new();
        assert!(tracker.is_empty());
        tracker.mark_failed(42);
        assert!(tracker.contains(42));
        assert!(!tracker.contains(43));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_plan_intersection() {
        let tracker = FailedTransitionTracker::new();
        tracker.mark_failed(6);
        let plan = UpdatePlan::new(vec![
            Blob::snapshot_in_memory(5, vec![]),
            Blob::delta_in_memory(5, 6, vec![]),
        ])
        .unwrap();
        assert_eq!(tracker.first_failed_in(&plan), Some(6));
    }
}
