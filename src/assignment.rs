use crate::{commit::CommitManager, error::Result, types::TopicPartition};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{error, info, warn};

/// Tracks the partitions this process currently owns within its consumer
/// group, together with the ownership epoch
///
/// The epoch is bumped on every assignment transition, and each owned
/// partition remembers the epoch at which this member acquired it. Work
/// dispatched to workers carries the epoch current at dispatch time; a
/// completion is stale when its partition is no longer owned or was
/// re-acquired after the dispatch. Assignment changes that leave a
/// partition continuously owned do not invalidate its in-flight work.
///
/// Rebalance mutations (`on_assigned`/`on_revoked`/`on_lost`) are invoked
/// from the single-threaded group-control path; the queries are safe from
/// any thread.
#[derive(Debug, Default)]
pub struct OwnershipTracker {
    assignment: RwLock<HashMap<TopicPartition, u64>>,
    epoch: AtomicU64,
}

impl OwnershipTracker {
    /// Create an empty tracker at epoch zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the partition is in the current assignment
    pub fn owns(&self, tp: &TopicPartition) -> bool {
        self.assignment.read().contains_key(tp)
    }

    /// The current ownership epoch
    pub fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Epoch at which the partition was acquired, if currently owned
    ///
    /// Work dispatched with an epoch older than this was fetched under a
    /// previous ownership span and must not be committed.
    pub fn partition_epoch(&self, tp: &TopicPartition) -> Option<u64> {
        self.assignment.read().get(tp).copied()
    }

    /// Snapshot of the current assignment, sorted for stable iteration
    pub fn assignment(&self) -> Vec<TopicPartition> {
        let mut partitions: Vec<_> = self.assignment.read().keys().cloned().collect();
        partitions.sort();
        partitions
    }

    /// Handle partitions newly assigned to this member
    ///
    /// No commit is needed: a fresh assignment resumes from the
    /// broker-tracked position. A partition already owned keeps its
    /// original acquisition epoch so in-flight work on it stays valid.
    pub fn on_assigned(&self, partitions: &[TopicPartition]) {
        let epoch = self.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        {
            let mut assignment = self.assignment.write();
            for tp in partitions {
                assignment.entry(tp.clone()).or_insert(epoch);
            }
        }
        info!(
            "assigned {} partition(s), epoch now {}: {}",
            partitions.len(),
            epoch,
            format_partitions(partitions)
        );
    }

    /// Handle partitions being revoked by the group coordinator
    ///
    /// Flushes pending offsets for exactly the revoked partitions before
    /// releasing them, so the next owner resumes from this member's
    /// progress. A flush failure is reported but the partitions are still
    /// released; holding the whole group hostage is worse than a
    /// reprocessing window for the next owner.
    pub async fn on_revoked(
        &self,
        partitions: &[TopicPartition],
        commits: &CommitManager,
    ) -> Result<()> {
        warn!(
            "revoking {} partition(s): {}",
            partitions.len(),
            format_partitions(partitions)
        );

        let flush_result = commits.flush(Some(partitions)).await;
        if let Err(e) = &flush_result {
            error!("commit before releasing revoked partitions failed: {e}");
        }

        {
            let mut assignment = self.assignment.write();
            for tp in partitions {
                assignment.remove(tp);
            }
        }
        self.epoch.fetch_add(1, Ordering::AcqRel);
        commits.discard_partitions(partitions);

        flush_result
    }

    /// Handle partitions that are already gone (e.g. session timeout)
    ///
    /// No commit is attempted; pending state for the lost partitions is
    /// discarded and in-flight work goes stale via the epoch bump.
    pub fn on_lost(&self, partitions: &[TopicPartition], commits: &CommitManager) {
        error!(
            "lost {} partition(s) without revocation: {}",
            partitions.len(),
            format_partitions(partitions)
        );

        {
            let mut assignment = self.assignment.write();
            for tp in partitions {
                assignment.remove(tp);
            }
        }
        self.epoch.fetch_add(1, Ordering::AcqRel);
        commits.discard_partitions(partitions);
    }
}

fn format_partitions(partitions: &[TopicPartition]) -> String {
    partitions
        .iter()
        .map(|tp| tp.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}
