use crate::{
    assignment::OwnershipTracker,
    config::{CommitConfig, CommitPolicy},
    error::{ClientError, Result},
    transport::{CommitMap, TransportClient},
    types::TopicPartition,
};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Commit-progress counters
///
/// Stale-epoch and unowned discards are normal consequences of rebalances
/// racing in-flight work; they are counted here for diagnosis rather than
/// reported as errors.
#[derive(Debug, Default)]
pub struct CommitMetrics {
    pub records_completed: AtomicU64,
    pub stale_discards: AtomicU64,
    pub unowned_discards: AtomicU64,
    pub flushes: AtomicU64,
    pub failed_flushes: AtomicU64,
    pub offsets_flushed: AtomicU64,
}

/// Per-partition commit progress
///
/// `high_water` is the next offset to commit (exclusive upper bound).
/// Under the strict policy `completed` holds out-of-order completions
/// waiting for the gap below them to close.
#[derive(Debug, Default)]
struct PartitionProgress {
    high_water: Option<u64>,
    completed: BTreeSet<u64>,
    dirty: bool,
}

/// Tracks, per owned partition, the highest offset that is safe to commit,
/// and batches commit RPCs according to policy
///
/// Workers report completions through [`record_completed`]; they never see
/// the pending map itself. Entries for different partitions live in
/// separate shards so completions for different partitions do not contend,
/// while two completions for the same partition are serialized to keep the
/// high-water mark monotonic.
///
/// [`record_completed`]: CommitManager::record_completed
pub struct CommitManager {
    transport: Arc<dyn TransportClient>,
    tracker: Arc<OwnershipTracker>,
    config: CommitConfig,
    partitions: DashMap<TopicPartition, PartitionProgress>,
    pending_completions: AtomicU64,
    last_flush: Mutex<Instant>,
    metrics: Arc<CommitMetrics>,
}

impl CommitManager {
    /// Create a commit manager over the given transport and tracker
    pub fn new(
        transport: Arc<dyn TransportClient>,
        tracker: Arc<OwnershipTracker>,
        config: CommitConfig,
    ) -> Self {
        Self {
            transport,
            tracker,
            config,
            partitions: DashMap::new(),
            pending_completions: AtomicU64::new(0),
            last_flush: Mutex::new(Instant::now()),
            metrics: Arc::new(CommitMetrics::default()),
        }
    }

    /// Note that a record is about to be dispatched to a worker
    ///
    /// The first dispatched offset per partition establishes the commit
    /// floor: records are fetched in log order within a partition, so
    /// nothing below it is outstanding.
    pub fn record_dispatched(&self, tp: &TopicPartition, offset: u64) {
        let mut progress = self.partitions.entry(tp.clone()).or_default();
        if progress.high_water.is_none() {
            progress.high_water = Some(offset);
        }
    }

    /// Report a completed record
    ///
    /// `epoch` must be the ownership epoch captured when the record was
    /// dispatched. A completion for a partition that is no longer owned,
    /// or that was re-acquired after the dispatch, was computed under a
    /// revoked assignment; committing it could resurrect progress on a
    /// partition meanwhile owned by another consumer, so it is dropped
    /// and counted. Assignment changes that leave the partition
    /// continuously owned do not invalidate the completion.
    pub fn record_completed(&self, tp: &TopicPartition, offset: u64, epoch: u64) {
        let acquired_at = match self.tracker.partition_epoch(tp) {
            Some(acquired_at) => acquired_at,
            None => {
                self.metrics.unowned_discards.fetch_add(1, Ordering::Relaxed);
                debug!("discarding completion for unowned partition {}@{}", tp, offset);
                return;
            }
        };
        if epoch < acquired_at {
            self.metrics.stale_discards.fetch_add(1, Ordering::Relaxed);
            debug!("discarding stale completion {}@{} (epoch {})", tp, offset, epoch);
            return;
        }

        let mut progress = self.partitions.entry(tp.clone()).or_default();
        match self.config.policy {
            CommitPolicy::Strict => {
                let mut high_water = progress.high_water.unwrap_or(offset);
                if offset >= high_water {
                    progress.completed.insert(offset);
                    let mut advanced = false;
                    while progress.completed.remove(&high_water) {
                        high_water += 1;
                        advanced = true;
                    }
                    progress.high_water = Some(high_water);
                    if advanced {
                        progress.dirty = true;
                    }
                }
            }
            CommitPolicy::MaxCompleted => {
                let next = offset + 1;
                if progress.high_water.map_or(true, |hw| next > hw) {
                    progress.high_water = Some(next);
                    progress.dirty = true;
                }
            }
        }
        drop(progress);

        self.pending_completions.fetch_add(1, Ordering::Relaxed);
        self.metrics.records_completed.fetch_add(1, Ordering::Relaxed);
    }

    /// Flush when the pending completion count or the elapsed time since
    /// the last flush crosses its threshold, whichever comes first
    pub async fn maybe_auto_flush(&self) -> Result<()> {
        let pending = self.pending_completions.load(Ordering::Relaxed);
        if pending == 0 {
            return Ok(());
        }
        let due_by_count = pending >= self.config.batch_size as u64;
        let due_by_time = self.last_flush.lock().elapsed() >= self.config.flush_interval;
        if due_by_count || due_by_time {
            self.flush(None).await
        } else {
            Ok(())
        }
    }

    /// Synchronously commit pending offsets
    ///
    /// `partitions` limits the flush to the given set (used by revocation
    /// handling); `None` flushes everything. Entries for partitions no
    /// longer owned are discarded, never committed: they belong to a
    /// previous ownership epoch. Failure is reported, not retried here;
    /// retrying inside a rebalance window risks committing against a
    /// partition already reassigned.
    pub async fn flush(&self, partitions: Option<&[TopicPartition]>) -> Result<()> {
        let mut to_commit = CommitMap::new();
        let mut stale = Vec::new();

        for entry in self.partitions.iter() {
            let tp = entry.key();
            if let Some(selected) = partitions {
                if !selected.contains(tp) {
                    continue;
                }
            }
            if !self.tracker.owns(tp) {
                stale.push(tp.clone());
                continue;
            }
            if entry.dirty {
                if let Some(high_water) = entry.high_water {
                    to_commit.insert(tp.clone(), high_water);
                }
            }
        }

        for tp in &stale {
            self.partitions.remove(tp);
            self.metrics.unowned_discards.fetch_add(1, Ordering::Relaxed);
            debug!("discarded pending commit state for unowned partition {}", tp);
        }

        if to_commit.is_empty() {
            return Ok(());
        }

        let committed = tokio::time::timeout(
            self.config.flush_timeout,
            self.transport.commit_offsets(&to_commit),
        )
        .await
        .unwrap_or_else(|_| {
            Err(ClientError::Timeout {
                timeout_ms: self.config.flush_timeout.as_millis() as u64,
            })
        });

        match committed {
            Ok(()) => {
                for (tp, committed) in &to_commit {
                    if let Some(mut progress) = self.partitions.get_mut(tp) {
                        // completions may have advanced the mark during the RPC
                        if progress.high_water == Some(*committed) {
                            progress.dirty = false;
                        }
                    }
                }
                *self.last_flush.lock() = Instant::now();
                if partitions.is_none() {
                    self.pending_completions.store(0, Ordering::Relaxed);
                }
                self.metrics.flushes.fetch_add(1, Ordering::Relaxed);
                self.metrics
                    .offsets_flushed
                    .fetch_add(to_commit.len() as u64, Ordering::Relaxed);
                info!("committed offsets for {} partition(s)", to_commit.len());
                Ok(())
            }
            Err(e) => {
                self.metrics.failed_flushes.fetch_add(1, Ordering::Relaxed);
                warn!("offset commit for {} partition(s) failed: {e}", to_commit.len());
                Err(e)
            }
        }
    }

    /// Drop pending state for partitions leaving this member's ownership
    pub fn discard_partitions(&self, partitions: &[TopicPartition]) {
        for tp in partitions {
            if self.partitions.remove(tp).is_some() {
                debug!("cleared pending commit state for {}", tp);
            }
        }
    }

    /// Commit-progress counters
    pub fn metrics(&self) -> Arc<CommitMetrics> {
        self.metrics.clone()
    }
}
