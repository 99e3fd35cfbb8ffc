use crate::{
    assignment::OwnershipTracker,
    commit::CommitManager,
    config::ConsumerConfig,
    error::{ClientError, Result},
    record::Record,
    transport::{FetchEvent, RebalanceEvent, TransportClient},
};
use futures::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Processor counters
#[derive(Debug, Default)]
pub struct ProcessorMetrics {
    pub records_dispatched: AtomicU64,
    pub records_processed: AtomicU64,
    pub records_failed: AtomicU64,
    pub records_dropped: AtomicU64,
}

/// Pulls records from the transport and dispatches each to a worker under
/// a concurrency limit, feeding completions to the commit manager
///
/// One fetch loop owns the group-control path: rebalance events from the
/// transport are handled inline and sequentially, so revocation commits
/// finish before the rebalance round completes. Workers only report back
/// through [`CommitManager::record_completed`], tagged with the ownership
/// epoch captured at dispatch time.
pub struct Processor {
    id: String,
    config: Arc<ConsumerConfig>,
    transport: Arc<dyn TransportClient>,
    tracker: Arc<OwnershipTracker>,
    commits: Arc<CommitManager>,
    slots: Arc<Semaphore>,
    cancel: CancellationToken,
    metrics: Arc<ProcessorMetrics>,
}

/// Builder for creating processors
pub struct ProcessorBuilder {
    config: Option<ConsumerConfig>,
    transport: Option<Arc<dyn TransportClient>>,
    cancel: Option<CancellationToken>,
}

impl ProcessorBuilder {
    /// Create a new processor builder
    pub fn new() -> Self {
        Self {
            config: None,
            transport: None,
            cancel: None,
        }
    }

    /// Set consumer configuration
    pub fn config(mut self, config: ConsumerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the transport used for fetching and committing
    pub fn transport(mut self, transport: Arc<dyn TransportClient>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Use an externally owned cancellation token
    pub fn cancellation_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Build the processor
    pub fn build(self) -> Result<Processor> {
        let config = self
            .config
            .ok_or_else(|| ClientError::InvalidConfig("consumer config is required".to_string()))?;
        config.validate()?;
        let transport = self
            .transport
            .ok_or_else(|| ClientError::InvalidConfig("transport is required".to_string()))?;

        let id = config
            .consumer_id
            .clone()
            .unwrap_or_else(|| format!("consumer-{}", Uuid::new_v4()));
        let tracker = Arc::new(OwnershipTracker::new());
        let commits = Arc::new(CommitManager::new(
            transport.clone(),
            tracker.clone(),
            config.commit.clone(),
        ));
        let slots = Arc::new(Semaphore::new(config.processor.concurrency_limit));

        info!(
            "created processor {} for group {} with {} worker slot(s)",
            id, config.group_id, config.processor.concurrency_limit
        );

        Ok(Processor {
            id,
            config: Arc::new(config),
            transport,
            tracker,
            commits,
            slots,
            cancel: self.cancel.unwrap_or_default(),
            metrics: Arc::new(ProcessorMetrics::default()),
        })
    }
}

impl Default for ProcessorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor {
    /// Run the fetch/dispatch loop until cancellation or a fatal error
    ///
    /// `process_fn` is invoked once per record on a worker; at most
    /// `concurrency_limit` invocations run at a time, and the loop blocks
    /// on slot acquisition before pulling further records so an overloaded
    /// pool throttles ingestion instead of buffering. A record whose
    /// processing fails is never committed; it will be redelivered after a
    /// restart or rebalance.
    ///
    /// On cancellation the processor stops dispatching, waits up to
    /// `drain_timeout` for in-flight workers, then flushes all still-owned
    /// partitions.
    pub async fn run<F, Fut>(&self, process_fn: F) -> Result<()>
    where
        F: Fn(Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.transport.subscribe(&self.config.topics).await?;
        info!(
            "processor {} subscribed to {:?} in group {}",
            self.id, self.config.topics, self.config.group_id
        );

        let process_fn = Arc::new(process_fn);
        let mut fatal: Option<ClientError> = None;

        'fetch: while !self.cancel.is_cancelled() {
            if let Err(e) = self.commits.maybe_auto_flush().await {
                if e.is_fatal() {
                    fatal = Some(e);
                    break 'fetch;
                }
                warn!("auto-flush failed: {e}");
            }

            let event = tokio::select! {
                _ = self.cancel.cancelled() => break 'fetch,
                event = self.transport.poll(self.config.fetch_timeout) => event,
            };

            match event {
                Ok(FetchEvent::Records(records)) => {
                    for record in records {
                        if !self.dispatch(record, &process_fn).await? {
                            break 'fetch;
                        }
                    }
                }
                Ok(FetchEvent::Rebalance(event)) => self.handle_rebalance(event).await,
                Ok(FetchEvent::Empty) => {}
                Err(e) if e.is_fatal() => {
                    error!("fatal transport error: {e}");
                    fatal = Some(e);
                    break 'fetch;
                }
                Err(e) => {
                    warn!("fetch failed: {e}");
                }
            }
        }

        let drain_result = self.drain_and_flush().await;
        match fatal {
            Some(e) => Err(e),
            None => drain_result,
        }
    }

    /// Dispatch one record to a worker; returns false when cancelled
    async fn dispatch<F, Fut>(&self, record: Record, process_fn: &Arc<F>) -> Result<bool>
    where
        F: Fn(Record) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let tp = record.topic_partition();
        if !self.tracker.owns(&tp) {
            self.metrics.records_dropped.fetch_add(1, Ordering::Relaxed);
            debug!("dropping record {}@{} from unowned partition", tp, record.offset);
            return Ok(true);
        }

        // captured now, not at completion: a rebalance that lands while the
        // worker runs must read as staleness, not get committed
        let epoch = self.tracker.current_epoch();

        // back-pressure: no further fetch dispatch until a slot frees up
        let permit = tokio::select! {
            _ = self.cancel.cancelled() => return Ok(false),
            permit = self.slots.clone().acquire_owned() => permit
                .map_err(|_| ClientError::Internal("worker slot pool closed".to_string()))?,
        };

        // ownership may have moved while we waited for a slot; a record
        // from a re-acquired partition is redelivered from the committed
        // offset, so drop this copy instead of polluting the commit floor
        if self
            .tracker
            .partition_epoch(&tp)
            .map_or(true, |acquired_at| epoch < acquired_at)
        {
            self.metrics.records_dropped.fetch_add(1, Ordering::Relaxed);
            debug!(
                "dropping record {}@{} fetched under a released assignment",
                tp, record.offset
            );
            return Ok(true);
        }

        let offset = record.offset;
        self.commits.record_dispatched(&tp, offset);
        self.metrics.records_dispatched.fetch_add(1, Ordering::Relaxed);

        let commits = self.commits.clone();
        let metrics = self.metrics.clone();
        let process_fn = process_fn.clone();
        tokio::spawn(async move {
            let _permit = permit;
            match process_fn(record).await {
                Ok(()) => {
                    commits.record_completed(&tp, offset, epoch);
                    metrics.records_processed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    metrics.records_failed.fetch_add(1, Ordering::Relaxed);
                    warn!("processing {}@{} failed: {e}", tp, offset);
                }
            }
        });

        Ok(true)
    }

    /// Handle a group membership change on the fetch loop
    async fn handle_rebalance(&self, event: RebalanceEvent) {
        match event {
            RebalanceEvent::Assigned(partitions) => {
                self.tracker.on_assigned(&partitions);
            }
            RebalanceEvent::Revoked(partitions) => {
                if let Err(e) = self.tracker.on_revoked(&partitions, &self.commits).await {
                    error!("revocation commit failed, partitions released anyway: {e}");
                }
            }
            RebalanceEvent::Lost(partitions) => {
                self.tracker.on_lost(&partitions, &self.commits);
            }
        }
    }

    /// Wait for in-flight workers (bounded by the drain timeout), then
    /// flush all still-owned partitions
    async fn drain_and_flush(&self) -> Result<()> {
        let limit = self.config.processor.concurrency_limit as u32;
        let drained = tokio::time::timeout(
            self.config.processor.drain_timeout,
            self.slots.acquire_many(limit),
        )
        .await;
        match drained {
            Ok(Ok(_all_slots)) => debug!("all workers drained"),
            Ok(Err(_)) => {}
            Err(_) => warn!(
                "drain timeout of {:?} elapsed with workers still in flight",
                self.config.processor.drain_timeout
            ),
        }

        info!("processor {} flushing final offsets", self.id);
        self.commits.flush(None).await
    }

    /// Request shutdown; `run` drains and flushes before returning
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Get processor ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get configuration
    pub fn config(&self) -> &ConsumerConfig {
        &self.config
    }

    /// Ownership tracker handle
    pub fn tracker(&self) -> Arc<OwnershipTracker> {
        self.tracker.clone()
    }

    /// Commit manager handle
    pub fn commits(&self) -> Arc<CommitManager> {
        self.commits.clone()
    }

    /// Processor counters
    pub fn metrics(&self) -> Arc<ProcessorMetrics> {
        self.metrics.clone()
    }
}
