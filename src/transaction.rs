use crate::{
    config::TransactionConfig,
    error::{ClientError, Result},
    record::Record,
    transport::{CommitMap, TransportClient},
    types::{ConsumerGroupMetadata, RecordAck},
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Consumed-offset acknowledgements registered inside a transaction
///
/// Used for the read-process-write pattern: the input offsets become
/// committed for `group` if and only if the transaction commits.
#[derive(Debug, Clone)]
pub struct ConsumedOffsets {
    pub group: ConsumerGroupMetadata,
    pub offsets: CommitMap,
}

impl ConsumedOffsets {
    pub fn new(group: ConsumerGroupMetadata, offsets: CommitMap) -> Self {
        Self { group, offsets }
    }
}

/// Transaction counters
#[derive(Debug, Default)]
pub struct TransactionMetrics {
    pub transactions_committed: AtomicU64,
    pub transactions_aborted: AtomicU64,
    pub records_published: AtomicU64,
}

/// Publishes batches of records atomically under a single transactional
/// identity
///
/// Owns its transport channel exclusively: mixing transactional and
/// non-transactional traffic on one channel is undefined, so the consumer
/// fetch/commit path must use a separate [`TransportClient`]. Concurrent
/// `publish_atomic` calls are serialized internally; two open transactions
/// on one identity are a protocol violation the broker rejects.
pub struct TransactionalProducer {
    transactional_id: String,
    config: Arc<TransactionConfig>,
    transport: Arc<dyn TransportClient>,
    txn_guard: Mutex<()>,
    metrics: Arc<TransactionMetrics>,
}

/// Builder for creating transactional producers
pub struct TransactionalProducerBuilder {
    config: Option<TransactionConfig>,
    transport: Option<Arc<dyn TransportClient>>,
}

impl TransactionalProducerBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self {
            config: None,
            transport: None,
        }
    }

    /// Set transaction configuration
    pub fn config(mut self, config: TransactionConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the producer-owned transport channel
    pub fn transport(mut self, transport: Arc<dyn TransportClient>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Build the producer
    pub fn build(self) -> Result<TransactionalProducer> {
        let config = self.config.ok_or_else(|| {
            ClientError::InvalidConfig("transaction config is required".to_string())
        })?;
        config.validate()?;
        let transport = self
            .transport
            .ok_or_else(|| ClientError::InvalidConfig("transport is required".to_string()))?;

        info!(
            "created transactional producer {}",
            config.transactional_id
        );

        Ok(TransactionalProducer {
            transactional_id: config.transactional_id.clone(),
            config: Arc::new(config),
            transport,
            txn_guard: Mutex::new(()),
            metrics: Arc::new(TransactionMetrics::default()),
        })
    }
}

impl Default for TransactionalProducerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl TransactionalProducer {
    /// Publish a batch of records, and optionally the consumed offsets
    /// they were derived from, as one atomic unit
    ///
    /// A committed-read downstream consumer observes either the complete
    /// batch or none of it. Any failure while producing or registering
    /// offsets aborts the transaction and surfaces as
    /// [`ClientError::TransactionAborted`] carrying the cause.
    pub async fn publish_atomic(
        &self,
        records: Vec<Record>,
        consumed: Option<&ConsumedOffsets>,
    ) -> Result<Vec<RecordAck>> {
        // single-writer span across begin..commit/abort
        let _txn = self.txn_guard.lock().await;

        self.transport.begin_transaction().await?;
        debug!(
            "transaction opened on {} for {} record(s)",
            self.transactional_id,
            records.len()
        );

        let batch_len = records.len();
        match self.produce_all(records, consumed).await {
            Ok(acks) => match self.transport.commit_transaction().await {
                Ok(()) => {
                    self.metrics
                        .transactions_committed
                        .fetch_add(1, Ordering::Relaxed);
                    self.metrics
                        .records_published
                        .fetch_add(acks.len() as u64, Ordering::Relaxed);
                    info!(
                        "transaction on {} committed with {} record(s)",
                        self.transactional_id, batch_len
                    );
                    Ok(acks)
                }
                Err(e) => self.abort("transaction commit failed", e).await,
            },
            Err(e) => self.abort("produce inside transaction failed", e).await,
        }
    }

    /// Produce every record, then register consumed offsets if present
    async fn produce_all(
        &self,
        records: Vec<Record>,
        consumed: Option<&ConsumedOffsets>,
    ) -> Result<Vec<RecordAck>> {
        let mut acks = Vec::with_capacity(records.len());
        for record in records {
            acks.push(self.transport.produce(record).await?);
        }
        if let Some(consumed) = consumed {
            self.transport
                .send_offsets_to_transaction(&consumed.offsets, &consumed.group)
                .await?;
        }
        Ok(acks)
    }

    /// Abort the open transaction and surface the cause
    async fn abort<T>(&self, context: &str, cause: ClientError) -> Result<T> {
        if let Err(abort_err) = self.transport.abort_transaction().await {
            error!(
                "abort on {} failed after {context}: {abort_err}",
                self.transactional_id
            );
        }
        self.metrics
            .transactions_aborted
            .fetch_add(1, Ordering::Relaxed);
        warn!("{context} on {}: {cause}; transaction aborted", self.transactional_id);
        Err(ClientError::TransactionAborted {
            reason: cause.to_string(),
        })
    }

    /// Get the transactional identity
    pub fn transactional_id(&self) -> &str {
        &self.transactional_id
    }

    /// Get configuration
    pub fn config(&self) -> &TransactionConfig {
        &self.config
    }

    /// Transaction counters
    pub fn metrics(&self) -> Arc<TransactionMetrics> {
        self.metrics.clone()
    }
}
