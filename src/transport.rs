use crate::{
    error::Result,
    record::Record,
    types::{ConsumerGroupMetadata, RecordAck, TopicPartition},
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

/// Offsets to commit, keyed by partition identity
///
/// Values are exclusive upper bounds: the next offset to read.
pub type CommitMap = BTreeMap<TopicPartition, u64>;

/// Group membership change surfaced by the transport during a rebalance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebalanceEvent {
    /// Partitions handed to this member
    Assigned(Vec<TopicPartition>),

    /// Partitions being taken away; the engine must finish commits for
    /// them before the next poll completes the rebalance round
    Revoked(Vec<TopicPartition>),

    /// Partitions already gone (e.g. session timeout); committing for
    /// them would fail or be meaningless
    Lost(Vec<TopicPartition>),
}

/// One poll outcome from the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchEvent {
    /// Records fetched from owned partitions, in log order per partition
    Records(Vec<Record>),

    /// Group membership change; no records for a revoked partition are
    /// returned between this event and a matching reassignment
    Rebalance(RebalanceEvent),

    /// Nothing arrived within the fetch timeout
    Empty,
}

/// Abstract broker contract
///
/// Concrete implementations own the wire encoding, connection management,
/// retries/backoff and authentication. The engine only assumes the
/// semantics below:
///
/// - `poll` interleaves rebalance events with record batches and never
///   returns records for a partition after its `Revoked`/`Lost` event
///   until it is assigned again;
/// - `commit_offsets` is atomic per call from the group's point of view;
/// - the transactional calls (`begin_transaction` ..
///   `abort_transaction`) belong to a producer-owned channel that is
///   never shared with the fetch/commit path.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Join the consumer group and subscribe to the given topics
    async fn subscribe(&self, topics: &[String]) -> Result<()>;

    /// Wait up to `timeout` for records or a rebalance event
    async fn poll(&self, timeout: Duration) -> Result<FetchEvent>;

    /// Durably commit the given offsets for this consumer group
    async fn commit_offsets(&self, offsets: &CommitMap) -> Result<()>;

    /// Open a transaction on this channel's transactional identity
    async fn begin_transaction(&self) -> Result<()>;

    /// Produce a single record; inside a transaction the record stays
    /// invisible to committed-read consumers until the transaction commits
    async fn produce(&self, record: Record) -> Result<RecordAck>;

    /// Register consumed offsets as part of the open transaction
    async fn send_offsets_to_transaction(
        &self,
        offsets: &CommitMap,
        group: &ConsumerGroupMetadata,
    ) -> Result<()>;

    /// Commit the open transaction, making all its effects visible
    async fn commit_transaction(&self) -> Result<()>;

    /// Abort the open transaction, discarding all its effects
    async fn abort_transaction(&self) -> Result<()>;
}
