//! FlowMQ Client Engine
//!
//! Client-side runtime between an application and a FlowMQ broker:
//! consumer-group ownership tracking, rebalance-safe offset commits,
//! bounded-concurrency record processing, and atomic transactional
//! publishing. The wire protocol lives behind the [`TransportClient`]
//! trait; this crate supplies the correctness layer above it.
//!
//! Ordering is guaranteed within a partition only, and offsets committed
//! to the broker are exclusive upper bounds (the next offset to read).

pub mod assignment;
pub mod commit;
pub mod config;
pub mod error;
pub mod processor;
pub mod record;
pub mod transaction;
pub mod transport;
pub mod types;

pub use assignment::OwnershipTracker;
pub use commit::{CommitManager, CommitMetrics};
pub use config::{
    AckLevel, ClientConfig, CommitConfig, CommitPolicy, ConsumerConfig, ProcessorConfig,
    RetryConfig, StartPosition, TransactionConfig,
};
pub use error::{ClientError, Result};
pub use processor::{Processor, ProcessorBuilder, ProcessorMetrics};
pub use record::{Header, Record, RecordBuilder};
pub use transaction::{
    ConsumedOffsets, TransactionMetrics, TransactionalProducer, TransactionalProducerBuilder,
};
pub use transport::{CommitMap, FetchEvent, RebalanceEvent, TransportClient};
pub use types::{ConsumerGroupMetadata, RecordAck, TopicPartition};
