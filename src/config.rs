use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Client configuration consumed by concrete transport implementations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Broker bootstrap endpoints
    pub brokers: Vec<String>,

    /// Client ID for identification
    pub client_id: Option<String>,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// Request timeout
    pub request_timeout: Duration,

    /// Retry configuration applied by the transport
    pub retry_config: RetryConfig,
}

/// Retry configuration
///
/// Applied inside the transport; the engine treats a call that still fails
/// after these retries as a reported failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retry attempts
    pub max_retries: usize,

    /// Base retry delay
    pub base_delay: Duration,

    /// Maximum retry delay
    pub max_delay: Duration,

    /// Retry multiplier for exponential backoff
    pub multiplier: f64,

    /// Jitter for retry timing
    pub jitter: bool,
}

/// Starting position when a partition has no committed offset
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum StartPosition {
    /// Start from the earliest available record
    Earliest,

    /// Start from the latest record
    Latest,
}

/// Offset-commit advancement policy
///
/// Workers complete records out of order within a partition; the policy
/// decides how far the per-partition high-water mark may advance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CommitPolicy {
    /// Advance only over contiguously completed offsets. A failed record
    /// holds the mark back so it is redelivered after a restart or
    /// rebalance.
    Strict,

    /// Commit the highest completed offset regardless of gaps. Higher
    /// throughput, but a failed record below an already-completed higher
    /// offset will not be redelivered.
    MaxCompleted,
}

/// Offset-commit batching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitConfig {
    /// Advancement policy
    pub policy: CommitPolicy,

    /// Flush once this many completions are pending
    pub batch_size: usize,

    /// Flush once this much time has passed since the last flush
    pub flush_interval: Duration,

    /// Upper bound on a single commit RPC; a flush that exceeds it fails
    /// instead of hanging a rebalance
    pub flush_timeout: Duration,
}

/// Worker-pool configuration for the processor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorConfig {
    /// Maximum number of records processed concurrently
    pub concurrency_limit: usize,

    /// How long shutdown waits for in-flight workers before giving up
    pub drain_timeout: Duration,
}

/// Consumer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Consumer ID; generated when not set
    pub consumer_id: Option<String>,

    /// Consumer group
    pub group_id: String,

    /// Topic subscription list
    pub topics: Vec<String>,

    /// Starting position when no offset is committed
    pub start_position: StartPosition,

    /// Fetch timeout per poll
    pub fetch_timeout: Duration,

    /// Offset-commit batching
    pub commit: CommitConfig,

    /// Worker pool limits
    pub processor: ProcessorConfig,
}

/// Acknowledgment levels for produced records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AckLevel {
    /// No acknowledgment required
    None,

    /// Acknowledgment from leader only
    Leader,

    /// Acknowledgment from all replicas
    All,
}

/// Transactional producer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionConfig {
    /// Transactional identity; exactly one open transaction is allowed
    /// per identity at a time
    pub transactional_id: String,

    /// Broker-side transaction timeout
    pub transaction_timeout: Duration,

    /// Acknowledgment level; transactions require `All`
    pub ack_level: AckLevel,

    /// Idempotent production; required for transactions
    pub idempotent: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            client_id: None,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            retry_config: RetryConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl Default for CommitConfig {
    fn default() -> Self {
        Self {
            policy: CommitPolicy::Strict,
            batch_size: 100,
            flush_interval: Duration::from_secs(5),
            flush_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 8,
            drain_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            consumer_id: None,
            group_id: "default-group".to_string(),
            topics: Vec::new(),
            start_position: StartPosition::Latest,
            fetch_timeout: Duration::from_secs(1),
            commit: CommitConfig::default(),
            processor: ProcessorConfig::default(),
        }
    }
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            transactional_id: String::new(),
            transaction_timeout: Duration::from_secs(60),
            ack_level: AckLevel::All,
            idempotent: true,
        }
    }
}

impl ClientConfig {
    /// Validate the client configuration
    pub fn validate(&self) -> Result<()> {
        if self.brokers.is_empty() {
            return Err(ClientError::InvalidConfig(
                "at least one bootstrap broker is required".to_string(),
            ));
        }
        Ok(())
    }
}

impl ConsumerConfig {
    /// Validate the consumer configuration
    pub fn validate(&self) -> Result<()> {
        if self.group_id.is_empty() {
            return Err(ClientError::InvalidConfig(
                "consumer group id is required".to_string(),
            ));
        }
        if self.topics.is_empty() {
            return Err(ClientError::InvalidConfig(
                "topic subscription list is empty".to_string(),
            ));
        }
        if self.commit.batch_size == 0 {
            return Err(ClientError::InvalidConfig(
                "commit batch size must be at least 1".to_string(),
            ));
        }
        if self.processor.concurrency_limit == 0 {
            return Err(ClientError::InvalidConfig(
                "concurrency limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl TransactionConfig {
    /// Create a configuration for the given transactional identity
    pub fn new(transactional_id: impl Into<String>) -> Self {
        Self {
            transactional_id: transactional_id.into(),
            ..Default::default()
        }
    }

    /// Validate the transaction configuration
    pub fn validate(&self) -> Result<()> {
        if self.transactional_id.is_empty() {
            return Err(ClientError::InvalidConfig(
                "transactional id is required".to_string(),
            ));
        }
        if self.transaction_timeout.is_zero() {
            return Err(ClientError::InvalidConfig(
                "transaction timeout must be non-zero".to_string(),
            ));
        }
        if self.ack_level != AckLevel::All {
            return Err(ClientError::InvalidConfig(
                "transactions require ack level All".to_string(),
            ));
        }
        if !self.idempotent {
            return Err(ClientError::InvalidConfig(
                "transactions require idempotent production".to_string(),
            ));
        }
        Ok(())
    }
}
