use thiserror::Error;

/// Result type alias for FlowMQ client operations
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors that can occur in the FlowMQ client
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    /// Connection-related errors
    #[error("Connection error: {0}")]
    Connection(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Record serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Broker error
    #[error("Broker error: {0}")]
    Broker(String),

    /// Network timeout
    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Topic not found
    #[error("Topic not found: {topic}")]
    TopicNotFound { topic: String },

    /// Partition not found
    #[error("Partition not found: topic={topic}, partition={partition}")]
    PartitionNotFound { topic: String, partition: u32 },

    /// Producer errors
    #[error("Producer error: {0}")]
    Producer(String),

    /// Consumer errors
    #[error("Consumer error: {0}")]
    Consumer(String),

    /// Consumer group errors
    #[error("Consumer group error: {0}")]
    ConsumerGroup(String),

    /// Rebalancing in progress
    #[error("Consumer group rebalancing in progress")]
    RebalancingInProgress,

    /// Invalid record
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// Offset commit failure
    #[error("Offset commit failed: {0}")]
    Commit(String),

    /// Record processing failure reported by the application callback
    #[error("Processing failed: {0}")]
    Processing(String),

    /// Transaction rolled back; no records from the batch are visible
    #[error("Transaction aborted: {reason}")]
    TransactionAborted { reason: String },

    /// Invalid operation
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Unrecoverable protocol violation
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Internal client error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Connection(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Serialization(err.to_string())
    }
}

impl From<tokio::time::error::Elapsed> for ClientError {
    fn from(_err: tokio::time::error::Elapsed) -> Self {
        ClientError::Timeout { timeout_ms: 0 }
    }
}

/// Error categories for metrics and monitoring
impl ClientError {
    /// Get the error category for metrics
    pub fn category(&self) -> &'static str {
        match self {
            ClientError::Connection(_) => "connection",
            ClientError::Authentication(_) => "authentication",
            ClientError::InvalidConfig(_) => "configuration",
            ClientError::Serialization(_) => "serialization",
            ClientError::Broker(_) => "broker",
            ClientError::Timeout { .. } => "timeout",
            ClientError::TopicNotFound { .. } | ClientError::PartitionNotFound { .. } => {
                "not_found"
            }
            ClientError::Producer(_) => "producer",
            ClientError::Consumer(_) | ClientError::ConsumerGroup(_) => "consumer",
            ClientError::RebalancingInProgress => "rebalancing",
            ClientError::InvalidRecord(_) => "record_format",
            ClientError::Commit(_) => "commit",
            ClientError::Processing(_) => "processing",
            ClientError::TransactionAborted { .. } => "transaction",
            ClientError::InvalidOperation(_) => "invalid_operation",
            ClientError::Protocol(_) => "protocol",
            ClientError::Internal(_) => "internal",
        }
    }

    /// Check if the error is retryable
    ///
    /// The transport layer already retried per its own backoff policy; a
    /// retryable error surfacing here is a reported failure, not a reason
    /// to stop consuming unaffected partitions.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Connection(_)
                | ClientError::Timeout { .. }
                | ClientError::Broker(_)
                | ClientError::Commit(_)
                | ClientError::RebalancingInProgress
        )
    }

    /// Check if the error terminates the consuming process
    ///
    /// Fatal errors are not reconnected past; `Processor::run` propagates
    /// them after draining in-flight work.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ClientError::Authentication(_) | ClientError::Protocol(_)
        )
    }
}
