use crate::{
    error::{ClientError, Result},
    types::TopicPartition,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// An ordered key/value header pair attached to a record
///
/// Headers are a list, not a map: duplicates are allowed and insertion
/// order is preserved on the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Header {
    pub key: String,
    pub value: Bytes,
}

impl Header {
    pub fn new(key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A record in a partition's log
///
/// Immutable once delivered by the transport; outgoing records are built
/// with [`RecordBuilder`] and get their offset assigned by the broker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Record {
    /// Topic the record belongs to
    pub topic: String,

    /// Partition index within the topic
    pub partition: u32,

    /// Record offset within the partition
    pub offset: u64,

    /// Record key for partition routing
    pub key: Option<Bytes>,

    /// Record payload
    pub value: Bytes,

    /// Ordered record headers
    pub headers: Vec<Header>,

    /// Ingestion timestamp (unix millis)
    pub timestamp: u64,
}

/// Builder for outgoing records
#[derive(Debug, Default)]
pub struct RecordBuilder {
    topic: Option<String>,
    partition: Option<u32>,
    key: Option<Bytes>,
    value: Option<Bytes>,
    headers: Vec<Header>,
}

impl RecordBuilder {
    /// Create a new record builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set topic
    pub fn topic<T: Into<String>>(mut self, topic: T) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Set an explicit partition (bypasses key-based routing)
    pub fn partition(mut self, partition: u32) -> Self {
        self.partition = Some(partition);
        self
    }

    /// Set record key
    pub fn key<T: Into<Bytes>>(mut self, key: T) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Set record payload
    pub fn value<T: Into<Bytes>>(mut self, value: T) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Append a header
    pub fn header<K: Into<String>, V: Into<Bytes>>(mut self, key: K, value: V) -> Self {
        self.headers.push(Header::new(key, value));
        self
    }

    /// Append multiple headers, preserving order
    pub fn headers<I>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = Header>,
    {
        self.headers.extend(headers);
        self
    }

    /// Build the record
    pub fn build(self) -> Result<Record> {
        let topic = self
            .topic
            .ok_or_else(|| ClientError::InvalidRecord("record topic is required".to_string()))?;
        let value = self
            .value
            .ok_or_else(|| ClientError::InvalidRecord("record value is required".to_string()))?;

        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| ClientError::Internal(e.to_string()))?
            .as_millis() as u64;

        Ok(Record {
            topic,
            partition: self.partition.unwrap_or(0),
            offset: 0, // assigned by the broker
            key: self.key,
            value,
            headers: self.headers,
            timestamp,
        })
    }
}

impl Record {
    /// Create a new record builder
    pub fn builder() -> RecordBuilder {
        RecordBuilder::new()
    }

    /// Partition identity of the record
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }

    /// Get record as JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(Into::into)
    }

    /// Create record from JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(Into::into)
    }

    /// Get record payload as string (UTF-8)
    pub fn value_as_string(&self) -> Result<String> {
        String::from_utf8(self.value.to_vec())
            .map_err(|e| ClientError::InvalidRecord(e.to_string()))
    }

    /// Get record key as string (UTF-8)
    pub fn key_as_string(&self) -> Option<Result<String>> {
        self.key.as_ref().map(|k| {
            String::from_utf8(k.to_vec()).map_err(|e| ClientError::InvalidRecord(e.to_string()))
        })
    }

    /// First header value for a key, if present
    pub fn header(&self, key: &str) -> Option<&Bytes> {
        self.headers.iter().find(|h| h.key == key).map(|h| &h.value)
    }

    /// Record age in milliseconds
    pub fn age_ms(&self) -> u64 {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(self.timestamp);
        now.saturating_sub(self.timestamp)
    }

    /// Payload size plus key and header sizes
    pub fn total_size(&self) -> usize {
        let headers_size: usize = self
            .headers
            .iter()
            .map(|h| h.key.len() + h.value.len())
            .sum();
        self.value.len() + self.key.as_ref().map_or(0, |k| k.len()) + headers_size
    }
}
