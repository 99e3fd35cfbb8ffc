use serde::{Deserialize, Serialize};
use std::fmt;

/// Topic and partition identifier
///
/// The unit of ownership, ordering and offset tracking; used as a map key
/// everywhere in the engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: u32,
}

impl TopicPartition {
    /// Create a new TopicPartition
    pub fn new(topic: impl Into<String>, partition: u32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.topic, self.partition)
    }
}

/// Consumer group identity forwarded to the broker when consumed offsets
/// are registered inside a transaction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsumerGroupMetadata {
    pub group_id: String,
    pub member_id: String,
    pub generation_id: i32,
}

impl ConsumerGroupMetadata {
    pub fn new(group_id: impl Into<String>, member_id: impl Into<String>, generation_id: i32) -> Self {
        Self {
            group_id: group_id.into(),
            member_id: member_id.into(),
            generation_id,
        }
    }
}

/// Broker acknowledgment for a produced record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecordAck {
    pub topic: String,
    pub partition: u32,
    pub offset: u64,
    pub timestamp: u64,
}

impl RecordAck {
    /// Partition identity the record landed on
    pub fn topic_partition(&self) -> TopicPartition {
        TopicPartition::new(self.topic.clone(), self.partition)
    }
}
