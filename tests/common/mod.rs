#![allow(dead_code)]

use async_trait::async_trait;
use flowmq_client::{
    ClientError, CommitMap, ConsumerGroupMetadata, FetchEvent, RebalanceEvent, Record, RecordAck,
    Result, TopicPartition, TransportClient,
};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

/// Scripted in-memory transport
///
/// The consumer side replays a queue of poll outcomes; the producer side
/// implements the transactional envelope with a committed-read view, so
/// tests can observe exactly what a committed-only downstream reader
/// would see.
#[derive(Default)]
pub struct MockTransport {
    // consumer side
    subscribed: Mutex<Vec<String>>,
    events: Mutex<VecDeque<Result<FetchEvent>>>,
    commit_log: Mutex<Vec<CommitMap>>,
    fail_commits: AtomicBool,

    // transactional side
    txn_open: AtomicBool,
    txn_records: Mutex<Vec<Record>>,
    txn_offsets: Mutex<Option<(ConsumerGroupMetadata, CommitMap)>>,
    visible_records: Mutex<Vec<Record>>,
    group_commits: Mutex<Vec<(ConsumerGroupMetadata, CommitMap)>>,
    next_offsets: Mutex<HashMap<TopicPartition, u64>>,
    produce_calls: AtomicUsize,
    fail_produce_from: AtomicUsize,
    fail_send_offsets: AtomicBool,
    fail_commit_txn: AtomicBool,
    aborts: AtomicUsize,
    overlapping_begin: AtomicBool,
}

impl MockTransport {
    pub fn new() -> Self {
        let transport = Self::default();
        transport.fail_produce_from.store(usize::MAX, Ordering::Relaxed);
        transport
    }

    // -- scripting -------------------------------------------------------

    pub fn push_event(&self, event: FetchEvent) {
        self.events.lock().push_back(Ok(event));
    }

    pub fn push_records(&self, records: Vec<Record>) {
        self.push_event(FetchEvent::Records(records));
    }

    pub fn push_assigned(&self, partitions: Vec<TopicPartition>) {
        self.push_event(FetchEvent::Rebalance(RebalanceEvent::Assigned(partitions)));
    }

    pub fn push_revoked(&self, partitions: Vec<TopicPartition>) {
        self.push_event(FetchEvent::Rebalance(RebalanceEvent::Revoked(partitions)));
    }

    pub fn push_lost(&self, partitions: Vec<TopicPartition>) {
        self.push_event(FetchEvent::Rebalance(RebalanceEvent::Lost(partitions)));
    }

    pub fn push_poll_error(&self, error: ClientError) {
        self.events.lock().push_back(Err(error));
    }

    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::Relaxed);
    }

    /// Fail every produce call starting from the zero-based `n`-th
    pub fn fail_produce_from(&self, n: usize) {
        self.fail_produce_from.store(n, Ordering::Relaxed);
    }

    pub fn fail_send_offsets(&self, fail: bool) {
        self.fail_send_offsets.store(fail, Ordering::Relaxed);
    }

    pub fn fail_commit_txn(&self, fail: bool) {
        self.fail_commit_txn.store(fail, Ordering::Relaxed);
    }

    // -- observation -----------------------------------------------------

    pub fn subscribed_topics(&self) -> Vec<String> {
        self.subscribed.lock().clone()
    }

    pub fn commit_log(&self) -> Vec<CommitMap> {
        self.commit_log.lock().clone()
    }

    pub fn commit_call_count(&self) -> usize {
        self.commit_log.lock().len()
    }

    /// Merged view of all committed consumer offsets
    pub fn committed_offsets(&self) -> CommitMap {
        let mut merged = CommitMap::new();
        for call in self.commit_log.lock().iter() {
            for (tp, offset) in call {
                merged.insert(tp.clone(), *offset);
            }
        }
        merged
    }

    /// What a committed-read consumer observes
    pub fn visible_records(&self) -> Vec<Record> {
        self.visible_records.lock().clone()
    }

    /// Consumed offsets committed through transactions, per source group
    pub fn group_commits(&self) -> Vec<(ConsumerGroupMetadata, CommitMap)> {
        self.group_commits.lock().clone()
    }

    pub fn abort_count(&self) -> usize {
        self.aborts.load(Ordering::Relaxed)
    }

    /// True if begin_transaction was ever called with a transaction open
    pub fn saw_overlapping_begin(&self) -> bool {
        self.overlapping_begin.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TransportClient for MockTransport {
    async fn subscribe(&self, topics: &[String]) -> Result<()> {
        self.subscribed.lock().extend(topics.iter().cloned());
        Ok(())
    }

    async fn poll(&self, timeout: Duration) -> Result<FetchEvent> {
        if let Some(scripted) = self.events.lock().pop_front() {
            return scripted;
        }
        tokio::time::sleep(timeout.min(Duration::from_millis(5))).await;
        Ok(FetchEvent::Empty)
    }

    async fn commit_offsets(&self, offsets: &CommitMap) -> Result<()> {
        if self.fail_commits.load(Ordering::Relaxed) {
            return Err(ClientError::Commit("commit rejected".to_string()));
        }
        self.commit_log.lock().push(offsets.clone());
        Ok(())
    }

    async fn begin_transaction(&self) -> Result<()> {
        if self.txn_open.swap(true, Ordering::SeqCst) {
            self.overlapping_begin.store(true, Ordering::SeqCst);
            return Err(ClientError::Protocol(
                "concurrent transactions on one transactional id".to_string(),
            ));
        }
        Ok(())
    }

    async fn produce(&self, record: Record) -> Result<RecordAck> {
        if !self.txn_open.load(Ordering::SeqCst) {
            return Err(ClientError::InvalidOperation(
                "produce outside of a transaction".to_string(),
            ));
        }
        let call = self.produce_calls.fetch_add(1, Ordering::SeqCst);
        if call >= self.fail_produce_from.load(Ordering::Relaxed) {
            return Err(ClientError::Broker("injected produce failure".to_string()));
        }

        let tp = record.topic_partition();
        let mut next_offsets = self.next_offsets.lock();
        let offset = next_offsets.entry(tp.clone()).or_insert(0);
        let ack = RecordAck {
            topic: record.topic.clone(),
            partition: record.partition,
            offset: *offset,
            timestamp: record.timestamp,
        };
        let mut stored = record;
        stored.offset = *offset;
        *offset += 1;
        drop(next_offsets);

        self.txn_records.lock().push(stored);
        Ok(ack)
    }

    async fn send_offsets_to_transaction(
        &self,
        offsets: &CommitMap,
        group: &ConsumerGroupMetadata,
    ) -> Result<()> {
        if !self.txn_open.load(Ordering::SeqCst) {
            return Err(ClientError::InvalidOperation(
                "offsets registered outside of a transaction".to_string(),
            ));
        }
        if self.fail_send_offsets.load(Ordering::Relaxed) {
            return Err(ClientError::Broker(
                "injected offset registration failure".to_string(),
            ));
        }
        *self.txn_offsets.lock() = Some((group.clone(), offsets.clone()));
        Ok(())
    }

    async fn commit_transaction(&self) -> Result<()> {
        if !self.txn_open.load(Ordering::SeqCst) {
            return Err(ClientError::InvalidOperation(
                "commit without an open transaction".to_string(),
            ));
        }
        if self.fail_commit_txn.load(Ordering::Relaxed) {
            return Err(ClientError::Broker(
                "injected transaction commit failure".to_string(),
            ));
        }
        self.visible_records
            .lock()
            .append(&mut self.txn_records.lock());
        if let Some(group_offsets) = self.txn_offsets.lock().take() {
            self.group_commits.lock().push(group_offsets);
        }
        self.txn_open.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn abort_transaction(&self) -> Result<()> {
        self.txn_records.lock().clear();
        *self.txn_offsets.lock() = None;
        self.aborts.fetch_add(1, Ordering::SeqCst);
        self.txn_open.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// Route engine logs to the test harness; safe to call repeatedly
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

/// A delivered record as the transport would hand it to the engine
pub fn fetched_record(topic: &str, partition: u32, offset: u64, payload: &str) -> Record {
    let mut record = Record::builder()
        .topic(topic)
        .partition(partition)
        .value(payload.as_bytes().to_vec())
        .build()
        .expect("record");
    record.offset = offset;
    record
}

pub fn tp(topic: &str, partition: u32) -> TopicPartition {
    TopicPartition::new(topic, partition)
}
