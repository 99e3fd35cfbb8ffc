mod common;

use common::{tp, MockTransport};
use flowmq_client::{
    ClientError, CommitMap, ConsumedOffsets, ConsumerGroupMetadata, Record, TransactionConfig,
    TransactionalProducer, TransactionalProducerBuilder,
};
use std::sync::Arc;

const TOPIC: &str = "orders-enriched";

fn build_producer(transport: &Arc<MockTransport>) -> Arc<TransactionalProducer> {
    common::init_tracing();
    Arc::new(
        TransactionalProducerBuilder::new()
            .config(TransactionConfig::new("orders-relay-1"))
            .transport(transport.clone() as Arc<dyn flowmq_client::TransportClient>)
            .build()
            .expect("producer"),
    )
}

fn outgoing_records(count: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            Record::builder()
                .topic(TOPIC)
                .partition(0)
                .key(format!("order-{i}"))
                .value(format!("enriched-{i}"))
                .build()
                .expect("record")
        })
        .collect()
}

fn consumed_offsets() -> ConsumedOffsets {
    let mut offsets = CommitMap::new();
    offsets.insert(tp("orders", 2), 41);
    ConsumedOffsets::new(
        ConsumerGroupMetadata::new("orders-workers", "consumer-1", 7),
        offsets,
    )
}

#[tokio::test]
async fn committed_batch_is_fully_visible_with_its_offsets() {
    let transport = Arc::new(MockTransport::new());
    let producer = build_producer(&transport);

    let acks = producer
        .publish_atomic(outgoing_records(3), Some(&consumed_offsets()))
        .await
        .unwrap();

    assert_eq!(acks.len(), 3);
    let offsets: Vec<u64> = acks.iter().map(|ack| ack.offset).collect();
    assert_eq!(offsets, vec![0, 1, 2]);

    let visible = transport.visible_records();
    assert_eq!(visible.len(), 3);
    assert!(visible.iter().all(|record| record.topic == TOPIC));

    let group_commits = transport.group_commits();
    assert_eq!(group_commits.len(), 1);
    assert_eq!(group_commits[0].0.group_id, "orders-workers");
    assert_eq!(group_commits[0].1.get(&tp("orders", 2)), Some(&41));
    assert_eq!(transport.abort_count(), 0);
}

#[tokio::test]
async fn produce_failure_mid_batch_leaves_nothing_visible() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_produce_from(2);
    let producer = build_producer(&transport);

    let result = producer.publish_atomic(outgoing_records(5), None).await;

    assert!(matches!(result, Err(ClientError::TransactionAborted { .. })));
    assert!(transport.visible_records().is_empty());
    assert_eq!(transport.abort_count(), 1);

    let metrics = producer.metrics();
    assert_eq!(
        metrics
            .transactions_aborted
            .load(std::sync::atomic::Ordering::Relaxed),
        1
    );
}

#[tokio::test]
async fn offset_registration_failure_aborts_the_whole_batch() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_send_offsets(true);
    let producer = build_producer(&transport);

    let result = producer
        .publish_atomic(outgoing_records(2), Some(&consumed_offsets()))
        .await;

    assert!(matches!(result, Err(ClientError::TransactionAborted { .. })));
    assert!(transport.visible_records().is_empty());
    assert!(transport.group_commits().is_empty());
    assert_eq!(transport.abort_count(), 1);
}

#[tokio::test]
async fn commit_failure_surfaces_as_aborted() {
    let transport = Arc::new(MockTransport::new());
    transport.fail_commit_txn(true);
    let producer = build_producer(&transport);

    let result = producer.publish_atomic(outgoing_records(2), None).await;

    assert!(matches!(result, Err(ClientError::TransactionAborted { .. })));
    assert!(transport.visible_records().is_empty());
    assert_eq!(transport.abort_count(), 1);
}

#[tokio::test]
async fn concurrent_publishes_never_overlap_transactions() {
    let transport = Arc::new(MockTransport::new());
    let producer = build_producer(&transport);

    let mut handles = Vec::new();
    for _ in 0..4 {
        let producer = producer.clone();
        handles.push(tokio::spawn(async move {
            producer.publish_atomic(outgoing_records(2), None).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert!(!transport.saw_overlapping_begin());
    assert_eq!(transport.visible_records().len(), 8);

    let metrics = producer.metrics();
    assert_eq!(
        metrics
            .transactions_committed
            .load(std::sync::atomic::Ordering::Relaxed),
        4
    );
    assert_eq!(
        metrics
            .records_published
            .load(std::sync::atomic::Ordering::Relaxed),
        8
    );
}

#[tokio::test]
async fn empty_batch_commits_cleanly() {
    let transport = Arc::new(MockTransport::new());
    let producer = build_producer(&transport);

    let acks = producer.publish_atomic(Vec::new(), None).await.unwrap();

    assert!(acks.is_empty());
    assert!(transport.visible_records().is_empty());
    assert_eq!(transport.abort_count(), 0);
}
