mod common;

use std::sync::Arc;

use common::{MemoryAuditStore, MemoryQueue};
use dispatch_service::{
    clients::{audit_store::AuditStore, queue::Queue},
    models::audit::AuditEvent,
    pipeline::audit::{AuditIngestor, AuditRecorder},
};
use tokio::time::Duration;

fn ingestor(queue: &Arc<MemoryQueue>, store: &Arc<MemoryAuditStore>) -> AuditIngestor {
    AuditIngestor::new(
        queue.clone() as Arc<dyn Queue>,
        store.clone() as Arc<dyn AuditStore>,
        10,
        Duration::from_secs(0),
    )
}

fn producer_event(transaction_id: &str) -> AuditEvent {
    AuditEvent::new(transaction_id, "prepare-notification", "/users/emails", "req-producer")
        .with_request_body(serde_json::json!({ "to": ["1"] }))
        .with_output(serde_json::json!({ "recipients": [] }))
}

/// Test: events are persisted and each source message deleted individually
#[tokio::test]
async fn test_ingestor_persists_then_deletes() {
    let queue = Arc::new(MemoryQueue::default());
    let store = Arc::new(MemoryAuditStore::default());

    for i in 0..3 {
        let payload = serde_json::to_string(&producer_event(&format!("txn-{}", i))).unwrap();
        queue.send(&payload).await.unwrap();
    }

    let persisted = ingestor(&queue, &store)
        .poll_once("req-ingest")
        .await
        .unwrap();

    assert_eq!(persisted, 3);
    assert_eq!(queue.remaining(), 0);

    let events = store.events();
    assert_eq!(events.len(), 3);
    assert_eq!(events[0].transaction_id, "txn-0");
    assert_eq!(events[0].event_type, "prepare-notification");
}

/// Test: ingestion stamps a fresh timestamp and its own correlation id
#[tokio::test]
async fn test_ingestor_overrides_timestamp_and_request_id() {
    let queue = Arc::new(MemoryQueue::default());
    let store = Arc::new(MemoryAuditStore::default());

    let mut produced = producer_event("txn-1");
    produced.timestamp = "1999-01-01-00.00.00.000000".to_string();
    queue
        .send(&serde_json::to_string(&produced).unwrap())
        .await
        .unwrap();

    ingestor(&queue, &store)
        .poll_once("req-ingest")
        .await
        .unwrap();

    let stored = &store.events()[0];
    assert_ne!(stored.timestamp, produced.timestamp);
    assert!(stored.timestamp.starts_with("20"));
    assert_eq!(stored.request_id, "req-ingest");

    // producer payload fields survive untouched
    assert_eq!(stored.request_body, produced.request_body);
    assert_eq!(stored.transaction_output, produced.transaction_output);
}

/// Test: a store failure aborts the batch, leaving the remainder undeleted
#[tokio::test]
async fn test_store_failure_leaves_remainder_on_queue() {
    let queue = Arc::new(MemoryQueue::default());
    let store = Arc::new(MemoryAuditStore::default());
    store.fail_after(1);

    for i in 0..3 {
        let payload = serde_json::to_string(&producer_event(&format!("txn-{}", i))).unwrap();
        queue.send(&payload).await.unwrap();
    }

    let result = ingestor(&queue, &store).poll_once("req-ingest").await;

    assert!(result.is_err());
    assert_eq!(store.events().len(), 1);
    // one message acknowledged, two left for redelivery
    assert_eq!(queue.remaining(), 2);
}

/// Test: a minimal message ingests with field defaults
#[tokio::test]
async fn test_ingestor_tolerates_minimal_message() {
    let queue = Arc::new(MemoryQueue::default());
    let store = Arc::new(MemoryAuditStore::default());

    queue.send("{}").await.unwrap();

    let persisted = ingestor(&queue, &store)
        .poll_once("req-ingest")
        .await
        .unwrap();

    assert_eq!(persisted, 1);

    let stored = &store.events()[0];
    assert_eq!(stored.transaction_id, "N/A");
    assert_eq!(stored.event_type, "unknown");
    assert_eq!(stored.path, "N/A");
}

/// Test: a malformed message aborts without persisting anything
#[tokio::test]
async fn test_malformed_message_aborts_batch() {
    let queue = Arc::new(MemoryQueue::default());
    let store = Arc::new(MemoryAuditStore::default());

    queue.send("{ not json }").await.unwrap();

    let result = ingestor(&queue, &store).poll_once("req-ingest").await;

    assert!(result.is_err());
    assert_eq!(store.events().len(), 0);
    assert_eq!(queue.remaining(), 1);
}

/// Test: recorder emission failures are swallowed, never propagated
#[tokio::test]
async fn test_recorder_swallows_emission_failure() {
    let queue = Arc::new(MemoryQueue::default());
    queue.fail_sends();

    let recorder = AuditRecorder::new(queue.clone() as Arc<dyn Queue>);

    // must not panic or error; the event is simply lost and logged
    recorder.record(producer_event("txn-1")).await;

    assert_eq!(queue.remaining(), 0);
}

/// Test: recorder puts the serialized event on the audit queue
#[tokio::test]
async fn test_recorder_emits_serialized_event() {
    let queue = Arc::new(MemoryQueue::default());
    let recorder = AuditRecorder::new(queue.clone() as Arc<dyn Queue>);

    recorder.record(producer_event("txn-9")).await;

    let bodies = queue.bodies();
    assert_eq!(bodies.len(), 1);

    let event: AuditEvent = serde_json::from_str(&bodies[0]).unwrap();
    assert_eq!(event.transaction_id, "txn-9");
    assert_eq!(event.request_id, "req-producer");
}
