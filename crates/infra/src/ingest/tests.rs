use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use stockwatch_core::ProductId;
use stockwatch_inventory::{InventoryEvent, StockLevels, StockTransition, TransitionKind};

use super::*;
use crate::broker::ChannelSource;
use crate::event_log::{InMemoryEventLog, TransitionRecord};

fn pid(s: &str) -> ProductId {
    ProductId::new(s).unwrap()
}

fn payload(product: &str, quantity: i64) -> Vec<u8> {
    InventoryEvent::new(pid(product), quantity, "2024-05-01 10:00:00 +0000 UTC")
        .encode_wire()
        .unwrap()
}

fn fast_policy() -> IngestPolicy {
    IngestPolicy {
        on_decode_error: DecodeErrorPolicy::Skip,
        write_timeout: Duration::from_millis(50),
        write_retry: RetryPolicy::fixed(3, Duration::from_millis(1)),
    }
}

fn ingestor(seed: &[(&str, i64)]) -> (Ingestor<Arc<InMemoryEventLog>>, Arc<InMemoryEventLog>) {
    let log = Arc::new(InMemoryEventLog::new());
    let levels = StockLevels::with_seed(seed.iter().map(|(p, q)| (pid(p), *q)));
    (Ingestor::new(levels, log.clone(), fast_policy()), log)
}

/// Reports a fixed row count without storing anything.
struct RowCountStore {
    rows: u64,
    calls: AtomicU32,
}

#[async_trait::async_trait]
impl EventLogStore for RowCountStore {
    async fn append(&self, _: &StockTransition) -> Result<u64, EventLogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows)
    }

    async fn list_for_product(&self, _: &ProductId, _: u32) -> Result<Vec<TransitionRecord>, EventLogError> {
        Ok(vec![])
    }
}

/// Fails with `error` for the first `failures` appends, then delegates.
struct FlakyStore {
    failures: u32,
    calls: AtomicU32,
    error: fn() -> EventLogError,
    inner: InMemoryEventLog,
}

impl FlakyStore {
    fn new(failures: u32, error: fn() -> EventLogError) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
            error,
            inner: InMemoryEventLog::new(),
        }
    }
}

#[async_trait::async_trait]
impl EventLogStore for FlakyStore {
    async fn append(&self, transition: &StockTransition) -> Result<u64, EventLogError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) < self.failures {
            return Err((self.error)());
        }
        self.inner.append(transition).await
    }

    async fn list_for_product(&self, p: &ProductId, limit: u32) -> Result<Vec<TransitionRecord>, EventLogError> {
        self.inner.list_for_product(p, limit).await
    }
}

/// Never answers within any reasonable timeout.
struct HangingStore {
    calls: AtomicU32,
}

/// Commits the row, then never acknowledges it.
struct CommitThenStallStore {
    inner: InMemoryEventLog,
}

#[async_trait::async_trait]
impl EventLogStore for CommitThenStallStore {
    async fn append(&self, transition: &StockTransition) -> Result<u64, EventLogError> {
        self.inner.append(transition).await?;
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(1)
    }

    async fn list_for_product(&self, p: &ProductId, limit: u32) -> Result<Vec<TransitionRecord>, EventLogError> {
        self.inner.list_for_product(p, limit).await
    }
}

#[async_trait::async_trait]
impl EventLogStore for HangingStore {
    async fn append(&self, _: &StockTransition) -> Result<u64, EventLogError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(1)
    }

    async fn list_for_product(&self, _: &ProductId, _: u32) -> Result<Vec<TransitionRecord>, EventLogError> {
        Ok(vec![])
    }
}

#[tokio::test]
async fn first_event_at_zero_writes_nothing() {
    let (mut ingestor, log) = ingestor(&[]);

    let outcome = ingestor.handle(&payload("P1", 0)).await.unwrap();

    assert_eq!(outcome, Outcome::Unchanged { previous: 0, current: 0 });
    assert!(log.all().is_empty());
    assert_eq!(ingestor.levels.get(&pid("P1")), 0);
}

#[tokio::test]
async fn drop_below_ten_logs_low_stock_with_prior_quantity() {
    let (mut ingestor, log) = ingestor(&[("P1", 11)]);

    let outcome = ingestor.handle(&payload("P1", 5)).await.unwrap();

    let expected = StockTransition {
        product_id: pid("P1"),
        previous_quantity: 11,
        new_quantity: 5,
        event_type: TransitionKind::LowStock,
    };
    assert_eq!(
        outcome,
        Outcome::Logged {
            transition: expected,
            rows_affected: 1
        }
    );

    let records = log.all();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].previous_quantity, 11);
    assert_eq!(records[0].new_quantity, 5);
    assert_eq!(records[0].event_type, TransitionKind::LowStock);
    assert_eq!(ingestor.levels.get(&pid("P1")), 5);
}

#[tokio::test]
async fn replaying_the_same_event_does_not_log_twice() {
    let (mut ingestor, log) = ingestor(&[("P1", 20)]);

    ingestor.handle(&payload("P1", 0)).await.unwrap();
    let second = ingestor.handle(&payload("P1", 0)).await.unwrap();

    assert_eq!(second, Outcome::Unchanged { previous: 0, current: 0 });
    assert_eq!(log.all().len(), 1);
}

#[tokio::test]
async fn run_processes_deliveries_in_order() {
    let (ingestor, log) = ingestor(&[]);
    let (tx, source) = ChannelSource::new(16);

    for q in [12, 5, 5, 0, 3, 30] {
        tx.send(payload("P1", q)).await.unwrap();
    }
    tx.send(payload("P2", 4)).await.unwrap();
    drop(tx);

    let stats = ingestor.run(source).await.unwrap();

    let kinds: Vec<_> = log
        .all()
        .iter()
        .map(|r| (r.product_id.as_str().to_string(), r.previous_quantity, r.new_quantity, r.event_type))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("P1".to_string(), 0, 12, TransitionKind::BackInStock),
            ("P1".to_string(), 12, 5, TransitionKind::LowStock),
            ("P1".to_string(), 5, 0, TransitionKind::OutOfStock),
            ("P1".to_string(), 0, 3, TransitionKind::BackInStock),
            ("P2".to_string(), 0, 4, TransitionKind::BackInStock),
        ]
    );
    assert_eq!(
        stats,
        IngestStats {
            received: 7,
            skipped: 0,
            logged: 5,
            anomalies: 0
        }
    );
}

#[tokio::test]
async fn zero_rows_affected_is_an_anomaly_but_ingestion_continues() {
    let store = Arc::new(RowCountStore {
        rows: 0,
        calls: AtomicU32::new(0),
    });
    let ingestor = Ingestor::new(
        StockLevels::with_seed([(pid("P1"), 11)]),
        store.clone(),
        fast_policy(),
    );
    let (tx, source) = ChannelSource::new(4);
    tx.send(payload("P1", 5)).await.unwrap();
    tx.send(payload("P1", 0)).await.unwrap();
    drop(tx);

    let stats = ingestor.run(source).await.unwrap();

    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
    assert_eq!(stats.anomalies, 2);
    assert_eq!(stats.logged, 0);
    assert_eq!(stats.received, 2);
}

#[tokio::test]
async fn undecodable_payload_is_skipped_without_touching_levels() {
    let (ingestor, log) = ingestor(&[("P1", 11)]);
    let (tx, source) = ChannelSource::new(4);
    tx.send(br#"{"product_id":"P1","quantity":0,"timestamp":"t"}"#.to_vec()).await.unwrap();
    tx.send(b"not json".to_vec()).await.unwrap();
    tx.send(payload("P1", 5)).await.unwrap();
    drop(tx);

    let stats = ingestor.run(source).await.unwrap();

    assert_eq!(stats.skipped, 2);
    let records = log.all();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].previous_quantity, 11);
    assert_eq!(records[0].event_type, TransitionKind::LowStock);
}

#[tokio::test]
async fn halt_policy_stops_on_undecodable_payload() {
    let log = Arc::new(InMemoryEventLog::new());
    let policy = IngestPolicy {
        on_decode_error: DecodeErrorPolicy::Halt,
        ..fast_policy()
    };
    let ingestor = Ingestor::new(StockLevels::new(), log.clone(), policy);
    let (tx, source) = ChannelSource::new(4);
    tx.send(b"\"{broken\"".to_vec()).await.unwrap();
    tx.send(payload("P1", 5)).await.unwrap();
    drop(tx);

    let result = ingestor.run(source).await;

    assert!(matches!(result, Err(IngestError::Decode(_))));
    assert!(log.all().is_empty());
}

#[tokio::test]
async fn transient_storage_failures_are_retried() {
    let store = Arc::new(FlakyStore::new(2, || {
        EventLogError::Unavailable("connection refused".into())
    }));
    let mut ingestor = Ingestor::new(StockLevels::new(), store.clone(), fast_policy());

    let outcome = ingestor.handle(&payload("P1", 8)).await.unwrap();

    assert!(matches!(outcome, Outcome::Logged { rows_affected: 1, .. }));
    assert_eq!(store.calls.load(Ordering::SeqCst), 3);
    assert_eq!(store.inner.all().len(), 1);
}

#[tokio::test]
async fn storage_outage_beyond_retry_budget_is_fatal() {
    let store = Arc::new(FlakyStore::new(u32::MAX, || {
        EventLogError::Unavailable("connection refused".into())
    }));
    let ingestor = Ingestor::new(StockLevels::new(), store.clone(), fast_policy());
    let (tx, source) = ChannelSource::new(4);
    tx.send(payload("P1", 8)).await.unwrap();
    tx.send(payload("P2", 8)).await.unwrap();
    drop(tx);

    let result = ingestor.run(source).await;

    assert!(matches!(result, Err(IngestError::Storage(_))));
    // Three attempts for the first message, none for the second.
    assert_eq!(store.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn rejected_write_is_not_retried() {
    let store = Arc::new(FlakyStore::new(u32::MAX, || {
        EventLogError::Rejected("relation \"inventory_events\" does not exist".into())
    }));
    let mut ingestor = Ingestor::new(StockLevels::new(), store.clone(), fast_policy());

    let result = ingestor.handle(&payload("P1", 8)).await;

    assert!(matches!(result, Err(IngestError::Storage(_))));
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn hung_write_is_fatal_after_one_attempt() {
    let store = Arc::new(HangingStore {
        calls: AtomicU32::new(0),
    });
    let mut ingestor = Ingestor::new(StockLevels::new(), store.clone(), fast_policy());

    let result = tokio::time::timeout(Duration::from_secs(5), ingestor.handle(&payload("P1", 8)))
        .await
        .expect("write timeout should bound the pipeline");

    match result {
        Err(IngestError::Storage(msg)) => assert!(msg.contains("timed out"), "{msg}"),
        other => panic!("expected storage timeout, got {other:?}"),
    }
    assert_eq!(store.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn late_acknowledged_write_is_not_inserted_twice() {
    let store = Arc::new(CommitThenStallStore {
        inner: InMemoryEventLog::new(),
    });
    let mut ingestor = Ingestor::new(
        StockLevels::with_seed([(pid("P1"), 11)]),
        store.clone(),
        fast_policy(),
    );

    let result = tokio::time::timeout(Duration::from_secs(5), ingestor.handle(&payload("P1", 5)))
        .await
        .expect("write timeout should bound the pipeline");

    assert!(matches!(result, Err(IngestError::Storage(_))));
    let records = store.inner.all();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].event_type, TransitionKind::LowStock);
}

#[tokio::test]
async fn broker_stream_error_is_fatal() {
    struct FailingSource;

    #[async_trait::async_trait]
    impl DeliverySource for FailingSource {
        async fn next_delivery(&mut self) -> Option<Result<crate::broker::Delivery, BrokerError>> {
            Some(Err(BrokerError::Delivery("channel closed by server".into())))
        }
    }

    let (ingestor, _log) = ingestor(&[]);
    let result = ingestor.run(FailingSource).await;

    assert!(matches!(result, Err(IngestError::Broker(BrokerError::Delivery(_)))));
}

#[test]
fn decode_policy_parses_case_insensitively() {
    assert_eq!("SKIP".parse::<DecodeErrorPolicy>().unwrap(), DecodeErrorPolicy::Skip);
    assert_eq!("halt".parse::<DecodeErrorPolicy>().unwrap(), DecodeErrorPolicy::Halt);
    assert!("retry".parse::<DecodeErrorPolicy>().is_err());
}

#[tokio::test]
async fn blank_product_id_is_skipped() {
    let (mut ingestor, log) = ingestor(&[]);
    let blank = br#""{\"product_id\":\"\",\"quantity\":5,\"timestamp\":\"t\"}""#;

    let outcome = ingestor.handle(blank).await.unwrap();

    assert_eq!(outcome, Outcome::Skipped);
    assert!(ingestor.levels.is_empty());
    assert!(log.all().is_empty());
    assert_eq!(ingestor.stats().skipped, 1);
}
