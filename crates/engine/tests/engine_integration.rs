//! End-to-end engine tests over the in-memory store.

use std::collections::HashMap;
use std::time::Duration;

use domain::{ItemDraft, Money, OrderRequest, ProductId, Rejection, UserId};
use engine::{BatchPolicy, Engine, EngineConfig, SubmitError, submit_and_collect};
use store::{InMemoryStore, ReservationStore, StockCache};

fn config(max_wait_ms: u64) -> EngineConfig {
    EngineConfig {
        policy: BatchPolicy {
            max_batch_items: 256,
            max_wait: Duration::from_millis(max_wait_ms),
        },
        ..EngineConfig::default()
    }
}

fn request(items: Vec<ItemDraft>) -> (OrderRequest, domain::CompletionReceiver) {
    OrderRequest::new(UserId::new(), items).unwrap()
}

async fn quantity(store: &InMemoryStore, product: &str) -> Option<u32> {
    store.read_quantity(&ProductId::new(product)).await.unwrap()
}

#[tokio::test]
async fn test_batch_of_one_completes() {
    let store = InMemoryStore::new();
    store.upsert_stock("SKU-001", 10).await;
    let engine = Engine::start(store.clone(), StockCache::new(), config(5));

    let (req, rx) = request(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 3)]);
    let order_id = req.id;
    engine.handle().submit(req).unwrap();

    let order = rx.await.unwrap().unwrap();
    assert_eq!(order.id, order_id);
    assert_eq!(order.total_quantity(), 3);
    assert_eq!(quantity(&store, "SKU-001").await, Some(7));
    assert!(store.get_order(order_id).await.unwrap().is_some());

    engine.shutdown().await;
}

#[tokio::test]
async fn test_exact_stock_split_accepts_both() {
    let store = InMemoryStore::new();
    store.upsert_stock("SKU-001", 20).await;
    let engine = Engine::start(store.clone(), StockCache::new(), config(20));
    let handle = engine.handle();

    let requests = vec![
        request(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 10)]),
        request(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 10)]),
    ];
    let results = submit_and_collect(&handle, requests).await;

    assert_eq!(results.len(), 2);
    assert!(results.values().all(|outcome| outcome.is_ok()));
    assert_eq!(quantity(&store, "SKU-001").await, Some(0));
    assert_eq!(store.order_count().await, 2);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_contention_rejects_exactly_one_with_observed_availability() {
    let store = InMemoryStore::new();
    store.upsert_stock("SKU-001", 15).await;
    let engine = Engine::start(store.clone(), StockCache::new(), config(20));
    let handle = engine.handle();

    let requests = vec![
        request(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 10)]),
        request(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 10)]),
    ];
    let results = submit_and_collect(&handle, requests).await;

    let accepted = results.values().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(accepted, 1);
    assert!(results.values().any(|outcome| matches!(
        outcome,
        Err(SubmitError::Rejected(Rejection::OutOfStock {
            requested: 10,
            available: 5,
            ..
        }))
    )));
    assert_eq!(quantity(&store, "SKU-001").await, Some(5));
    assert_eq!(store.order_count().await, 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_unknown_product_rejection_is_isolated() {
    let store = InMemoryStore::new();
    store.upsert_stock("SKU-001", 10).await;
    let engine = Engine::start(store.clone(), StockCache::new(), config(20));
    let handle = engine.handle();

    let (bad, bad_rx) = request(vec![ItemDraft::new("SKU-404", Money::from_cents(900), 1)]);
    let (good, good_rx) = request(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 4)]);
    let bad_id = bad.id;
    let good_id = good.id;

    let results = submit_and_collect(&handle, vec![(bad, bad_rx), (good, good_rx)]).await;

    assert!(matches!(
        results[&bad_id],
        Err(SubmitError::Rejected(Rejection::ProductNotFound { .. }))
    ));
    assert!(results[&good_id].is_ok());
    assert_eq!(quantity(&store, "SKU-001").await, Some(6));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_transient_apply_failure_is_retried_invisibly() {
    let store = InMemoryStore::new();
    store.upsert_stock("SKU-001", 10).await;
    store.fail_next_applies(1);
    let engine = Engine::start(store.clone(), StockCache::new(), config(5));

    let (req, rx) = request(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 2)]);
    engine.handle().submit(req).unwrap();

    assert!(rx.await.unwrap().is_ok());
    assert_eq!(quantity(&store, "SKU-001").await, Some(8));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_commit_failure_is_reattempted_then_succeeds() {
    let store = InMemoryStore::new();
    store.upsert_stock("SKU-001", 10).await;
    store.fail_next_commits(1);
    let engine = Engine::start(store.clone(), StockCache::new(), config(5));

    let (req, rx) = request(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 2)]);
    engine.handle().submit(req).unwrap();

    assert!(rx.await.unwrap().is_ok());
    assert_eq!(quantity(&store, "SKU-001").await, Some(8));
    assert_eq!(store.order_count().await, 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_exhausted_commit_attempts_reject_without_partial_effects() {
    let store = InMemoryStore::new();
    store.upsert_stock("SKU-001", 10).await;
    store.fail_next_commits(2);
    let engine = Engine::start(store.clone(), StockCache::new(), config(20));
    let handle = engine.handle();

    let requests = vec![
        request(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 2)]),
        request(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 3)]),
    ];
    let results = submit_and_collect(&handle, requests).await;

    assert!(results.values().all(|outcome| matches!(
        outcome,
        Err(SubmitError::Rejected(Rejection::Persistence { .. }))
    )));
    assert_eq!(quantity(&store, "SKU-001").await, Some(10));
    assert_eq!(store.order_count().await, 0);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_capacity_exceeded_surfaces_per_order() {
    let store = InMemoryStore::new();
    store.upsert_stock("SKU-001", 100).await;
    let engine = Engine::start(
        store,
        StockCache::new(),
        EngineConfig {
            queue_capacity: 1,
            policy: BatchPolicy {
                max_batch_items: 256,
                // Long wait so the scheduler sits on the first request
                // while the queue fills behind it.
                max_wait: Duration::from_millis(200),
            },
            ..EngineConfig::default()
        },
    );
    let handle = engine.handle();

    let mut requests = Vec::new();
    for _ in 0..8 {
        requests.push(request(vec![ItemDraft::new(
            "SKU-001",
            Money::from_cents(1000),
            1,
        )]));
    }
    let results = submit_and_collect(&handle, requests).await;

    let over_capacity = results
        .values()
        .filter(|outcome| matches!(outcome, Err(SubmitError::CapacityExceeded)))
        .count();
    let accepted = results.values().filter(|outcome| outcome.is_ok()).count();
    assert!(over_capacity >= 1);
    assert_eq!(accepted + over_capacity, 8);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_submit_after_shutdown_is_refused() {
    let store = InMemoryStore::new();
    let engine = Engine::start(store, StockCache::new(), config(5));
    let handle = engine.handle();
    engine.shutdown().await;

    let (req, _rx) = request(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 1)]);
    let err = handle.submit(req).unwrap_err();
    assert!(matches!(err, engine::AdmissionError::Closed(_)));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_load_never_oversells() {
    let store = InMemoryStore::new();
    store.upsert_stock("SKU-001", 50).await;
    let engine = Engine::start(store.clone(), StockCache::new(), config(2));
    let handle = engine.handle();

    let mut tasks = Vec::new();
    for _ in 0..40 {
        let handle = handle.clone();
        tasks.push(tokio::spawn(async move {
            let (req, rx) = OrderRequest::new(
                UserId::new(),
                vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 3)],
            )
            .unwrap();
            match handle.submit(req) {
                Ok(()) => rx.await.unwrap().is_ok(),
                Err(_) => false,
            }
        }));
    }

    let mut accepted: u32 = 0;
    for task in tasks {
        if task.await.unwrap() {
            accepted += 1;
        }
    }

    // 40 x 3 = 120 requested against 50 units: some must lose, none may
    // drive the ledger negative.
    let remaining = quantity(&store, "SKU-001").await.unwrap();
    assert_eq!(remaining, 50 - accepted * 3);
    assert!(accepted <= 16);
    assert_eq!(store.order_count().await, accepted as usize);

    engine.shutdown().await;
}

#[tokio::test]
async fn test_cache_mirrors_committed_quantities() {
    let store = InMemoryStore::new();
    store.upsert_stock("SKU-001", 10).await;
    let cache = StockCache::new();
    let engine = Engine::start(store, cache.clone(), config(5));

    let (req, rx) = request(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 4)]);
    engine.handle().submit(req).unwrap();
    rx.await.unwrap().unwrap();

    assert_eq!(cache.read(&ProductId::new("SKU-001")), Some(6));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_trace_token_propagates_to_order() {
    let store = InMemoryStore::new();
    store.upsert_stock("SKU-001", 10).await;
    let engine = Engine::start(store.clone(), StockCache::new(), config(5));

    let (req, rx) = request(vec![ItemDraft::new("SKU-001", Money::from_cents(1000), 1)]);
    let req = req.with_trace_token("req-42");
    engine.handle().submit(req).unwrap();

    let order = rx.await.unwrap().unwrap();
    assert_eq!(order.trace_token.as_deref(), Some("req-42"));

    let stored = store.get_order(order.id).await.unwrap().unwrap();
    assert_eq!(stored.trace_token.as_deref(), Some("req-42"));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_every_submitted_order_gets_exactly_one_result() {
    let store = InMemoryStore::new();
    store.upsert_stock("SKU-001", 30).await;
    let engine = Engine::start(store, StockCache::new(), config(10));
    let handle = engine.handle();

    let mut ids = Vec::new();
    let mut requests = Vec::new();
    for quantity in 1..=10u32 {
        let (req, rx) = request(vec![ItemDraft::new(
            "SKU-001",
            Money::from_cents(1000),
            quantity,
        )]);
        ids.push(req.id);
        requests.push((req, rx));
    }

    let results: HashMap<_, _> = submit_and_collect(&handle, requests).await;
    assert_eq!(results.len(), 10);
    for id in ids {
        assert!(results.contains_key(&id));
    }

    engine.shutdown().await;
}
