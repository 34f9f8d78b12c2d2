//! Integration tests for the reservation engine under concurrency.

use chrono::Duration;
use common::{Holder, ItemKey, SessionToken, UserId};
use engine::{DEFAULT_TTL, EngineError, ExpirySweeper, ReservationEngine};
use ledger::{InMemoryStockLedger, StockLedger};

async fn setup(item: &ItemKey, total: u32) -> ReservationEngine<InMemoryStockLedger> {
    let ledger = InMemoryStockLedger::new();
    ledger.sync_item(item.clone(), total).await.unwrap();
    ReservationEngine::new(ledger)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_reserves_never_oversell() {
    let item = ItemKey::product("SKU-LIMITED");
    let engine = setup(&item, 5).await;

    let mut handles = Vec::new();
    for _ in 0..50 {
        let engine = engine.clone();
        let item = item.clone();
        handles.push(tokio::spawn(async move {
            engine
                .reserve(item, Holder::User(UserId::new()), 1, DEFAULT_TTL)
                .await
        }));
    }

    let mut successes = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(EngineError::InsufficientStock { .. }) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    // Exactly the available stock was claimed, never more.
    assert_eq!(successes, 5);
    assert_eq!(engine.available_stock(&item).await.unwrap(), 0);
    assert_eq!(engine.total_stock(&item).await.unwrap(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_mixed_quantities_respect_total() {
    let item = ItemKey::product("SKU-MIXED");
    let engine = setup(&item, 10).await;

    let mut handles = Vec::new();
    for i in 0..30 {
        let engine = engine.clone();
        let item = item.clone();
        let quantity = (i % 3) + 1;
        handles.push(tokio::spawn(async move {
            engine
                .reserve(item, Holder::User(UserId::new()), quantity, DEFAULT_TTL)
                .await
        }));
    }

    let mut reserved = 0u32;
    for handle in handles {
        if let Ok(r) = handle.await.unwrap() {
            reserved += r.quantity;
        }
    }

    assert!(reserved <= 10);
    assert_eq!(engine.available_stock(&item).await.unwrap(), 10 - reserved);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn operations_on_different_items_proceed_in_parallel() {
    let ledger = InMemoryStockLedger::new();
    let items: Vec<ItemKey> = (0..8).map(|i| ItemKey::product(format!("SKU-{i:03}"))).collect();
    for item in &items {
        ledger.sync_item(item.clone(), 100).await.unwrap();
    }
    let engine = ReservationEngine::new(ledger);

    let mut handles = Vec::new();
    for item in &items {
        for _ in 0..20 {
            let engine = engine.clone();
            let item = item.clone();
            handles.push(tokio::spawn(async move {
                engine
                    .reserve(item, Holder::User(UserId::new()), 1, DEFAULT_TTL)
                    .await
                    .unwrap()
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap();
    }

    for item in &items {
        assert_eq!(engine.available_stock(item).await.unwrap(), 80);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn concurrent_sweeps_and_releases_agree() {
    let item = ItemKey::product("SKU-STALE");
    let engine = setup(&item, 20).await;
    let sweeper = ExpirySweeper::new(engine.clone());

    let mut ids = Vec::new();
    for _ in 0..20 {
        let r = engine
            .reserve(
                item.clone(),
                Holder::Session(SessionToken::new("sess-1")),
                1,
                Duration::seconds(-1),
            )
            .await
            .unwrap();
        ids.push(r.id);
    }

    // Sweeps race explicit releases over the same stale records.
    let mut handles = Vec::new();
    for _ in 0..4 {
        let sweeper = sweeper.clone();
        handles.push(tokio::spawn(async move { sweeper.sweep().await }));
    }
    for id in &ids {
        let engine = engine.clone();
        let id = *id;
        handles.push(tokio::spawn(async move {
            engine.release(id).await.unwrap();
            0
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    // Every record reached exactly one terminal state and all stock is back.
    assert_eq!(engine.available_stock(&item).await.unwrap(), 20);
    for id in ids {
        let record = engine.get(id).await.unwrap();
        assert!(record.status.is_terminal());
    }
}

#[tokio::test]
async fn reserve_then_release_restores_pre_reserve_availability() {
    let item = ItemKey::product("SKU-001");
    let engine = setup(&item, 7).await;

    let before = engine.available_stock(&item).await.unwrap();
    let r = engine
        .reserve(
            item.clone(),
            Holder::Session(SessionToken::new("sess-1")),
            5,
            DEFAULT_TTL,
        )
        .await
        .unwrap();
    engine.release(r.id).await.unwrap();

    assert_eq!(engine.available_stock(&item).await.unwrap(), before);
}
