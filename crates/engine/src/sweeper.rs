//! Expiry sweeper: releases reservations past their deadline.

use chrono::Utc;
use ledger::StockLedger;

use crate::engine::ReservationEngine;

/// Scans for active reservations past their deadline and expires them.
///
/// Safe to invoke concurrently with itself and with `complete`/`release`
/// on the same records, since `expire` is unconditionally idempotent. A
/// failing record is logged and skipped; one bad record never aborts the
/// sweep.
#[derive(Clone)]
pub struct ExpirySweeper<L: StockLedger> {
    engine: ReservationEngine<L>,
}

impl<L: StockLedger> ExpirySweeper<L> {
    /// Creates a sweeper over the given engine.
    pub fn new(engine: ReservationEngine<L>) -> Self {
        Self { engine }
    }

    /// Runs one sweep and returns the number of reservations expired.
    #[tracing::instrument(skip(self))]
    pub async fn sweep(&self) -> usize {
        let start = std::time::Instant::now();
        let now = Utc::now();
        let candidates = self.engine.expired_candidates(now).await;

        let mut expired = 0;
        for id in candidates {
            match self.engine.expire(id).await {
                Ok(true) => expired += 1,
                // Lost the race to a concurrent complete/release/sweep.
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(reservation_id = %id, error = %e, "failed to expire, skipping");
                }
            }
        }

        metrics::counter!("sweeps_total").increment(1);
        metrics::histogram!("sweep_duration_seconds").record(start.elapsed().as_secs_f64());
        if expired > 0 {
            tracing::info!(expired, "sweep released stale reservations");
        }
        expired
    }

    /// Drives `sweep` on a fixed interval until the task is dropped.
    ///
    /// A sweep always runs to completion; cancellation happens between
    /// ticks.
    pub async fn run(self, interval: std::time::Duration) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.sweep().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use common::{Holder, ItemKey, SessionToken};
    use ledger::{InMemoryStockLedger, StockLedger};

    use crate::engine::DEFAULT_TTL;
    use crate::reservation::ReservationStatus;

    async fn setup(total: u32) -> (
        ReservationEngine<InMemoryStockLedger>,
        ExpirySweeper<InMemoryStockLedger>,
        ItemKey,
    ) {
        let ledger = InMemoryStockLedger::new();
        let item = ItemKey::product("SKU-001");
        ledger.sync_item(item.clone(), total).await.unwrap();
        let engine = ReservationEngine::new(ledger);
        let sweeper = ExpirySweeper::new(engine.clone());
        (engine, sweeper, item)
    }

    fn holder() -> Holder {
        Holder::Session(SessionToken::new("sess-1"))
    }

    #[tokio::test]
    async fn test_sweep_expires_stale_reservations() {
        let (engine, sweeper, item) = setup(10).await;

        let stale = engine
            .reserve(item.clone(), holder(), 4, Duration::seconds(-1))
            .await
            .unwrap();
        engine
            .reserve(item.clone(), holder(), 2, DEFAULT_TTL)
            .await
            .unwrap();

        assert_eq!(sweeper.sweep().await, 1);
        assert_eq!(
            engine.get(stale.id).await.unwrap().status,
            ReservationStatus::Expired
        );
        // The stale quantity is back in the pool; the live hold still counts.
        assert_eq!(engine.available_stock(&item).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_second_sweep_is_a_no_op() {
        let (engine, sweeper, item) = setup(10).await;
        engine
            .reserve(item.clone(), holder(), 4, Duration::seconds(-1))
            .await
            .unwrap();

        assert_eq!(sweeper.sweep().await, 1);
        assert_eq!(sweeper.sweep().await, 0);
        assert_eq!(engine.available_stock(&item).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_sweep_with_nothing_to_do() {
        let (engine, sweeper, item) = setup(10).await;
        engine
            .reserve(item, holder(), 2, DEFAULT_TTL)
            .await
            .unwrap();

        assert_eq!(sweeper.sweep().await, 0);
    }

    #[tokio::test]
    async fn test_bad_record_does_not_abort_sweep() {
        let ledger = InMemoryStockLedger::new();
        let item = ItemKey::product("SKU-001");
        ledger.sync_item(item.clone(), 10).await.unwrap();
        let engine = ReservationEngine::new(ledger.clone());
        let sweeper = ExpirySweeper::new(engine.clone());

        let a = engine
            .reserve(item.clone(), holder(), 1, Duration::seconds(-1))
            .await
            .unwrap();
        let b = engine
            .reserve(item.clone(), holder(), 1, Duration::seconds(-1))
            .await
            .unwrap();

        // Every release fails; the sweep must still visit both records.
        ledger.set_fail_on_release(true);
        assert_eq!(sweeper.sweep().await, 0);
        assert!(engine.get(a.id).await.unwrap().is_active());
        assert!(engine.get(b.id).await.unwrap().is_active());

        // Once the ledger recovers the next sweep finishes the job.
        ledger.set_fail_on_release(false);
        assert_eq!(sweeper.sweep().await, 2);
        assert_eq!(engine.available_stock(&item).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_sweep_races_release_idempotently() {
        let (engine, sweeper, item) = setup(10).await;
        let r = engine
            .reserve(item.clone(), holder(), 3, Duration::seconds(-1))
            .await
            .unwrap();

        // Compensation released the record just before the sweep.
        engine.release(r.id).await.unwrap();
        assert_eq!(sweeper.sweep().await, 0);
        assert_eq!(
            engine.get(r.id).await.unwrap().status,
            ReservationStatus::Released
        );
    }
}
