//! Atomic reservation operations over the stock ledger.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use common::{Holder, ItemKey, ReservationId};
use ledger::{Hold, StockLedger};
use tokio::sync::{Mutex, RwLock};

use crate::error::EngineError;
use crate::reservation::{Reservation, ReservationStatus};
use crate::Result;

/// Default reservation lifetime when the caller supplies none.
pub const DEFAULT_TTL: Duration = Duration::minutes(10);

/// Executes the reservation state machine against a stock ledger.
///
/// Every mutating operation is serialized per [`ItemKey`] through a lock
/// registry; operations on different items never block each other. Tokio
/// mutexes queue waiters fairly, so contended keys cannot starve a caller.
/// The key guard is held only for the ledger mutation itself, never across
/// any other external call.
#[derive(Clone)]
pub struct ReservationEngine<L: StockLedger> {
    ledger: L,
    records: Arc<RwLock<HashMap<ReservationId, Reservation>>>,
    locks: Arc<Mutex<HashMap<ItemKey, Arc<Mutex<()>>>>>,
}

impl<L: StockLedger> ReservationEngine<L> {
    /// Creates a new engine over the given ledger.
    pub fn new(ledger: L) -> Self {
        Self {
            ledger,
            records: Arc::new(RwLock::new(HashMap::new())),
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Places a time-bounded hold of `quantity` units on `item`.
    ///
    /// The availability read and the hold registration happen under the
    /// item's key lock, so two concurrent reservations can never both see
    /// stale availability and oversell. A failed reservation is reported
    /// immediately; there is no queueing or backoff.
    #[tracing::instrument(skip_all, fields(%item, %holder, quantity))]
    pub async fn reserve(
        &self,
        item: ItemKey,
        holder: Holder,
        quantity: u32,
        ttl: Duration,
    ) -> Result<Reservation> {
        if quantity == 0 {
            return Err(EngineError::InvalidQuantity);
        }

        let lock = self.key_lock(&item).await;
        let _guard = lock.lock().await;

        let available = self.ledger.available_stock(&item).await?;
        if available < quantity {
            metrics::counter!("reservations_rejected_total").increment(1);
            tracing::debug!(requested = quantity, available, "reservation rejected");
            return Err(EngineError::InsufficientStock {
                item,
                requested: quantity,
                available,
            });
        }

        let reservation = Reservation::new(item.clone(), holder, quantity, Utc::now(), ttl);
        self.ledger
            .register_hold(
                &item,
                Hold::new(reservation.id, quantity, reservation.expires_at),
            )
            .await?;
        self.records
            .write()
            .await
            .insert(reservation.id, reservation.clone());

        metrics::counter!("reservations_created_total").increment(1);
        tracing::info!(reservation_id = %reservation.id, quantity, "reservation created");
        Ok(reservation)
    }

    /// Cancels an active reservation, returning its quantity to the
    /// available pool.
    ///
    /// Releasing a reservation that already reached a terminal state is a
    /// no-op success: compensation logic and the sweeper may race to
    /// release the same record.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, id: ReservationId) -> Result<()> {
        let item = self.item_of(id).await?;
        let lock = self.key_lock(&item).await;
        let _guard = lock.lock().await;

        match self.status_of(id).await? {
            ReservationStatus::Active => {
                self.ledger.release_hold(&item, id).await?;
                self.set_status(id, ReservationStatus::Released).await;
                metrics::counter!("reservations_released_total").increment(1);
                tracing::info!(reservation_id = %id, "reservation released");
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Finalizes an active reservation: permanently decrements total stock
    /// by its quantity. The only operation that touches real stock.
    ///
    /// Re-completing a completed reservation is a no-op success; completing
    /// a released or expired one fails with `AlreadyFinalized`. A
    /// reservation past its deadline but not yet swept is still honored —
    /// the sweep cadence defines the tolerance window — unless its stock
    /// was already claimed again, in which case the ledger rejects the
    /// decrement.
    #[tracing::instrument(skip(self))]
    pub async fn complete(&self, id: ReservationId) -> Result<()> {
        let item = self.item_of(id).await?;
        let lock = self.key_lock(&item).await;
        let _guard = lock.lock().await;

        match self.status_of(id).await? {
            ReservationStatus::Active => {
                self.ledger.decrement_total(&item, id).await?;
                self.set_status(id, ReservationStatus::Completed).await;
                metrics::counter!("reservations_completed_total").increment(1);
                tracing::info!(reservation_id = %id, "reservation completed");
                Ok(())
            }
            ReservationStatus::Completed => Ok(()),
            status => Err(EngineError::AlreadyFinalized { id, status }),
        }
    }

    /// Expires a timed-out reservation. Sweeper-internal; identical to
    /// `release` except the record is marked `Expired` to distinguish a
    /// timeout from an explicit cancel in the audit trail.
    ///
    /// Unconditionally idempotent: unknown or already-terminal records are
    /// a no-op. Returns true if this call performed the transition.
    #[tracing::instrument(skip(self))]
    pub async fn expire(&self, id: ReservationId) -> Result<bool> {
        let item = match self.item_of(id).await {
            Ok(item) => item,
            Err(EngineError::NotFound(_)) => return Ok(false),
            Err(e) => return Err(e),
        };
        let lock = self.key_lock(&item).await;
        let _guard = lock.lock().await;

        match self.status_of(id).await? {
            ReservationStatus::Active => {
                self.ledger.release_hold(&item, id).await?;
                self.set_status(id, ReservationStatus::Expired).await;
                metrics::counter!("reservations_expired_total").increment(1);
                tracing::info!(reservation_id = %id, "reservation expired");
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Loads a reservation by ID.
    pub async fn get(&self, id: ReservationId) -> Option<Reservation> {
        self.records.read().await.get(&id).cloned()
    }

    /// Returns the available stock for an item.
    pub async fn available_stock(&self, item: &ItemKey) -> Result<u32> {
        Ok(self.ledger.available_stock(item).await?)
    }

    /// Returns the total stock for an item.
    pub async fn total_stock(&self, item: &ItemKey) -> Result<u32> {
        Ok(self.ledger.total_stock(item).await?)
    }

    /// Returns the IDs of active reservations whose deadline has passed.
    pub async fn expired_candidates(&self, now: DateTime<Utc>) -> Vec<ReservationId> {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.is_active() && r.is_expired(now))
            .map(|r| r.id)
            .collect()
    }

    async fn key_lock(&self, item: &ItemKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(item.clone()).or_default().clone()
    }

    async fn item_of(&self, id: ReservationId) -> Result<ItemKey> {
        self.records
            .read()
            .await
            .get(&id)
            .map(|r| r.item.clone())
            .ok_or(EngineError::NotFound(id))
    }

    async fn status_of(&self, id: ReservationId) -> Result<ReservationStatus> {
        self.records
            .read()
            .await
            .get(&id)
            .map(|r| r.status)
            .ok_or(EngineError::NotFound(id))
    }

    async fn set_status(&self, id: ReservationId, status: ReservationStatus) {
        if let Some(record) = self.records.write().await.get_mut(&id) {
            record.status = status;
        }
    }
}
