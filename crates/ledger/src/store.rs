//! Stock ledger trait and hold type.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ItemKey, ReservationId};
use serde::{Deserialize, Serialize};

use crate::Result;

/// A quantity held against an item by an active reservation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hold {
    /// The reservation that owns this hold.
    pub reservation_id: ReservationId,
    /// Quantity held.
    pub quantity: u32,
    /// When the hold stops counting against available stock.
    pub expires_at: DateTime<Utc>,
}

impl Hold {
    /// Creates a new hold.
    pub fn new(reservation_id: ReservationId, quantity: u32, expires_at: DateTime<Utc>) -> Self {
        Self {
            reservation_id,
            quantity,
            expires_at,
        }
    }

    /// Returns true if the hold has passed its deadline at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Authoritative store of per-item stock totals and active holds.
///
/// Reads reflect all mutations committed at call time. `available_stock`
/// lazily treats holds past their deadline as already expired, so a query
/// never waits on the periodic sweep to see freed stock.
#[async_trait]
pub trait StockLedger: Send + Sync {
    /// Caches or refreshes the catalog-owned total for an item.
    ///
    /// The external catalog is the source of truth for totals; this is the
    /// only way an item becomes known to the ledger.
    async fn sync_item(&self, item: ItemKey, total_stock: u32) -> Result<()>;

    /// Returns the total stock for an item.
    async fn total_stock(&self, item: &ItemKey) -> Result<u32>;

    /// Returns total stock minus the sum of active, unexpired holds.
    ///
    /// Never negative: over-held items report zero.
    async fn available_stock(&self, item: &ItemKey) -> Result<u32>;

    /// Atomically checks availability and registers a hold.
    ///
    /// Fails with `InsufficientStock` if the hold would exceed available
    /// stock at call time.
    async fn register_hold(&self, item: &ItemKey, hold: Hold) -> Result<()>;

    /// Removes a hold, returning its quantity to the available pool.
    ///
    /// Removing a hold that no longer exists is a no-op.
    async fn release_hold(&self, item: &ItemKey, reservation_id: ReservationId) -> Result<()>;

    /// Removes a hold and permanently decrements the item total by its
    /// quantity. The only write to total stock; invoked solely on
    /// reservation completion.
    ///
    /// Fails with `InsufficientStock` if the decrement would drive the
    /// total below the sum of the remaining active, unexpired holds; that
    /// outcome means an engine invariant was broken upstream.
    async fn decrement_total(&self, item: &ItemKey, reservation_id: ReservationId) -> Result<u32>;
}
