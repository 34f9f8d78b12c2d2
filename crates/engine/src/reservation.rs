//! Reservation entity and status state machine.

use chrono::{DateTime, Utc};
use common::{Holder, ItemKey, ReservationId};
use serde::{Deserialize, Serialize};

/// The status of a reservation in its lifecycle.
///
/// State transitions:
/// ```text
/// Active ──┬──► Completed
///          ├──► Released
///          └──► Expired
/// ```
///
/// `Active` is the only non-terminal state; no transition leaves a
/// terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReservationStatus {
    /// The hold is live and counts against available stock.
    #[default]
    Active,

    /// The sale was finalized and total stock decremented (terminal).
    Completed,

    /// The hold was explicitly cancelled (terminal).
    Released,

    /// The hold timed out and was swept (terminal).
    Expired,
}

impl ReservationStatus {
    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Active)
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Active => "Active",
            ReservationStatus::Completed => "Completed",
            ReservationStatus::Released => "Released",
            ReservationStatus::Expired => "Expired",
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A time-bounded soft hold on stock, not yet a real decrement.
///
/// Created by a successful `reserve`; mutated only through the four engine
/// operations; never deleted (terminal records remain as an audit trail).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Unique reservation identifier.
    pub id: ReservationId,
    /// The stock item the hold is against.
    pub item: ItemKey,
    /// The user or guest session owning the hold.
    pub holder: Holder,
    /// Quantity held.
    pub quantity: u32,
    /// Current lifecycle status.
    pub status: ReservationStatus,
    /// When the reservation was created.
    pub created_at: DateTime<Utc>,
    /// When the hold stops counting against available stock.
    pub expires_at: DateTime<Utc>,
}

impl Reservation {
    /// Creates a new active reservation expiring `ttl` after `now`.
    pub fn new(
        item: ItemKey,
        holder: Holder,
        quantity: u32,
        now: DateTime<Utc>,
        ttl: chrono::Duration,
    ) -> Self {
        Self {
            id: ReservationId::new(),
            item,
            holder,
            quantity,
            status: ReservationStatus::Active,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    /// Returns true if the reservation is still active.
    pub fn is_active(&self) -> bool {
        self.status == ReservationStatus::Active
    }

    /// Returns true if the deadline has passed at `now`, regardless of
    /// status.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
