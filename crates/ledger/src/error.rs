//! Ledger error types.

use common::{ItemKey, ReservationId};
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The item is not known to the ledger.
    #[error("Item not found: {0}")]
    ItemNotFound(ItemKey),

    /// Not enough stock to satisfy the request.
    ///
    /// When returned from a total decrement this signals a broken
    /// engine invariant rather than ordinary user error.
    #[error("Insufficient stock for {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: ItemKey,
        requested: u32,
        available: u32,
    },

    /// No hold registered for the reservation on this item.
    #[error("No hold for reservation {reservation_id} on item {item}")]
    HoldNotFound {
        item: ItemKey,
        reservation_id: ReservationId,
    },

    /// The ledger backend failed.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),
}
