//! Engine error types.

use common::{ItemKey, ReservationId};
use ledger::LedgerError;
use thiserror::Error;

use crate::reservation::ReservationStatus;

/// Errors that can occur during reservation operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Reservation quantity must be positive.
    #[error("Reservation quantity must be positive")]
    InvalidQuantity,

    /// Not enough available stock to satisfy the reservation.
    #[error("Insufficient stock for {item}: requested {requested}, available {available}")]
    InsufficientStock {
        item: ItemKey,
        requested: u32,
        available: u32,
    },

    /// No reservation with the given ID.
    #[error("Reservation not found: {0}")]
    NotFound(ReservationId),

    /// The reservation already reached a terminal state.
    #[error("Reservation {id} already finalized as {status}")]
    AlreadyFinalized {
        id: ReservationId,
        status: ReservationStatus,
    },

    /// Ledger error.
    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),
}

impl EngineError {
    /// Returns true for expected business-rule outcomes, as opposed to
    /// infrastructure failures.
    pub fn is_business_failure(&self) -> bool {
        matches!(
            self,
            EngineError::InvalidQuantity
                | EngineError::InsufficientStock { .. }
                | EngineError::NotFound(_)
                | EngineError::AlreadyFinalized { .. }
                | EngineError::Ledger(LedgerError::ItemNotFound(_))
        )
    }
}
