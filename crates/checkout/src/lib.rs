//! Batch coordination for multi-line cart reservations.
//!
//! A checkout cart reserves several (item, quantity) lines in one logical
//! request. Each line is independently atomic; the batch as a whole is not
//! wrapped in a cross-item transaction. When any line fails, every
//! reservation created in the same batch is released again (best-effort
//! compensation) and the caller receives one consolidated failure.

pub mod coordinator;
pub mod error;

pub use coordinator::{BatchCoordinator, BatchLine, BatchReservation, CompletionOutcome};
pub use error::{BatchRejection, CheckoutError, LineFailure, LineFailureReason};

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
