//! Reservation engine for the inventory reservation ledger.
//!
//! This crate provides the reservation state machine and its four atomic
//! operations:
//! 1. `reserve` — place a time-bounded soft hold on stock
//! 2. `release` — cancel a hold, returning stock to the pool
//! 3. `complete` — convert a hold into a permanent stock decrement
//! 4. `expire` — sweeper-internal release of a timed-out hold
//!
//! All mutations touching the same item are serialized; different items
//! proceed fully in parallel. The expiry sweeper lives here too.

pub mod engine;
pub mod error;
pub mod reservation;
pub mod sweeper;

pub use engine::{DEFAULT_TTL, ReservationEngine};
pub use error::EngineError;
pub use reservation::{Reservation, ReservationStatus};
pub use sweeper::ExpirySweeper;

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;
