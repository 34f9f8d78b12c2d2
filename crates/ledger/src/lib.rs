//! Stock ledger for the reservation system.
//!
//! The ledger owns the authoritative per-item stock totals (cached from the
//! external catalog) and the set of active holds against each item.
//! Available stock is total stock minus the sum of active, unexpired holds,
//! and is never reported as negative.

pub mod error;
pub mod memory;
pub mod store;

pub use error::LedgerError;
pub use memory::InMemoryStockLedger;
pub use store::{Hold, StockLedger};

/// Convenience type alias for ledger results.
pub type Result<T> = std::result::Result<T, LedgerError>;
