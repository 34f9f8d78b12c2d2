//! Shared identifier and key types for the reservation ledger.

pub mod types;

pub use types::{Holder, ItemKey, ProductId, ReservationId, SessionToken, UserId, VariantId};
