//! Checkout error types.

use common::ItemKey;
use engine::EngineError;
use serde::Serialize;
use thiserror::Error;

/// Why a single batch line could not be reserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum LineFailureReason {
    /// Not enough available stock for the requested quantity.
    InsufficientStock { requested: u32, available: u32 },
    /// The item is not known to the ledger.
    ItemNotFound,
    /// The requested quantity was zero.
    InvalidQuantity,
    /// The line was reserved but rolled back because a sibling line failed.
    RolledBack,
}

impl std::fmt::Display for LineFailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineFailureReason::InsufficientStock {
                requested,
                available,
            } => write!(f, "insufficient stock (requested {requested}, available {available})"),
            LineFailureReason::ItemNotFound => write!(f, "item not found"),
            LineFailureReason::InvalidQuantity => write!(f, "quantity must be positive"),
            LineFailureReason::RolledBack => write!(f, "rolled back after a sibling line failed"),
        }
    }
}

/// A single unavailable line in a rejected batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineFailure {
    /// The item the line targeted.
    pub item: ItemKey,
    /// Quantity requested for the line.
    pub quantity: u32,
    /// Why the line is unavailable.
    pub reason: LineFailureReason,
}

/// Consolidated per-line failure report for a rejected batch.
///
/// Includes lines that failed outright and lines that succeeded but were
/// rolled back; the caller sees the whole cart's availability picture at
/// once and never a half-applied batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchRejection {
    /// The unavailable lines.
    pub failures: Vec<LineFailure>,
}

impl std::fmt::Display for BatchRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} line(s) unavailable", self.failures.len())
    }
}

/// Errors that can occur during batch coordination.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The batch contained no lines.
    #[error("Batch contains no lines")]
    EmptyBatch,

    /// One or more lines were unavailable; everything created was rolled
    /// back.
    #[error("Batch rejected: {0}")]
    Rejected(BatchRejection),

    /// An engine or ledger infrastructure failure.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}
