//! Batch coordinator: saga-style multi-line reservation with compensation.

use chrono::{DateTime, Duration, Utc};
use common::{Holder, ItemKey, ReservationId};
use engine::{EngineError, Reservation, ReservationEngine};
use ledger::{LedgerError, StockLedger};
use serde::Serialize;

use crate::error::{BatchRejection, CheckoutError, LineFailure, LineFailureReason};
use crate::Result;

/// One line of a batch reservation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchLine {
    /// The item to reserve.
    pub item: ItemKey,
    /// Quantity to reserve.
    pub quantity: u32,
}

impl BatchLine {
    /// Creates a new batch line.
    pub fn new(item: ItemKey, quantity: u32) -> Self {
        Self { item, quantity }
    }
}

/// A fully reserved batch.
#[derive(Debug, Clone)]
pub struct BatchReservation {
    /// The reservations, one per line in request order.
    pub reservations: Vec<Reservation>,
    /// The shared deadline: the earliest of the individual expirations.
    pub expires_at: DateTime<Utc>,
}

/// Per-reservation result of a batch completion.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    /// The reservation this outcome is for.
    pub reservation_id: ReservationId,
    /// Whether the reservation was finalized.
    pub success: bool,
    /// Failure detail when `success` is false.
    pub message: Option<String>,
}

/// Orchestrates multi-line reservation requests against the engine.
///
/// Each line is independently atomic; there is no cross-item locking, so
/// a batch can never deadlock two items against each other. On partial
/// failure the coordinator compensates by releasing everything the batch
/// created, best-effort: a failing release is logged and the remaining
/// releases continue, and a compensation failure never masks the original
/// failure to the caller.
#[derive(Clone)]
pub struct BatchCoordinator<L: StockLedger> {
    engine: ReservationEngine<L>,
}

impl<L: StockLedger> BatchCoordinator<L> {
    /// Creates a new coordinator over the given engine.
    pub fn new(engine: ReservationEngine<L>) -> Self {
        Self { engine }
    }

    /// Reserves every line of a cart, or nothing.
    ///
    /// Lines are attempted sequentially, each under its own item lock.
    /// All lines are attempted even after a failure so the caller learns
    /// about every unavailable line in one response; anything created is
    /// then rolled back and reported as unavailable too.
    #[tracing::instrument(skip_all, fields(%holder, lines = lines.len()))]
    pub async fn reserve_batch(
        &self,
        holder: Holder,
        lines: Vec<BatchLine>,
        ttl: Duration,
    ) -> Result<BatchReservation> {
        if lines.is_empty() {
            return Err(CheckoutError::EmptyBatch);
        }

        metrics::counter!("batch_reservations_total").increment(1);
        let start = std::time::Instant::now();

        let mut created: Vec<Reservation> = Vec::with_capacity(lines.len());
        let mut failures: Vec<LineFailure> = Vec::new();
        let mut infrastructure: Option<EngineError> = None;

        for line in &lines {
            match self
                .engine
                .reserve(line.item.clone(), holder.clone(), line.quantity, ttl)
                .await
            {
                Ok(reservation) => created.push(reservation),
                Err(e) => match line_failure_reason(&e) {
                    Some(reason) => failures.push(LineFailure {
                        item: line.item.clone(),
                        quantity: line.quantity,
                        reason,
                    }),
                    None => {
                        // Infrastructure failure: stop trying further
                        // lines, roll back, and surface the error itself.
                        infrastructure = Some(e);
                        break;
                    }
                },
            }
        }

        if failures.is_empty() && infrastructure.is_none() {
            let expires_at = created
                .iter()
                .map(|r| r.expires_at)
                .min()
                .unwrap_or_else(Utc::now);
            metrics::histogram!("batch_reserve_duration_seconds")
                .record(start.elapsed().as_secs_f64());
            tracing::info!(reservations = created.len(), "batch reserved");
            return Ok(BatchReservation {
                reservations: created,
                expires_at,
            });
        }

        self.compensate(&created).await;
        metrics::counter!("batch_reservations_rejected_total").increment(1);

        if let Some(e) = infrastructure {
            return Err(CheckoutError::Engine(e));
        }

        // Rolled-back lines join the failure report as unavailable.
        for reservation in &created {
            failures.push(LineFailure {
                item: reservation.item.clone(),
                quantity: reservation.quantity,
                reason: LineFailureReason::RolledBack,
            });
        }
        tracing::info!(failures = failures.len(), "batch rejected");
        Err(CheckoutError::Rejected(BatchRejection { failures }))
    }

    /// Finalizes a set of reservations, reporting a per-id outcome.
    ///
    /// Completions are independent; a failing id does not roll back the
    /// others.
    #[tracing::instrument(skip(self, ids), fields(ids = ids.len()))]
    pub async fn complete_batch(&self, ids: Vec<ReservationId>) -> Vec<CompletionOutcome> {
        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            let outcome = match self.engine.complete(id).await {
                Ok(()) => CompletionOutcome {
                    reservation_id: id,
                    success: true,
                    message: None,
                },
                Err(e) => CompletionOutcome {
                    reservation_id: id,
                    success: false,
                    message: Some(e.to_string()),
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }

    /// Releases every reservation created by a failed batch.
    ///
    /// Best-effort by design: a failing release is logged and the loop
    /// continues, so a compensation failure can never mask the original
    /// cause reported to the caller.
    async fn compensate(&self, created: &[Reservation]) {
        for reservation in created {
            if let Err(e) = self.engine.release(reservation.id).await {
                tracing::warn!(
                    reservation_id = %reservation.id,
                    item = %reservation.item,
                    error = %e,
                    "compensating release failed, continuing"
                );
                metrics::counter!("batch_compensation_failures_total").increment(1);
            }
        }
    }
}

/// Maps an engine error to a reportable line failure, or None for
/// infrastructure errors that should abort the batch.
fn line_failure_reason(error: &EngineError) -> Option<LineFailureReason> {
    match error {
        EngineError::InsufficientStock {
            requested,
            available,
            ..
        } => Some(LineFailureReason::InsufficientStock {
            requested: *requested,
            available: *available,
        }),
        EngineError::InvalidQuantity => Some(LineFailureReason::InvalidQuantity),
        EngineError::Ledger(LedgerError::ItemNotFound(_)) => Some(LineFailureReason::ItemNotFound),
        _ => None,
    }
}
