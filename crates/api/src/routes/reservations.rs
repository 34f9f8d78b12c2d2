//! Reservation endpoints: batch reserve, batch complete, audit read, sweep.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use checkout::{BatchCoordinator, BatchLine, CompletionOutcome};
use chrono::Duration;
use common::{Holder, ItemKey, ReservationId, SessionToken, UserId};
use engine::{ExpirySweeper, ReservationEngine};
use ledger::StockLedger;
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<L: StockLedger> {
    pub engine: ReservationEngine<L>,
    pub coordinator: BatchCoordinator<L>,
    pub sweeper: ExpirySweeper<L>,
    pub ledger: L,
    pub config: Config,
}

// -- Request types --

#[derive(Deserialize)]
pub struct ReserveRequest {
    pub lines: Vec<LineRequest>,
    pub session_token: Option<String>,
    pub ttl_seconds: Option<i64>,
}

#[derive(Deserialize)]
pub struct LineRequest {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: u32,
}

#[derive(Deserialize)]
pub struct CompleteRequest {
    pub reservation_ids: Vec<uuid::Uuid>,
}

// -- Response types --

#[derive(Serialize)]
pub struct ReserveResponse {
    pub reservations: Vec<ReservedLineResponse>,
    pub expires_at: String,
}

#[derive(Serialize)]
pub struct ReservedLineResponse {
    pub reservation_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub quantity: u32,
    pub expires_at: String,
}

#[derive(Serialize)]
pub struct CompleteResponse {
    pub results: Vec<CompletionOutcome>,
}

#[derive(Serialize)]
pub struct ReservationResponse {
    pub reservation_id: String,
    pub product_id: String,
    pub variant_id: Option<String>,
    pub holder: Holder,
    pub quantity: u32,
    pub status: String,
    pub created_at: String,
    pub expires_at: String,
}

#[derive(Serialize)]
pub struct CleanupResponse {
    pub expired: usize,
}

// -- Handlers --

/// POST /reservations — reserve every line of a cart, or nothing.
#[tracing::instrument(skip(state, headers, req))]
pub async fn reserve<L: StockLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    headers: HeaderMap,
    Json(req): Json<ReserveRequest>,
) -> Result<(StatusCode, Json<ReserveResponse>), ApiError> {
    let holder = resolve_holder(&headers, req.session_token.as_deref())?;

    if req.lines.is_empty() {
        return Err(ApiError::BadRequest("lines must not be empty".to_string()));
    }
    if req.lines.iter().any(|l| l.quantity == 0) {
        return Err(ApiError::BadRequest(
            "quantity must be positive".to_string(),
        ));
    }

    let ttl_seconds = req
        .ttl_seconds
        .unwrap_or(state.config.reservation_ttl_secs);
    if ttl_seconds <= 0 {
        return Err(ApiError::BadRequest(
            "ttl_seconds must be positive".to_string(),
        ));
    }

    let lines: Vec<BatchLine> = req
        .lines
        .iter()
        .map(|l| BatchLine::new(item_key(&l.product_id, l.variant_id.as_deref()), l.quantity))
        .collect();

    let batch = state
        .coordinator
        .reserve_batch(holder, lines, Duration::seconds(ttl_seconds))
        .await?;

    let response = ReserveResponse {
        reservations: batch
            .reservations
            .iter()
            .map(|r| ReservedLineResponse {
                reservation_id: r.id.to_string(),
                product_id: r.item.product_id.to_string(),
                variant_id: r.item.variant_id.as_ref().map(|v| v.to_string()),
                quantity: r.quantity,
                expires_at: r.expires_at.to_rfc3339(),
            })
            .collect(),
        expires_at: batch.expires_at.to_rfc3339(),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// POST /reservations/complete — finalize a set of reservations.
///
/// Returns 200 when every id finalized, 409 with per-id results otherwise.
#[tracing::instrument(skip(state, req))]
pub async fn complete<L: StockLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Json(req): Json<CompleteRequest>,
) -> Result<(StatusCode, Json<CompleteResponse>), ApiError> {
    if req.reservation_ids.is_empty() {
        return Err(ApiError::BadRequest(
            "reservation_ids must not be empty".to_string(),
        ));
    }

    let ids: Vec<ReservationId> = req
        .reservation_ids
        .iter()
        .map(|u| ReservationId::from_uuid(*u))
        .collect();

    let results = state.coordinator.complete_batch(ids).await;
    let status = if results.iter().all(|r| r.success) {
        StatusCode::OK
    } else {
        StatusCode::CONFLICT
    };

    Ok((status, Json(CompleteResponse { results })))
}

/// GET /reservations/{id} — audit read of a single reservation.
#[tracing::instrument(skip(state))]
pub async fn get<L: StockLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Path(id): Path<String>,
) -> Result<Json<ReservationResponse>, ApiError> {
    let uuid = uuid::Uuid::parse_str(&id)
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))?;

    let reservation = state
        .engine
        .get(ReservationId::from_uuid(uuid))
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Reservation {id} not found")))?;

    Ok(Json(ReservationResponse {
        reservation_id: reservation.id.to_string(),
        product_id: reservation.item.product_id.to_string(),
        variant_id: reservation.item.variant_id.as_ref().map(|v| v.to_string()),
        holder: reservation.holder,
        quantity: reservation.quantity,
        status: reservation.status.to_string(),
        created_at: reservation.created_at.to_rfc3339(),
        expires_at: reservation.expires_at.to_rfc3339(),
    }))
}

/// POST /cleanup — run one expiry sweep.
#[tracing::instrument(skip(state))]
pub async fn cleanup<L: StockLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let expired = state.sweeper.sweep().await;
    Ok(Json(CleanupResponse { expired }))
}

/// Resolves the reservation holder per the identity contract: an
/// authenticated identity wins and any client-supplied session token is
/// ignored; otherwise the session token is required to scope the
/// reservation to a guest.
fn resolve_holder(headers: &HeaderMap, session_token: Option<&str>) -> Result<Holder, ApiError> {
    if let Some(value) = headers.get("x-user-id") {
        let raw = value
            .to_str()
            .map_err(|_| ApiError::BadRequest("Invalid x-user-id header".to_string()))?;
        let uuid = uuid::Uuid::parse_str(raw)
            .map_err(|e| ApiError::BadRequest(format!("Invalid x-user-id header: {e}")))?;
        return Ok(Holder::User(UserId::from_uuid(uuid)));
    }

    match session_token {
        Some(token) if !token.is_empty() => Ok(Holder::Session(SessionToken::new(token))),
        _ => Err(ApiError::BadRequest(
            "session_token required for anonymous reservations".to_string(),
        )),
    }
}

pub(crate) fn item_key(product_id: &str, variant_id: Option<&str>) -> ItemKey {
    match variant_id {
        Some(variant) => ItemKey::variant(product_id, variant),
        None => ItemKey::product(product_id),
    }
}
