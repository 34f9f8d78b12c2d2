//! Stock endpoints: availability reads and catalog total sync.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use ledger::StockLedger;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::reservations::{AppState, item_key};

#[derive(Deserialize)]
pub struct StockQuery {
    pub product_id: Option<String>,
    pub variant_id: Option<String>,
}

#[derive(Deserialize)]
pub struct SyncStockRequest {
    pub product_id: String,
    pub variant_id: Option<String>,
    pub total_stock: u32,
}

#[derive(Serialize)]
pub struct AvailabilityResponse {
    pub available_quantity: u32,
}

/// GET /stock?product_id=&variant_id= — available stock for an item.
///
/// Expired-but-unswept reservations are already treated as expired in the
/// reported value.
#[tracing::instrument(skip(state, query))]
pub async fn available<L: StockLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Query(query): Query<StockQuery>,
) -> Result<Json<AvailabilityResponse>, ApiError> {
    let product_id = query
        .product_id
        .as_deref()
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::BadRequest("product_id is required".to_string()))?;

    let item = item_key(product_id, query.variant_id.as_deref());
    let available_quantity = state.engine.available_stock(&item).await?;

    Ok(Json(AvailabilityResponse { available_quantity }))
}

/// PUT /stock — cache or refresh an item's catalog-owned total.
#[tracing::instrument(skip(state, req))]
pub async fn sync<L: StockLedger + Clone + 'static>(
    State(state): State<Arc<AppState<L>>>,
    Json(req): Json<SyncStockRequest>,
) -> Result<StatusCode, ApiError> {
    if req.product_id.is_empty() {
        return Err(ApiError::BadRequest("product_id is required".to_string()));
    }

    let item = item_key(&req.product_id, req.variant_id.as_deref());
    state.ledger.sync_item(item, req.total_stock).await?;

    Ok(StatusCode::NO_CONTENT)
}
