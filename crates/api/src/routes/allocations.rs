//! Allocation command endpoints and the allocations read model query.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::NaiveDate;
use common::OrderId;
use domain::{Allocate, ChangeBatchQuantity, CreateBatch};
use persistence::InMemoryUnitOfWork;
use projections::{AllocationRow, AllocationsView};
use serde::{Deserialize, Serialize};
use service_layer::{CommandOutcome, MessageBus};
use tokio::sync::Mutex;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
///
/// The bus handles one message at a time, so requests take turns on it.
/// Queries go to the read model and never wait for the bus.
pub struct AppState {
    pub bus: Mutex<MessageBus<InMemoryUnitOfWork>>,
    pub allocations: AllocationsView,
}

// -- Request types --

#[derive(Deserialize)]
pub struct AddBatchRequest {
    #[serde(rename = "ref")]
    pub reference: String,
    pub sku: String,
    pub qty: u32,
    pub eta: Option<NaiveDate>,
}

#[derive(Deserialize)]
pub struct AllocateRequest {
    pub orderid: String,
    pub sku: String,
    pub qty: u32,
}

#[derive(Deserialize)]
pub struct ChangeBatchQuantityRequest {
    #[serde(rename = "ref")]
    pub reference: String,
    pub qty: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct AllocateResponse {
    /// `null` when the product is out of stock.
    pub batchref: Option<String>,
}

// -- Handlers --

/// POST /add_batch — register a new batch of stock.
#[tracing::instrument(skip(state, req), fields(reference = %req.reference, sku = %req.sku))]
pub async fn add_batch(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AddBatchRequest>,
) -> Result<(StatusCode, &'static str), ApiError> {
    let cmd = CreateBatch::new(req.reference, req.sku, req.qty, req.eta);
    state.bus.lock().await.handle(cmd).await?;
    Ok((StatusCode::CREATED, "OK"))
}

/// POST /allocate — allocate an order line, returning the chosen batch.
#[tracing::instrument(skip(state, req), fields(orderid = %req.orderid, sku = %req.sku))]
pub async fn allocate(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AllocateRequest>,
) -> Result<(StatusCode, Json<AllocateResponse>), ApiError> {
    if req.qty == 0 {
        return Err(ApiError::BadRequest("qty must be positive".to_string()));
    }
    let cmd = Allocate::new(req.orderid, req.sku, req.qty);
    let results = state.bus.lock().await.handle(cmd).await?;

    let batchref = results
        .first()
        .and_then(CommandOutcome::batch_ref)
        .map(ToString::to_string);

    Ok((StatusCode::CREATED, Json(AllocateResponse { batchref })))
}

/// POST /change_batch_quantity — change a batch's purchased quantity.
#[tracing::instrument(skip(state, req), fields(reference = %req.reference, qty = req.qty))]
pub async fn change_batch_quantity(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChangeBatchQuantityRequest>,
) -> Result<(StatusCode, &'static str), ApiError> {
    let cmd = ChangeBatchQuantity::new(req.reference, req.qty);
    state.bus.lock().await.handle(cmd).await?;
    Ok((StatusCode::OK, "OK"))
}

/// GET /allocations/{orderid} — where an order's lines were allocated.
#[tracing::instrument(skip(state))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Path(orderid): Path<String>,
) -> Result<Json<Vec<AllocationRow>>, ApiError> {
    let rows = state
        .allocations
        .allocations(&OrderId::new(orderid.as_str()))
        .await;

    if rows.is_empty() {
        return Err(ApiError::NotFound(format!(
            "No allocations for order {orderid}"
        )));
    }
    Ok(Json(rows))
}
