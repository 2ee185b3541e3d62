//! Sync management endpoints: trigger a domain, inspect orchestrator state,
//! force-reset checkpoints and drive the fast path.

use axum::Json;
use axum::extract::{Path, State};

use super::{ApiError, bridge_error, unknown_domain};
use crate::AppState;
use crate::models::common::AckResponse;
use crate::services::storage::CheckpointStore;
use crate::models::domain::Domain;
use crate::models::sync::{
    CheckpointView, FastPathRequest, FastPathResponse, SyncStatusResponse, TriggerSyncRequest,
};

pub async fn trigger_sync(
    State(state): State<AppState>,
    Path(domain): Path<String>,
    body: Option<Json<TriggerSyncRequest>>,
) -> Result<Json<AckResponse>, ApiError> {
    let domain = Domain::parse(&domain).ok_or_else(|| unknown_domain(&domain))?;
    let request = body.map(|Json(r)| r).unwrap_or_default();

    tracing::info!("[{}] Sync requested via API", domain);
    state
        .orchestrator
        .request_sync(domain, request.priority, request.user_id);

    Ok(Json(AckResponse::accepted()))
}

pub async fn sync_status(
    State(state): State<AppState>,
) -> Result<Json<SyncStatusResponse>, ApiError> {
    let orchestrator = state.orchestrator.status();

    let mut checkpoints = Vec::with_capacity(Domain::ALL.len());
    for domain in Domain::ALL {
        let checkpoint = state
            .checkpoints
            .get(domain)
            .await
            .map_err(bridge_error)?;
        checkpoints.push(CheckpointView {
            domain,
            state: checkpoint.state.as_str().to_string(),
            last_page: checkpoint.last_page,
            total_pages: checkpoint.total_pages,
            items_synced: checkpoint.items_synced,
            last_success_at: checkpoint.last_success_at,
            last_failure_at: checkpoint.last_failure_at,
            last_error: checkpoint.last_error,
        });
    }

    Ok(Json(SyncStatusResponse {
        orchestrator,
        checkpoints,
    }))
}

pub async fn reset_checkpoint(
    State(state): State<AppState>,
    Path(domain): Path<String>,
) -> Result<Json<AckResponse>, ApiError> {
    let domain = Domain::parse(&domain).ok_or_else(|| unknown_domain(&domain))?;

    state.checkpoints.reset(domain).await.map_err(bridge_error)?;
    Ok(Json(AckResponse::accepted()))
}

pub async fn enter_fast_path(
    State(state): State<AppState>,
    Json(request): Json<FastPathRequest>,
) -> Result<Json<FastPathResponse>, ApiError> {
    let refcount = state
        .orchestrator
        .smart_fast_path(request.domain)
        .map_err(bridge_error)?;
    Ok(Json(FastPathResponse {
        active: true,
        refcount,
    }))
}

pub async fn exit_fast_path(
    State(state): State<AppState>,
) -> Result<Json<FastPathResponse>, ApiError> {
    let refcount = state.orchestrator.end_fast_path();
    Ok(Json(FastPathResponse {
        active: refcount > 0,
        refcount,
    }))
}
