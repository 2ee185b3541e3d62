//! Order job endpoints: enqueue, query, manual retry.

use axum::Json;
use axum::extract::{Path, State};
use uuid::Uuid;

use super::{ApiError, bridge_error};
use crate::AppState;
use crate::models::order::{EnqueueOrderRequest, EnqueueOrderResponse, OrderJobResponse};
use crate::services::storage::OrderJob;

fn to_response(job: OrderJob) -> OrderJobResponse {
    OrderJobResponse {
        job_id: job.job_id,
        user_id: job.user_id,
        status: job.status.as_str().to_string(),
        attempts: job.attempts,
        erp_order_id: job.erp_order_id,
        error: job.error,
        retry_of: job.retry_of,
        created_at: job.created_at,
        started_at: job.started_at,
        finished_at: job.finished_at,
    }
}

pub async fn enqueue_order(
    State(state): State<AppState>,
    Json(request): Json<EnqueueOrderRequest>,
) -> Result<Json<EnqueueOrderResponse>, ApiError> {
    let job_id = state
        .order_queue
        .enqueue(request.user_id, request.order)
        .await
        .map_err(bridge_error)?;

    tracing::info!("Order job {} enqueued", job_id);
    Ok(Json(EnqueueOrderResponse { job_id }))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<OrderJobResponse>, ApiError> {
    let job = state.order_queue.status(job_id).await.map_err(bridge_error)?;
    Ok(Json(to_response(job)))
}

pub async fn retry_order(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> Result<Json<EnqueueOrderResponse>, ApiError> {
    let new_job_id = state.order_queue.retry(job_id).await.map_err(bridge_error)?;
    Ok(Json(EnqueueOrderResponse { job_id: new_job_id }))
}
