//! Browser pool introspection.

use axum::Json;
use axum::extract::State;

use crate::AppState;
use crate::models::pool::PoolStats;

pub async fn pool_stats(State(state): State<AppState>) -> Json<PoolStats> {
    Json(state.pool.stats().await)
}
