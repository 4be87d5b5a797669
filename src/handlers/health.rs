use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;

use crate::collector::Collector;

/// GET /health
///
/// Always 200; degradation (drops, flush failures) is reported in the body.
pub async fn health_check(State(collector): State<Arc<Collector>>) -> impl IntoResponse {
    (StatusCode::OK, Json(collector.health().await))
}
