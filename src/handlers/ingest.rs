use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde::Serialize;
use std::sync::Arc;

use crate::collector::{Collector, LifecycleState};
use crate::error::AppError;
use crate::event::parse_ingest_body;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestResponse {
    pub ok: bool,
    pub accepted: usize,
    pub dropped: u64,
    pub queue_length: usize,
}

/// POST /ingest
///
/// Accepts one event object or an array of them. Returns as soon as the
/// events are queued; persistence happens in the background.
pub async fn ingest(
    State(collector): State<Arc<Collector>>,
    body: Bytes,
) -> Result<impl IntoResponse, AppError> {
    // Reject early so a shutting-down collector does not pay for parsing
    let state = collector.lifecycle_state();
    if state != LifecycleState::Running {
        return Err(AppError::ShuttingDown(state));
    }

    let events = parse_ingest_body(&body)?;
    let receipt = collector.enqueue(events).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(IngestResponse {
            ok: true,
            accepted: receipt.accepted,
            dropped: receipt.dropped,
            queue_length: receipt.queue_length,
        }),
    ))
}
