//! HTTP handler for Adyen notifications.

use axum::{
    body::Bytes,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
};
use tracing::instrument;

use crate::AppState;

/// Body Adyen expects before it stops retrying a notification
pub const ACCEPTED: &str = "[accepted]";

/// Receive a notification batch.
///
/// The batch is acknowledged whatever happens to its items; rejected or failed items are
/// logged by the processor.
#[instrument(skip_all, fields(bytes = body.len()))]
pub async fn adyen_webhook(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    state.processor.process(&body).await;
    (StatusCode::OK, [(header::CONTENT_TYPE, "text/plain")], ACCEPTED)
}
