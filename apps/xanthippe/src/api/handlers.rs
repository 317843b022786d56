//! # API Endpoint Handlers
//!
//! Store access goes through `spawn_blocking`: redb transactions are
//! synchronous and may wait on the exploration loop's writes.

use super::{
    AppState,
    types::{ForgetRequest, ForgetResponse, HealthResponse, StatusResponse},
};
use axum::{
    Json,
    body::Body,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use xanthippe_core::{ButtonSequence, ButtonTable, XanthippeError};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Coverage store counts.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let store = Arc::clone(&state.store);
    match tokio::task::spawn_blocking(move || store.stats()).await {
        Ok(Ok(stats)) => (StatusCode::OK, Json(StatusResponse::success(stats))),
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusResponse::error(format!("Status failed: {}", e))),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StatusResponse::error(format!("Status task failed: {}", e))),
        ),
    }
}

// =============================================================================
// INTAKE HANDLER
// =============================================================================

/// Split a comma-separated payload into explorable sequences.
///
/// Empty items are skipped. Any unbound, reset or non-symbol character
/// rejects the whole payload.
pub fn parse_intake(
    text: &str,
    buttons: &ButtonTable,
) -> Result<Vec<ButtonSequence>, XanthippeError> {
    let mut sequences = Vec::new();
    for item in text.split(',').filter(|item| !item.is_empty()) {
        let sequence = ButtonSequence::new(item)?;
        buttons.check(&sequence)?;
        sequences.push(sequence);
    }
    Ok(sequences)
}

/// Mark every prefix of every posted sequence as requested.
///
/// The response body is always empty. Oversized or invalid payloads are
/// dropped with a warning and still answered with 200.
pub async fn intake_handler(State(state): State<AppState>, body: Body) -> StatusCode {
    let Ok(bytes) = axum::body::to_bytes(body, state.max_body).await else {
        tracing::warn!(
            event = "intake_rejected",
            reason = "oversized",
            limit = state.max_body,
            "Intake payload too large"
        );
        return StatusCode::OK;
    };

    let parsed = std::str::from_utf8(&bytes)
        .map_err(|e| XanthippeError::DeserializationError(e.to_string()))
        .and_then(|text| parse_intake(text, &state.buttons));
    let sequences = match parsed {
        Ok(sequences) if sequences.is_empty() => return StatusCode::OK,
        Ok(sequences) => sequences,
        Err(e) => {
            tracing::warn!(
                event = "intake_rejected",
                reason = %e,
                "Received a post with invalid data"
            );
            return StatusCode::OK;
        }
    };

    tracing::info!(sequences = sequences.len(), "Received a request to check sequences");
    let store = Arc::clone(&state.store);
    match tokio::task::spawn_blocking(move || store.request_prefixes(&sequences)).await {
        Ok(Ok(changed)) => {
            tracing::info!(changed, "updated {} entries of the store", changed);
            StatusCode::OK
        }
        Ok(Err(e)) => {
            tracing::error!(error = %e, "Intake write failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Err(e) => {
            tracing::error!(error = %e, "Intake task failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// =============================================================================
// FORGET HANDLER
// =============================================================================

/// Clear (or with `dry_run`, count) every row under a prefix.
///
/// Lets a CLI in another process edit the store while this process holds
/// the file lock.
pub async fn forget_handler(
    State(state): State<AppState>,
    Json(request): Json<ForgetRequest>,
) -> impl IntoResponse {
    let prefix = match ButtonSequence::new(request.prefix.as_str())
        .and_then(|p| state.buttons.check(&p).map(|()| p))
    {
        Ok(prefix) if !prefix.is_empty() => prefix,
        Ok(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ForgetResponse::error(request.prefix, "Empty prefix")),
            );
        }
        Err(e) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ForgetResponse::error(request.prefix, e.to_string())),
            );
        }
    };

    let store = Arc::clone(&state.store);
    let dry_run = request.dry_run;
    let task = tokio::task::spawn_blocking(move || {
        if dry_run {
            store.count_prefix(&prefix)
        } else {
            store.forget(&prefix)
        }
    });
    match task.await {
        Ok(Ok(affected)) => {
            if !dry_run {
                tracing::info!(prefix = %request.prefix, cleared = affected, "Forgot screens");
            }
            (
                StatusCode::OK,
                Json(ForgetResponse::success(request.prefix, affected)),
            )
        }
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ForgetResponse::error(
                request.prefix,
                format!("Forget failed: {}", e),
            )),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ForgetResponse::error(
                request.prefix,
                format!("Forget task failed: {}", e),
            )),
        ),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ButtonTable {
        ButtonTable::reference().expect("table")
    }

    #[test]
    fn parse_intake_splits_and_skips_empty_items() {
        let sequences = parse_intake("TCbi,,jj,", &table()).expect("parse");
        let keys: Vec<&str> = sequences.iter().map(ButtonSequence::as_str).collect();
        assert_eq!(keys, ["TCbi", "jj"]);
    }

    #[test]
    fn parse_intake_rejects_reset_and_unknown_symbols() {
        assert!(parse_intake("T3", &table()).is_err());
        assert!(parse_intake("TZ", &table()).is_err());
        assert!(parse_intake("T C", &table()).is_err());
    }
}
