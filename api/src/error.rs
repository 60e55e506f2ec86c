//! Maps [`CoordError`] onto the HTTP error envelope from spec.md §6/§7.

use airyra_core::error::CoordError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// Newtype so the orphan rule lets us implement [`IntoResponse`] for a
/// `core` error type defined outside this crate.
pub struct ApiError(pub CoordError);

impl From<CoordError> for ApiError {
    fn from(err: CoordError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let err = self.0;
        let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let context = error_context(&err);
        let body = json!({
            "error": {
                "code": err.code(),
                "message": err.to_string(),
                "context": context,
            }
        });
        (status, Json(body)).into_response()
    }
}

/// Structured context fields (ids, rightful owner, cycle path) the SDK's
/// error-discrimination helpers can read without parsing `message`.
fn error_context(err: &CoordError) -> serde_json::Value {
    match err {
        CoordError::InvalidTransition { task_id, from, to } => json!({
            "task_id": task_id, "from": from, "to": to,
        }),
        CoordError::CycleDetected { child_id, parent_id, path } => json!({
            "child_id": child_id, "parent_id": parent_id, "path": path,
        }),
        CoordError::NotOwner { task_id, agent, owner } => json!({
            "task_id": task_id, "agent": agent, "owner": owner,
        }),
        CoordError::AlreadyClaimed { task_id, owner } => json!({
            "task_id": task_id, "owner": owner,
        }),
        CoordError::DependencyNotFound { child_id, parent_id } => json!({
            "child_id": child_id, "parent_id": parent_id,
        }),
        _ => json!({}),
    }
}
