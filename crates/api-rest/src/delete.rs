//! Study deletion handler.

use crate::{json_error, AppState};
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use dwfs_core::{StoreError, Uid};

#[utoipa::path(
    delete,
    path = "/dicomweb/studies/{study}",
    responses(
        (status = 200, description = "Study subtree removed"),
        (status = 404, description = "Study not found")
    )
)]
/// Remove an entire study and everything under it.
#[axum::debug_handler]
pub(crate) async fn delete_study(
    State(state): State<AppState>,
    AxumPath(study_uid): AxumPath<String>,
) -> Response {
    let Ok(study) = Uid::new(&study_uid) else {
        return json_error(StatusCode::NOT_FOUND, format!("Study {study_uid} not found."));
    };

    match state.cfg.store().delete_study(&study) {
        Ok(()) => Json(serde_json::json!({
            "message": format!("Study {study_uid} deleted successfully.")
        }))
        .into_response(),
        Err(StoreError::NotFound(_)) => {
            json_error(StatusCode::NOT_FOUND, format!("Study {study_uid} not found."))
        }
        Err(err) => {
            tracing::error!("error deleting study {study_uid}: {err}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "Failed to delete study")
        }
    }
}
