//! STOW-RS store handlers.
//!
//! The request boundary validates the content type and boundary token; part
//! splitting and per-part persistence live in the core ingest service. The
//! 200/202/500 mapping of the aggregate status is a fixed convention that
//! existing clients depend on.

use crate::{json_error, AppState};
use axum::body::Bytes;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use dwfs_core::ingest::{IngestService, IngestStatus};
use dwfs_core::multipart::{boundary_from_content_type, is_multipart_related, split_related_body};

#[utoipa::path(
    post,
    path = "/dicomweb/studies",
    responses(
        (status = 200, description = "All parts stored"),
        (status = 202, description = "Some parts stored, some failed"),
        (status = 400, description = "Not a multipart/related request"),
        (status = 500, description = "Every part failed")
    )
)]
/// STOW-RS store of a multipart/related body.
#[axum::debug_handler]
pub(crate) async fn store_instances(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_store(state, headers, body, None)
}

#[utoipa::path(
    post,
    path = "/dicomweb/studies/{study}",
    responses(
        (status = 200, description = "All parts stored"),
        (status = 202, description = "Some parts stored, some failed or mismatched the study"),
        (status = 400, description = "Not a multipart/related request"),
        (status = 500, description = "Every part failed")
    )
)]
/// STOW-RS store scoped to one study: parts whose own StudyInstanceUID does
/// not match are recorded as failed without being stored.
#[axum::debug_handler]
pub(crate) async fn store_to_study(
    State(state): State<AppState>,
    AxumPath(study_uid): AxumPath<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    handle_store(state, headers, body, Some(study_uid))
}

fn handle_store(
    state: AppState,
    headers: HeaderMap,
    body: Bytes,
    target_study: Option<String>,
) -> Response {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");
    if !is_multipart_related(content_type) {
        return json_error(
            StatusCode::BAD_REQUEST,
            "Content-Type must be multipart/related",
        );
    }
    let Some(boundary) = boundary_from_content_type(content_type) else {
        return json_error(StatusCode::BAD_REQUEST, "Invalid multipart boundary");
    };

    let parts = match split_related_body(&body, &boundary) {
        Ok(parts) => parts,
        Err(err) => return json_error(StatusCode::BAD_REQUEST, err.to_string()),
    };

    let report = IngestService::new(state.cfg.clone()).store_parts(&parts, target_study.as_deref());
    let status = match report.status {
        IngestStatus::Success => StatusCode::OK,
        IngestStatus::PartialSuccess => StatusCode::ACCEPTED,
        IngestStatus::Failure => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(report)).into_response()
}
