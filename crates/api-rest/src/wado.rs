//! WADO-RS retrieval handlers: rendered images, raw frames and bulk data.

use crate::{effective_base_url, json_error, AppState, SERVER_PRODUCT};
use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use dwfs_core::index::InstanceIndex;
use dwfs_core::multipart::{build_related_body, RelatedPart};
use dwfs_core::{render, ArchiveError, InstanceKey};

#[utoipa::path(
    get,
    path = "/dicomweb/studies/{study}/series/{series}/instances/{sop}/rendered",
    responses(
        (status = 200, description = "Rendered JPEG, or the native document for encapsulated PDFs"),
        (status = 404, description = "Instance not found")
    )
)]
/// Rendered (and thumbnail) retrieval of the first frame.
#[axum::debug_handler]
pub(crate) async fn get_rendered(
    State(state): State<AppState>,
    AxumPath((study_uid, series_uid, sop_uid)): AxumPath<(String, String, String)>,
) -> Response {
    let Ok(key) = InstanceKey::new(&study_uid, &series_uid, &sop_uid) else {
        return json_error(StatusCode::NOT_FOUND, "instance not found");
    };
    let object = match InstanceIndex::new(state.cfg.clone()).open_instance(&key) {
        Ok(Some(object)) => object,
        Ok(None) => return json_error(StatusCode::NOT_FOUND, "instance not found"),
        Err(err) => {
            tracing::error!("rendered retrieval error for {sop_uid}: {err}");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Render failed: {err}"));
        }
    };

    match render::render_instance(&object, 1) {
        Ok(rendered) => {
            ([(header::CONTENT_TYPE, rendered.media_type)], rendered.bytes).into_response()
        }
        Err(err) => {
            tracing::error!("rendered retrieval error for {sop_uid}: {err}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Render failed: {err}"))
        }
    }
}

#[utoipa::path(
    get,
    path = "/dicomweb/studies/{study}/series/{series}/instances/{sop}/frames/{frame}",
    responses(
        (status = 200, description = "Single-part multipart/related body with the raw frame bytes"),
        (status = 400, description = "Frame number out of range"),
        (status = 404, description = "Instance not found")
    )
)]
/// Single-frame retrieval as a multipart/related body. Frame numbers are
/// 1-based.
#[axum::debug_handler]
pub(crate) async fn get_frame(
    State(state): State<AppState>,
    AxumPath((study_uid, series_uid, sop_uid, frame_number)): AxumPath<(String, String, String, u32)>,
    headers: HeaderMap,
) -> Response {
    let Ok(key) = InstanceKey::new(&study_uid, &series_uid, &sop_uid) else {
        return json_error(StatusCode::NOT_FOUND, "instance not found");
    };
    let object = match InstanceIndex::new(state.cfg.clone()).open_instance(&key) {
        Ok(Some(object)) => object,
        Ok(None) => return json_error(StatusCode::NOT_FOUND, "instance not found"),
        Err(err) => {
            tracing::error!("frame retrieval error for {sop_uid}: {err}");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Frame error: {err}"));
        }
    };

    let bytes = match render::extract_frame(&object, frame_number) {
        Ok(bytes) => bytes,
        Err(err @ ArchiveError::FrameOutOfRange { .. }) => {
            return json_error(StatusCode::BAD_REQUEST, err.to_string());
        }
        Err(err) => {
            tracing::error!("frame retrieval error for {sop_uid}: {err}");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Frame error: {err}"));
        }
    };

    let transfer_syntax = object.meta().transfer_syntax().to_string();
    let base_url = effective_base_url(&state, &headers);
    let location = format!(
        "{base_url}/dicomweb/studies/{study_uid}/series/{series_uid}/instances/{sop_uid}/frames/{frame_number}"
    );
    let part = RelatedPart {
        content_type: "application/octet-stream".to_string(),
        transfer_syntax: Some(transfer_syntax),
        location: Some(location),
        bytes,
    };
    let body = build_related_body(&[part], "application/octet-stream");

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, body.content_type)
        .header("X-Powered-By", SERVER_PRODUCT)
        .header("X-Content-Type-Options", "nosniff")
        .body(Body::from(body.bytes));
    match response {
        Ok(response) => response,
        Err(err) => json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Frame error: {err}"),
        ),
    }
}

#[utoipa::path(
    get,
    path = "/dicomweb/studies/{study}/series/{series}/instances/{sop}/bulk/7fe00010",
    responses(
        (status = 200, description = "Raw pixel-data bytes"),
        (status = 404, description = "Instance or pixel data attribute not found")
    )
)]
/// Bulk retrieval of the pixel-data attribute payload.
#[axum::debug_handler]
pub(crate) async fn get_pixel_data(
    State(state): State<AppState>,
    AxumPath((study_uid, series_uid, sop_uid)): AxumPath<(String, String, String)>,
) -> Response {
    let Ok(key) = InstanceKey::new(&study_uid, &series_uid, &sop_uid) else {
        return json_error(StatusCode::NOT_FOUND, "instance not found");
    };
    let object = match InstanceIndex::new(state.cfg.clone()).open_instance(&key) {
        Ok(Some(object)) => object,
        Ok(None) => return json_error(StatusCode::NOT_FOUND, "instance not found"),
        Err(err) => {
            tracing::error!("bulk retrieval error for {sop_uid}: {err}");
            return json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };

    match render::pixel_data_bytes(&object) {
        Ok(Some(bytes)) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            bytes,
        )
            .into_response(),
        Ok(None) => json_error(StatusCode::NOT_FOUND, "pixel data attribute not found"),
        Err(err) => {
            tracing::error!("bulk retrieval error for {sop_uid}: {err}");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}
