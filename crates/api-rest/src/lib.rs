//! # API REST
//!
//! DICOMweb REST API for the filesystem-backed DICOM archive.
//!
//! Handles:
//! - QIDO-RS query endpoints (studies, series, instance metadata)
//! - WADO-RS retrieval endpoints (bulk data, frames, rendered images)
//! - STOW-RS multipart ingestion and study deletion
//! - OpenAPI/Swagger documentation and CORS
//!
//! All archive semantics live in `dwfs-core`; this crate only maps HTTP
//! requests onto core services and core outcomes onto status codes.

#![warn(rust_2018_idioms)]

use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::get;
use axum::Router;
use dwfs_core::CoreConfig;
use serde::Serialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

mod delete;
mod qido;
mod stow;
mod wado;

/// Product token advertised in the `X-Powered-By` response header.
pub(crate) const SERVER_PRODUCT: &str = "dwfs";

/// Content type of DICOM-JSON responses.
pub(crate) const DICOM_JSON: &str = "application/dicom+json";

/// Uploads stream into memory before parsing; this bounds them.
const MAX_STORE_BODY_BYTES: usize = 256 * 1024 * 1024;

/// Application state for the REST API server
///
/// Contains shared state that needs to be accessible to all request
/// handlers, chiefly the resolved core configuration.
#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<CoreConfig>,
}

impl AppState {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct HealthResponse {
    pub ok: bool,
    pub message: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        qido::get_studies,
        qido::get_series,
        qido::get_study_metadata,
        qido::get_series_metadata,
        wado::get_rendered,
        wado::get_frame,
        wado::get_pixel_data,
        stow::store_instances,
        stow::store_to_study,
        delete::delete_study,
    ),
    components(schemas(HealthResponse))
)]
struct ApiDoc;

/// Build the full DICOMweb router over the given state.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/dicomweb/studies",
            get(qido::get_studies).post(stow::store_instances),
        )
        .route(
            "/dicomweb/studies/:study",
            axum::routing::post(stow::store_to_study).delete(delete::delete_study),
        )
        .route(
            "/dicomweb/studies/:study/metadata",
            get(qido::get_study_metadata),
        )
        .route("/dicomweb/studies/:study/series", get(qido::get_series))
        .route(
            "/dicomweb/studies/:study/series/:series/metadata",
            get(qido::get_series_metadata),
        )
        .route(
            "/dicomweb/studies/:study/series/:series/instances/:sop/rendered",
            get(wado::get_rendered),
        )
        .route(
            "/dicomweb/studies/:study/series/:series/instances/:sop/thumbnail",
            get(wado::get_rendered),
        )
        .route(
            "/dicomweb/studies/:study/series/:series/instances/:sop/frames/:frame",
            get(wado::get_frame),
        )
        .route(
            "/dicomweb/studies/:study/series/:series/instances/:sop/bulk/7fe00010",
            get(wado::get_pixel_data),
        )
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(DefaultBodyLimit::max(MAX_STORE_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Bind and serve the REST API until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the HTTP server
/// fails while running.
pub async fn serve(addr: &str, cfg: Arc<CoreConfig>) -> anyhow::Result<()> {
    tracing::info!("storage root: {}", cfg.storage_dir().display());
    let app = build_router(AppState::new(cfg));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthResponse)
    )
)]
/// Health check endpoint for monitoring and load balancer probes.
#[axum::debug_handler]
async fn health(State(_state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        message: "DICOMweb archive is alive".into(),
    })
}

/// Serialise a value as a DICOM-JSON response.
pub(crate) fn dicom_json_response<T: Serialize>(value: &T) -> Response {
    ([(header::CONTENT_TYPE, DICOM_JSON)], Json(value)).into_response()
}

/// A JSON error body with the given status code.
pub(crate) fn json_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(serde_json::json!({ "error": message.into() })),
    )
        .into_response()
}

/// The base URL clients should use to reach this server: the request's own
/// Host when present, the configured public base URL otherwise.
pub(crate) fn effective_base_url(state: &AppState, headers: &HeaderMap) -> String {
    headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .map(|host| format!("http://{host}"))
        .unwrap_or_else(|| state.cfg.public_base_url().to_string())
}
