//! QIDO-RS query handlers.
//!
//! Filters arrive either as named parameters (`PatientName=...`) or as
//! tag-coded parameters (`00100010=...`); the named form wins when both are
//! present for the same logical filter.

use crate::{dicom_json_response, effective_base_url, json_error, AppState};
use axum::extract::{Path as AxumPath, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::Response;
use dwfs_core::index::{InstanceIndex, SeriesFilter, StudyFilter};
use std::collections::HashMap;

fn named_or_tag(
    params: &HashMap<String, String>,
    named: &str,
    tag: &str,
) -> Option<String> {
    params
        .get(named)
        .or_else(|| params.get(tag))
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn numeric(params: &HashMap<String, String>, name: &str, default: usize) -> usize {
    params
        .get(name)
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

#[utoipa::path(
    get,
    path = "/dicomweb/studies",
    responses(
        (status = 200, description = "Study-level metadata matching the query filters")
    )
)]
/// QIDO-RS study search with optional patient/date/UID filters and
/// offset/limit pagination.
#[axum::debug_handler]
pub(crate) async fn get_studies(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let filter = StudyFilter {
        patient_name: named_or_tag(&params, "PatientName", "00100010"),
        patient_id: named_or_tag(&params, "PatientID", "00100020"),
        study_date: named_or_tag(&params, "StudyDate", "00080020"),
        study_instance_uid: named_or_tag(&params, "StudyInstanceUID", "0020000D"),
        offset: numeric(&params, "offset", 0),
        limit: numeric(&params, "limit", 100),
    };
    let base_url = effective_base_url(&state, &headers);
    let studies = InstanceIndex::new(state.cfg.clone()).query_studies(&filter, &base_url);
    dicom_json_response(&studies)
}

#[utoipa::path(
    get,
    path = "/dicomweb/studies/{study}/series",
    responses(
        (status = 200, description = "Series-level metadata within the study")
    )
)]
/// QIDO-RS series search within one study.
#[axum::debug_handler]
pub(crate) async fn get_series(
    State(state): State<AppState>,
    AxumPath(study_uid): AxumPath<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let filter = SeriesFilter {
        modality: named_or_tag(&params, "Modality", "00080060"),
        series_instance_uid: named_or_tag(&params, "SeriesInstanceUID", "0020000E"),
    };
    let series = InstanceIndex::new(state.cfg.clone()).query_series(&study_uid, &filter);
    dicom_json_response(&series)
}

#[utoipa::path(
    get,
    path = "/dicomweb/studies/{study}/metadata",
    responses(
        (status = 200, description = "Instance metadata for every series of the study"),
        (status = 404, description = "Study not found")
    )
)]
/// WADO-RS study metadata: every instance of every series.
#[axum::debug_handler]
pub(crate) async fn get_study_metadata(
    State(state): State<AppState>,
    AxumPath(study_uid): AxumPath<String>,
    headers: HeaderMap,
) -> Response {
    let base_url = effective_base_url(&state, &headers);
    let metadata =
        InstanceIndex::new(state.cfg.clone()).study_instance_metadata(&study_uid, &base_url);
    if metadata.is_empty() {
        return json_error(StatusCode::NOT_FOUND, format!("study {study_uid} not found"));
    }
    dicom_json_response(&metadata)
}

#[utoipa::path(
    get,
    path = "/dicomweb/studies/{study}/series/{series}/metadata",
    responses(
        (status = 200, description = "Instance metadata for the series"),
        (status = 404, description = "Series not found")
    )
)]
/// WADO-RS series metadata, optionally narrowed to one SOP instance.
#[axum::debug_handler]
pub(crate) async fn get_series_metadata(
    State(state): State<AppState>,
    AxumPath((study_uid, series_uid)): AxumPath<(String, String)>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let sop_filter = named_or_tag(&params, "SOPInstanceUID", "00080018");
    let base_url = effective_base_url(&state, &headers);
    let metadata = InstanceIndex::new(state.cfg.clone()).instance_metadata(
        &study_uid,
        &series_uid,
        sop_filter.as_deref(),
        &base_url,
    );
    if metadata.is_empty() {
        return json_error(
            StatusCode::NOT_FOUND,
            format!("series {series_uid} not found in study {study_uid}"),
        );
    }
    dicom_json_response(&metadata)
}
