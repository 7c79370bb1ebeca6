//! STOW-RS ingestion.
//!
//! Each uploaded part is decoded and persisted independently; one bad part
//! never aborts the rest. The report's wire shape is fixed for client
//! compatibility: `Status` is `Success`, `PartialSuccess` or `Failure`,
//! each instance entry carries its own `Status` and optional `Error`, and
//! `TotalCount` counts every part attempted.

use crate::metadata::element_str;
use crate::{ArchiveError, ArchiveResult, CoreConfig, DicomStore, InstanceKey};
use dicom::dictionary_std::tags;
use dicom::object::{from_reader, DefaultDicomObject};
use std::sync::Arc;

/// Aggregate outcome of a store request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum IngestStatus {
    Success,
    PartialSuccess,
    Failure,
}

/// Per-part outcome entry of the store response.
#[derive(Debug, Clone, serde::Serialize)]
pub struct InstanceOutcome {
    #[serde(rename = "StudyInstanceUID", skip_serializing_if = "Option::is_none")]
    pub study_instance_uid: Option<String>,
    #[serde(rename = "SeriesInstanceUID", skip_serializing_if = "Option::is_none")]
    pub series_instance_uid: Option<String>,
    #[serde(rename = "SOPInstanceUID", skip_serializing_if = "Option::is_none")]
    pub sop_instance_uid: Option<String>,
    #[serde(rename = "Status")]
    pub status: &'static str,
    #[serde(rename = "Error", skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl InstanceOutcome {
    fn success(key: &InstanceKey) -> Self {
        Self {
            study_instance_uid: Some(key.study().to_string()),
            series_instance_uid: Some(key.series().to_string()),
            sop_instance_uid: Some(key.sop().to_string()),
            status: "Success",
            error: None,
        }
    }

    fn failure(error: String) -> Self {
        Self {
            study_instance_uid: None,
            series_instance_uid: None,
            sop_instance_uid: None,
            status: "Failed",
            error: Some(error),
        }
    }
}

/// Store response body.
#[derive(Debug, serde::Serialize)]
pub struct IngestReport {
    #[serde(rename = "Status")]
    pub status: IngestStatus,
    #[serde(rename = "UploadedInstances")]
    pub uploaded_instances: Vec<InstanceOutcome>,
    #[serde(rename = "TotalCount")]
    pub total_count: usize,
}

/// Decodes and persists uploaded instances.
pub struct IngestService {
    cfg: Arc<CoreConfig>,
}

impl IngestService {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    /// Persist every part of a store request.
    ///
    /// When `target_study` is given, parts whose own StudyInstanceUID does
    /// not match are recorded as failed without being persisted; processing
    /// continues with the next part either way.
    pub fn store_parts(&self, parts: &[Vec<u8>], target_study: Option<&str>) -> IngestReport {
        let store = self.cfg.store();
        let mut uploaded_instances = Vec::with_capacity(parts.len());
        let mut failures = 0usize;

        for part in parts {
            match self.store_one(&store, part, target_study) {
                Ok(key) => uploaded_instances.push(InstanceOutcome::success(&key)),
                Err(err) => {
                    tracing::warn!("failed to store uploaded instance: {err}");
                    failures += 1;
                    uploaded_instances.push(InstanceOutcome::failure(err.to_string()));
                }
            }
        }

        let status = if failures == 0 {
            IngestStatus::Success
        } else if failures < uploaded_instances.len() {
            IngestStatus::PartialSuccess
        } else {
            IngestStatus::Failure
        };

        IngestReport {
            status,
            total_count: uploaded_instances.len(),
            uploaded_instances,
        }
    }

    fn store_one(
        &self,
        store: &DicomStore,
        part: &[u8],
        target_study: Option<&str>,
    ) -> ArchiveResult<InstanceKey> {
        let object = read_part10(part)?;

        let study = identifying_uid(&object, tags::STUDY_INSTANCE_UID, "StudyInstanceUID")?;
        if let Some(target) = target_study {
            if study != target {
                return Err(ArchiveError::StudyMismatch {
                    expected: target.to_string(),
                    found: study,
                });
            }
        }
        let series = identifying_uid(&object, tags::SERIES_INSTANCE_UID, "SeriesInstanceUID")?;
        let sop = identifying_uid(&object, tags::SOP_INSTANCE_UID, "SOPInstanceUID")?;

        let key = InstanceKey::new(study, series, sop)?;
        let path = store.prepare_instance_path(&key)?;
        object
            .write_to_file(&path)
            .map_err(|err| ArchiveError::Persist(err.to_string()))?;
        tracing::info!("stored instance at {}", path.display());
        Ok(key)
    }
}

fn identifying_uid(
    object: &DefaultDicomObject,
    tag: dicom::core::Tag,
    name: &str,
) -> ArchiveResult<String> {
    element_str(object, tag)
        .ok_or_else(|| ArchiveError::Decode(format!("uploaded object has no {name}")))
}

/// Decode a Part-10 byte buffer, tolerating a present or absent 128-byte
/// preamble.
pub fn read_part10(bytes: &[u8]) -> ArchiveResult<DefaultDicomObject> {
    const PREAMBLE_LENGTH: usize = 128;
    let stream = if bytes.len() > PREAMBLE_LENGTH + 4
        && &bytes[PREAMBLE_LENGTH..PREAMBLE_LENGTH + 4] == b"DICM"
    {
        &bytes[PREAMBLE_LENGTH..]
    } else {
        bytes
    };
    from_reader(stream).map_err(|err| ArchiveError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testdata;
    use tempfile::TempDir;

    fn service(temp: &TempDir) -> IngestService {
        let cfg = CoreConfig::new(temp.path().to_path_buf(), "http://testserver".into()).unwrap();
        IngestService::new(Arc::new(cfg))
    }

    fn part(study: &str, series: &str, sop: &str) -> Vec<u8> {
        testdata::part10_bytes(testdata::minimal_dataset(study, series, sop, "CT"))
    }

    #[test]
    fn valid_parts_are_persisted() {
        let temp = TempDir::new().unwrap();
        let report = service(&temp).store_parts(&[part("1.2", "1.2.3", "1.2.3.4")], None);

        assert_eq!(report.status, IngestStatus::Success);
        assert_eq!(report.total_count, 1);
        assert_eq!(report.uploaded_instances[0].status, "Success");
        assert_eq!(
            report.uploaded_instances[0].sop_instance_uid.as_deref(),
            Some("1.2.3.4")
        );
        assert!(temp.path().join("1.2/1.2.3/1.2.3.4.dcm").is_file());
    }

    #[test]
    fn a_bad_part_degrades_to_partial_success() {
        let temp = TempDir::new().unwrap();
        let parts = vec![part("1.2", "1.2.3", "1.2.3.4"), b"not dicom at all".to_vec()];
        let report = service(&temp).store_parts(&parts, None);

        assert_eq!(report.status, IngestStatus::PartialSuccess);
        assert_eq!(report.total_count, 2);
        assert_eq!(report.uploaded_instances[1].status, "Failed");
        assert!(report.uploaded_instances[1].error.is_some());
    }

    #[test]
    fn all_bad_parts_fail_the_request() {
        let temp = TempDir::new().unwrap();
        let parts = vec![b"garbage one".to_vec(), b"garbage two".to_vec()];
        let report = service(&temp).store_parts(&parts, None);

        assert_eq!(report.status, IngestStatus::Failure);
        assert_eq!(report.total_count, 2);
    }

    #[test]
    fn study_scoped_mismatch_is_recorded_without_persisting() {
        let temp = TempDir::new().unwrap();
        let parts = vec![
            part("1.2", "1.2.3", "1.2.3.1"),
            part("1.2", "1.2.3", "1.2.3.2"),
            part("1.2", "1.2.3", "1.2.3.3"),
            part("9.9", "9.9.1", "9.9.1.1"),
        ];
        let report = service(&temp).store_parts(&parts, Some("1.2"));

        assert_eq!(report.status, IngestStatus::PartialSuccess);
        assert_eq!(report.total_count, 4);
        let statuses: Vec<&str> = report
            .uploaded_instances
            .iter()
            .map(|outcome| outcome.status)
            .collect();
        assert_eq!(statuses, vec!["Success", "Success", "Success", "Failed"]);
        let error = report.uploaded_instances[3].error.as_deref().unwrap();
        assert!(error.contains("Expected: 1.2"));
        assert!(error.contains("Found: 9.9"));
        assert!(!temp.path().join("9.9").exists());
    }

    #[test]
    fn zero_parts_report_success_with_zero_total() {
        let temp = TempDir::new().unwrap();
        let report = service(&temp).store_parts(&[], None);
        assert_eq!(report.status, IngestStatus::Success);
        assert_eq!(report.total_count, 0);
    }

    #[test]
    fn report_serialises_with_wire_field_names() {
        let temp = TempDir::new().unwrap();
        let report = service(&temp).store_parts(&[part("1.2", "1.2.3", "1.2.3.4")], None);
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["Status"], "Success");
        assert_eq!(json["TotalCount"], 1);
        assert_eq!(json["UploadedInstances"][0]["Status"], "Success");
        assert_eq!(json["UploadedInstances"][0]["StudyInstanceUID"], "1.2");
    }

    #[test]
    fn preamble_and_preamble_free_parts_both_decode() {
        let with_preamble = part("1.2", "1.2.3", "1.2.3.4");
        assert!(read_part10(&with_preamble).is_ok());
        // Strip the 128-byte preamble, leaving the DICM magic in place.
        assert!(read_part10(&with_preamble[128..]).is_ok());
    }
}
