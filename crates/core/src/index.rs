//! Filesystem-backed study/series/instance queries.
//!
//! Every query is answered by a live enumeration of the storage tree; there
//! is no persistent secondary index and no cache, so results are always as
//! fresh as the directory state at scan time. The tradeoff is deliberate
//! (freshness over throughput) and the scan is isolated behind this type so
//! an indexed implementation can replace it without touching the mapper or
//! renderer.
//!
//! Result order follows directory enumeration order: deterministic for an
//! unchanged tree, otherwise unspecified. A single unreadable file is
//! logged and skipped, it never fails the query. A directory that vanishes
//! mid-scan (concurrent study deletion) reads as empty.

use crate::metadata::{
    effective_modality, element_str, json_attribute, string_attribute, MetadataDocument,
    MetadataMapper,
};
use crate::{CoreConfig, InstanceKey, Uid};
use dicom::dictionary_std::tags;
use dicom::object::{open_file, DefaultDicomObject};
use serde_json::Value as Json;
use std::sync::Arc;

/// Study-level query options.
///
/// String filters are matched at the study group's representative object;
/// `offset`/`limit` paginate the filtered, grouped result.
#[derive(Debug, Clone)]
pub struct StudyFilter {
    /// Case-insensitive substring match against PatientName
    pub patient_name: Option<String>,
    /// Exact match against PatientID
    pub patient_id: Option<String>,
    /// Exact match against StudyDate
    pub study_date: Option<String>,
    /// Exact match against StudyInstanceUID
    pub study_instance_uid: Option<String>,
    pub offset: usize,
    pub limit: usize,
}

impl Default for StudyFilter {
    fn default() -> Self {
        Self {
            patient_name: None,
            patient_id: None,
            study_date: None,
            study_instance_uid: None,
            offset: 0,
            limit: 100,
        }
    }
}

/// Series-level query options.
#[derive(Debug, Clone, Default)]
pub struct SeriesFilter {
    /// Case-insensitive exact match against the effective modality
    pub modality: Option<String>,
    /// Exact match against SeriesInstanceUID
    pub series_instance_uid: Option<String>,
}

struct StudyGroup {
    study_uid: String,
    representative: DefaultDicomObject,
    modalities: Vec<String>,
    series_uids: Vec<String>,
    instance_count: usize,
}

struct SeriesGroup {
    series_uid: String,
    representative: DefaultDicomObject,
    modality: Option<String>,
    instance_count: usize,
}

/// Read-only query interface over the stored object collection.
pub struct InstanceIndex {
    cfg: Arc<CoreConfig>,
}

impl InstanceIndex {
    pub fn new(cfg: Arc<CoreConfig>) -> Self {
        Self { cfg }
    }

    /// Query study-level metadata across the whole archive.
    ///
    /// Groups every stored object by its StudyInstanceUID, filters, then
    /// adds the derived attributes: distinct modalities in study (with the
    /// document override applied per object before aggregation), series and
    /// instance counts, and the study retrieve URL.
    pub fn query_studies(&self, filter: &StudyFilter, base_url: &str) -> Vec<MetadataDocument> {
        let store = self.cfg.store();
        let mut groups: Vec<StudyGroup> = Vec::new();

        for file in store.walk_all() {
            let object = match open_file(&file) {
                Ok(object) => object,
                Err(err) => {
                    tracing::warn!("skipping unreadable file {}: {err}", file.display());
                    continue;
                }
            };
            let Some(study_uid) = element_str(&object, tags::STUDY_INSTANCE_UID) else {
                continue;
            };
            if let Some(want) = &filter.study_instance_uid {
                if &study_uid != want {
                    continue;
                }
            }
            let modality = effective_modality(&object);
            let series_uid = element_str(&object, tags::SERIES_INSTANCE_UID);

            match groups.iter_mut().find(|group| group.study_uid == study_uid) {
                Some(group) => {
                    group.instance_count += 1;
                    if let Some(modality) = modality {
                        if !group.modalities.contains(&modality) {
                            group.modalities.push(modality);
                        }
                    }
                    if let Some(series_uid) = series_uid {
                        if !group.series_uids.contains(&series_uid) {
                            group.series_uids.push(series_uid);
                        }
                    }
                }
                None => groups.push(StudyGroup {
                    study_uid,
                    modalities: modality.into_iter().collect(),
                    series_uids: series_uid.into_iter().collect(),
                    instance_count: 1,
                    representative: object,
                }),
            }
        }

        let mapper = MetadataMapper::new(base_url);
        groups
            .iter()
            .filter(|group| study_matches(&group.representative, filter))
            .map(|group| {
                let mut document = mapper.map_summary(&group.representative);
                document.insert(
                    "00080061".to_string(),
                    json_attribute(
                        "CS",
                        Json::Array(
                            group
                                .modalities
                                .iter()
                                .map(|m| Json::String(m.clone()))
                                .collect(),
                        ),
                    ),
                );
                document
                    .entry("00201206".to_string())
                    .or_insert_with(|| string_attribute("IS", &group.series_uids.len().to_string()));
                document
                    .entry("00201208".to_string())
                    .or_insert_with(|| string_attribute("IS", &group.instance_count.to_string()));
                document.insert(
                    "00081190".to_string(),
                    string_attribute(
                        "UR",
                        &format!("{base_url}/dicomweb/studies/{}", group.study_uid),
                    ),
                );
                document
            })
            .skip(filter.offset)
            .take(filter.limit)
            .collect()
    }

    /// Query series-level metadata within one study.
    pub fn query_series(&self, study_uid: &str, filter: &SeriesFilter) -> Vec<MetadataDocument> {
        let Ok(study) = Uid::new(study_uid) else {
            return Vec::new();
        };
        let store = self.cfg.store();
        let mut groups: Vec<SeriesGroup> = Vec::new();

        for file in store.walk_study(&study) {
            let object = match open_file(&file) {
                Ok(object) => object,
                Err(err) => {
                    tracing::warn!("skipping unreadable file {}: {err}", file.display());
                    continue;
                }
            };
            let Some(series_uid) = element_str(&object, tags::SERIES_INSTANCE_UID) else {
                continue;
            };
            if let Some(want) = &filter.series_instance_uid {
                if &series_uid != want {
                    continue;
                }
            }
            let modality = effective_modality(&object);
            if let Some(want) = &filter.modality {
                if !modality
                    .as_deref()
                    .unwrap_or("")
                    .eq_ignore_ascii_case(want)
                {
                    continue;
                }
            }

            match groups.iter_mut().find(|group| group.series_uid == series_uid) {
                Some(group) => group.instance_count += 1,
                None => groups.push(SeriesGroup {
                    series_uid,
                    modality,
                    instance_count: 1,
                    representative: object,
                }),
            }
        }

        groups
            .iter()
            .map(|group| {
                let mut document = MetadataDocument::new();
                document.insert("0020000D".to_string(), string_attribute("UI", study_uid));
                document.insert(
                    "0020000E".to_string(),
                    string_attribute("UI", &group.series_uid),
                );
                document.insert(
                    "00200011".to_string(),
                    string_attribute(
                        "IS",
                        &element_str(&group.representative, tags::SERIES_NUMBER)
                            .unwrap_or_else(|| "1".to_string()),
                    ),
                );
                document.insert(
                    "0008103E".to_string(),
                    string_attribute(
                        "LO",
                        &element_str(&group.representative, tags::SERIES_DESCRIPTION)
                            .unwrap_or_default(),
                    ),
                );
                document.insert(
                    "00080060".to_string(),
                    string_attribute("CS", group.modality.as_deref().unwrap_or("")),
                );
                document.insert(
                    "00201209".to_string(),
                    string_attribute("IS", &group.instance_count.to_string()),
                );
                document
            })
            .collect()
    }

    /// Open one stored instance, `None` when no file exists at its path.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::Decode` when the file exists but cannot be
    /// parsed as a DICOM object.
    pub fn open_instance(
        &self,
        key: &InstanceKey,
    ) -> crate::ArchiveResult<Option<DefaultDicomObject>> {
        let path = self.cfg.store().instance_path(key);
        if !path.is_file() {
            return Ok(None);
        }
        open_file(&path)
            .map(Some)
            .map_err(|err| crate::ArchiveError::Decode(err.to_string()))
    }

    /// Full instance metadata for one series, optionally narrowed to a
    /// single SOP instance.
    ///
    /// An empty result is a valid outcome: the caller decides whether a
    /// missing identifying path should surface as not-found.
    pub fn instance_metadata(
        &self,
        study_uid: &str,
        series_uid: &str,
        sop_filter: Option<&str>,
        base_url: &str,
    ) -> Vec<MetadataDocument> {
        let Ok(study) = Uid::new(study_uid) else {
            return Vec::new();
        };
        let Ok(series) = Uid::new(series_uid) else {
            return Vec::new();
        };

        let store = self.cfg.store();
        let mapper = MetadataMapper::new(base_url);
        let mut documents = Vec::new();

        for file in store.instance_files_in(&store.series_dir(&study, &series)) {
            let object = match open_file(&file) {
                Ok(object) => object,
                Err(err) => {
                    tracing::warn!("skipping unreadable file {}: {err}", file.display());
                    continue;
                }
            };
            let sop = element_str(&object, tags::SOP_INSTANCE_UID).unwrap_or_default();
            if let Some(want) = sop_filter {
                if sop != want {
                    continue;
                }
            }
            let key = match InstanceKey::new(study_uid, series_uid, &sop) {
                Ok(key) => key,
                Err(err) => {
                    tracing::warn!(
                        "skipping instance with unusable identifiers in {}: {err}",
                        file.display()
                    );
                    continue;
                }
            };
            let transfer_syntax = object.meta().transfer_syntax().to_string();
            match mapper.map_instance(&object, &transfer_syntax, &key) {
                Ok(document) => documents.push(document),
                Err(err) => {
                    tracing::warn!("skipping unmappable instance {}: {err}", file.display());
                }
            }
        }

        documents
    }

    /// Instance metadata for every series of a study.
    pub fn study_instance_metadata(&self, study_uid: &str, base_url: &str) -> Vec<MetadataDocument> {
        let Ok(study) = Uid::new(study_uid) else {
            return Vec::new();
        };
        let store = self.cfg.store();
        let mut documents = Vec::new();

        for series_dir in store.series_dirs(&study) {
            let Some(series_uid) = series_dir
                .file_name()
                .and_then(|name| name.to_str())
                .map(str::to_string)
            else {
                continue;
            };
            documents.extend(self.instance_metadata(study_uid, &series_uid, None, base_url));
        }

        documents
    }
}

fn study_matches(representative: &DefaultDicomObject, filter: &StudyFilter) -> bool {
    if let Some(want) = &filter.patient_name {
        let name = element_str(representative, tags::PATIENT_NAME).unwrap_or_default();
        if !name.to_lowercase().contains(&want.to_lowercase()) {
            return false;
        }
    }
    if let Some(want) = &filter.patient_id {
        if element_str(representative, tags::PATIENT_ID).unwrap_or_default() != *want {
            return false;
        }
    }
    if let Some(want) = &filter.study_date {
        if element_str(representative, tags::STUDY_DATE).unwrap_or_default() != *want {
            return false;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ENCAPSULATED_PDF_SOP_CLASS_UID;
    use crate::testdata;
    use serde_json::json;
    use std::path::Path;
    use tempfile::TempDir;

    const BASE: &str = "http://testserver";

    fn index(root: &Path) -> InstanceIndex {
        let cfg = CoreConfig::new(root.to_path_buf(), BASE.into()).unwrap();
        InstanceIndex::new(Arc::new(cfg))
    }

    fn seed_two_studies(root: &Path) {
        // Study 1.2: two series, two instances. Study 3.4: one instance.
        testdata::write_instance(root, testdata::minimal_dataset("1.2", "1.2.1", "1.2.1.1", "CT"));
        testdata::write_instance(root, testdata::minimal_dataset("1.2", "1.2.2", "1.2.2.1", "CT"));
        let mut other = testdata::minimal_dataset("3.4", "3.4.1", "3.4.1.1", "MR");
        other.put(testdata::str_element(tags::PATIENT_NAME, dicom::core::VR::PN, "Roe^Alex"));
        other.put(testdata::str_element(tags::PATIENT_ID, dicom::core::VR::LO, "P-2"));
        testdata::write_instance(root, other);
    }

    #[test]
    fn empty_archive_yields_no_studies() {
        let temp = TempDir::new().unwrap();
        let studies = index(temp.path()).query_studies(&StudyFilter::default(), BASE);
        assert!(studies.is_empty());
    }

    #[test]
    fn studies_are_grouped_with_derived_attributes() {
        let temp = TempDir::new().unwrap();
        seed_two_studies(temp.path());

        let studies = index(temp.path()).query_studies(&StudyFilter::default(), BASE);
        assert_eq!(studies.len(), 2);

        let study = studies
            .iter()
            .find(|doc| doc["0020000D"]["Value"][0] == "1.2")
            .expect("study 1.2 present");
        assert_eq!(study["00201206"], json!({"vr": "IS", "Value": ["2"]}));
        assert_eq!(study["00201208"], json!({"vr": "IS", "Value": ["2"]}));
        assert_eq!(study["00080061"], json!({"vr": "CS", "Value": ["CT"]}));
        assert_eq!(
            study["00081190"],
            json!({"vr": "UR", "Value": ["http://testserver/dicomweb/studies/1.2"]})
        );
    }

    #[test]
    fn study_uid_filter_returns_at_most_one_group() {
        let temp = TempDir::new().unwrap();
        seed_two_studies(temp.path());

        let filter = StudyFilter {
            study_instance_uid: Some("1.2".into()),
            ..Default::default()
        };
        let studies = index(temp.path()).query_studies(&filter, BASE);
        assert_eq!(studies.len(), 1);
        assert_eq!(studies[0]["00201208"], json!({"vr": "IS", "Value": ["2"]}));

        let filter = StudyFilter {
            study_instance_uid: Some("no.such.study".into()),
            ..Default::default()
        };
        assert!(index(temp.path()).query_studies(&filter, BASE).is_empty());
    }

    #[test]
    fn patient_filters_match_at_the_representative() {
        let temp = TempDir::new().unwrap();
        seed_two_studies(temp.path());
        let idx = index(temp.path());

        // Substring, case-insensitive.
        let filter = StudyFilter {
            patient_name: Some("roe".into()),
            ..Default::default()
        };
        let studies = idx.query_studies(&filter, BASE);
        assert_eq!(studies.len(), 1);
        assert_eq!(studies[0]["0020000D"]["Value"][0], "3.4");

        let filter = StudyFilter {
            patient_id: Some("P-1".into()),
            ..Default::default()
        };
        assert_eq!(idx.query_studies(&filter, BASE).len(), 1);

        let filter = StudyFilter {
            study_date: Some("19990101".into()),
            ..Default::default()
        };
        assert!(idx.query_studies(&filter, BASE).is_empty());
    }

    #[test]
    fn pagination_slices_the_grouped_result() {
        let temp = TempDir::new().unwrap();
        seed_two_studies(temp.path());
        let idx = index(temp.path());

        let filter = StudyFilter {
            limit: 1,
            ..Default::default()
        };
        assert_eq!(idx.query_studies(&filter, BASE).len(), 1);

        let filter = StudyFilter {
            offset: 1,
            ..Default::default()
        };
        assert_eq!(idx.query_studies(&filter, BASE).len(), 1);

        let filter = StudyFilter {
            offset: 2,
            ..Default::default()
        };
        assert!(idx.query_studies(&filter, BASE).is_empty());
    }

    #[test]
    fn pdf_objects_contribute_doc_to_modalities_in_study() {
        let temp = TempDir::new().unwrap();
        testdata::write_instance(
            temp.path(),
            testdata::minimal_dataset("1.2", "1.2.1", "1.2.1.1", "CT"),
        );
        testdata::write_instance(
            temp.path(),
            testdata::pdf_dataset("1.2", "1.2.9", "1.2.9.1", b"%PDF-1.4"),
        );

        let studies = index(temp.path()).query_studies(&StudyFilter::default(), BASE);
        assert_eq!(studies.len(), 1);
        let modalities = studies[0]["00080061"]["Value"].as_array().unwrap();
        assert!(modalities.contains(&json!("CT")));
        assert!(modalities.contains(&json!("DOC")));
    }

    #[test]
    fn series_query_groups_and_filters_by_modality() {
        let temp = TempDir::new().unwrap();
        seed_two_studies(temp.path());
        let idx = index(temp.path());

        let series = idx.query_series("1.2", &SeriesFilter::default());
        assert_eq!(series.len(), 2);
        for doc in &series {
            assert_eq!(doc["0020000D"], json!({"vr": "UI", "Value": ["1.2"]}));
            assert_eq!(doc["00080060"], json!({"vr": "CS", "Value": ["CT"]}));
            assert_eq!(doc["00201209"], json!({"vr": "IS", "Value": ["1"]}));
        }

        // Case-insensitive modality filter.
        let filter = SeriesFilter {
            modality: Some("ct".into()),
            ..Default::default()
        };
        assert_eq!(idx.query_series("1.2", &filter).len(), 2);

        let filter = SeriesFilter {
            modality: Some("MR".into()),
            ..Default::default()
        };
        assert!(idx.query_series("1.2", &filter).is_empty());

        // Unknown study is an empty result, not an error.
        assert!(idx.query_series("no.such", &SeriesFilter::default()).is_empty());
    }

    #[test]
    fn instance_metadata_maps_each_matching_file() {
        let temp = TempDir::new().unwrap();
        seed_two_studies(temp.path());
        let idx = index(temp.path());

        let documents = idx.instance_metadata("1.2", "1.2.1", None, BASE);
        assert_eq!(documents.len(), 1);
        assert_eq!(
            documents[0]["00080018"],
            json!({"vr": "UI", "Value": ["1.2.1.1"]})
        );

        // SOP filter narrows to nothing for an unknown instance.
        assert!(idx
            .instance_metadata("1.2", "1.2.1", Some("nope"), BASE)
            .is_empty());

        // Missing series directory is a valid empty result.
        assert!(idx.instance_metadata("1.2", "9.9.9", None, BASE).is_empty());
    }

    #[test]
    fn corrupt_files_are_skipped_not_fatal() {
        let temp = TempDir::new().unwrap();
        seed_two_studies(temp.path());
        std::fs::write(temp.path().join("1.2/1.2.1/broken.dcm"), b"not dicom").unwrap();
        let idx = index(temp.path());

        let documents = idx.instance_metadata("1.2", "1.2.1", None, BASE);
        assert_eq!(documents.len(), 1);

        let studies = idx.query_studies(&StudyFilter::default(), BASE);
        assert_eq!(studies.len(), 2);
    }

    #[test]
    fn open_instance_distinguishes_missing_from_unreadable() {
        let temp = TempDir::new().unwrap();
        seed_two_studies(temp.path());
        let idx = index(temp.path());

        let key = InstanceKey::new("1.2", "1.2.1", "1.2.1.1").unwrap();
        assert!(idx.open_instance(&key).unwrap().is_some());

        let missing = InstanceKey::new("1.2", "1.2.1", "no.such").unwrap();
        assert!(idx.open_instance(&missing).unwrap().is_none());

        std::fs::write(temp.path().join("1.2/1.2.1/9.9.dcm"), b"junk").unwrap();
        let broken = InstanceKey::new("1.2", "1.2.1", "9.9").unwrap();
        assert!(idx.open_instance(&broken).is_err());
    }

    #[test]
    fn study_metadata_spans_every_series() {
        let temp = TempDir::new().unwrap();
        seed_two_studies(temp.path());

        let documents = index(temp.path()).study_instance_metadata("1.2", BASE);
        assert_eq!(documents.len(), 2);
    }
}
