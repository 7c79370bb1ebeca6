//! Dataset to DICOM-JSON metadata mapping.
//!
//! [`MetadataMapper`] walks a decoded data set and produces the tag-keyed
//! DICOM-JSON document served by the query and metadata endpoints. The base
//! URL for BulkDataURI construction is passed in at construction rather than
//! read from any ambient request context, so the mapper is pure and
//! testable in isolation.

use crate::constants::{DOCUMENT_MODALITY, ENCAPSULATED_PDF_SOP_CLASS_UID, MAX_SEQUENCE_DEPTH};
use crate::dicomjson;
use crate::{ArchiveError, ArchiveResult, Dataset, InstanceKey};
use dicom::core::header::Header;
use dicom::core::value::Value;
use dicom::core::{Tag, VR};
use dicom::dictionary_std::tags;
use serde_json::{json, Value as Json};

/// A DICOM-JSON metadata document: 8-hex-digit tag keys mapping to
/// `{vr, Value}` or `{vr, BulkDataURI}` attribute objects.
pub type MetadataDocument = serde_json::Map<String, Json>;

/// The 8-hex-digit uppercase DICOM-JSON key of a tag.
pub fn tag_key(tag: Tag) -> String {
    format!("{:04X}{:04X}", tag.group(), tag.element())
}

/// Build a `{vr, Value}` attribute object around an already-coerced array.
pub fn json_attribute(vr: impl AsRef<str>, values: Json) -> Json {
    json!({ "vr": vr.as_ref(), "Value": values })
}

/// Build a single-valued string attribute object.
pub fn string_attribute(vr: &str, value: &str) -> Json {
    json!({ "vr": vr, "Value": [value] })
}

/// Read a trimmed, non-empty string value of an attribute, if present.
pub fn element_str(dataset: &Dataset, tag: Tag) -> Option<String> {
    dataset
        .element(tag)
        .ok()
        .and_then(|element| element.to_str().ok())
        .map(|value| value.trim().trim_end_matches('\0').to_string())
        .filter(|value| !value.is_empty())
}

/// SOP class UID declared by the data set, if any.
pub fn sop_class_uid(dataset: &Dataset) -> Option<String> {
    element_str(dataset, tags::SOP_CLASS_UID)
}

/// Whether the data set is an encapsulated PDF document object.
pub fn is_encapsulated_pdf(dataset: &Dataset) -> bool {
    sop_class_uid(dataset).as_deref() == Some(ENCAPSULATED_PDF_SOP_CLASS_UID)
}

/// The modality to report for a data set: encapsulated documents always
/// surface the fixed document code, everything else its own Modality value.
pub fn effective_modality(dataset: &Dataset) -> Option<String> {
    if is_encapsulated_pdf(dataset) {
        return Some(DOCUMENT_MODALITY.to_string());
    }
    element_str(dataset, tags::MODALITY)
}

/// Maps decoded data sets to DICOM-JSON metadata documents.
pub struct MetadataMapper<'a> {
    base_url: &'a str,
}

impl<'a> MetadataMapper<'a> {
    /// Create a mapper that qualifies bulk-data URIs against `base_url`
    /// (scheme and authority, no trailing slash).
    pub fn new(base_url: &'a str) -> Self {
        Self { base_url }
    }

    /// Map a full instance data set into its metadata document.
    ///
    /// Pixel data is replaced by a BulkDataURI pointing at the instance's
    /// bulk-data endpoint; sequences are mapped recursively; the three
    /// identifying UIDs are guaranteed present, filled from the storage key
    /// when the data set itself omits them; encapsulated documents get the
    /// modality override applied last.
    ///
    /// # Errors
    ///
    /// Returns `ArchiveError::SequenceDepthExceeded` when sequence nesting
    /// goes beyond [`MAX_SEQUENCE_DEPTH`]; individual attributes that fail
    /// coercion are dropped, they never fail the document.
    pub fn map_instance(
        &self,
        dataset: &Dataset,
        transfer_syntax: &str,
        key: &InstanceKey,
    ) -> ArchiveResult<MetadataDocument> {
        let mut document = MetadataDocument::new();
        document.insert(
            "00020010".to_string(),
            string_attribute("UI", transfer_syntax),
        );

        for element in dataset.iter() {
            let tag = element.tag();
            let vr = element.vr();

            if tag == tags::PIXEL_DATA {
                document.insert(
                    tag_key(tag),
                    json!({
                        "vr": vr.to_string(),
                        "BulkDataURI": self.bulk_data_uri(key),
                    }),
                );
                continue;
            }

            if vr == VR::SQ {
                if let Value::Sequence(sequence) = element.value() {
                    let items = self.map_items(sequence.items(), 1)?;
                    if !items.is_empty() {
                        document
                            .insert(tag_key(tag), json_attribute("SQ", Json::Array(items)));
                    }
                }
                continue;
            }

            if let Some(values) = dicomjson::coerce(vr, element.value()) {
                document.insert(tag_key(tag), json_attribute(vr.to_string(), values));
            }
        }

        // The identifying triple must be answerable even for objects that
        // omit it; the storage key is the backstop.
        document
            .entry("00080018".to_string())
            .or_insert_with(|| string_attribute("UI", key.sop().as_str()));
        document
            .entry("0020000D".to_string())
            .or_insert_with(|| string_attribute("UI", key.study().as_str()));
        document
            .entry("0020000E".to_string())
            .or_insert_with(|| string_attribute("UI", key.series().as_str()));

        if is_encapsulated_pdf(dataset) {
            document.insert(
                tag_key(tags::MODALITY),
                string_attribute("CS", DOCUMENT_MODALITY),
            );
        }

        Ok(document)
    }

    /// Map the representative attributes of an object for study-level query
    /// results: plain coercion per attribute, sequences skipped, with the
    /// document modality override applied.
    pub fn map_summary(&self, dataset: &Dataset) -> MetadataDocument {
        let mut document = MetadataDocument::new();

        for element in dataset.iter() {
            let vr = element.vr();
            if vr == VR::SQ {
                continue;
            }
            if let Some(values) = dicomjson::coerce(vr, element.value()) {
                document.insert(tag_key(element.tag()), json_attribute(vr.to_string(), values));
            }
        }

        if is_encapsulated_pdf(dataset) {
            document.insert(
                tag_key(tags::MODALITY),
                string_attribute("CS", DOCUMENT_MODALITY),
            );
        }

        document
    }

    fn map_items(&self, items: &[Dataset], depth: usize) -> ArchiveResult<Vec<Json>> {
        if depth > MAX_SEQUENCE_DEPTH {
            return Err(ArchiveError::SequenceDepthExceeded(MAX_SEQUENCE_DEPTH));
        }

        let mut mapped = Vec::new();
        for item in items {
            let mut item_document = MetadataDocument::new();
            for element in item.iter() {
                let vr = element.vr();
                if vr == VR::SQ {
                    if let Value::Sequence(sequence) = element.value() {
                        let nested = self.map_items(sequence.items(), depth + 1)?;
                        if !nested.is_empty() {
                            item_document.insert(
                                tag_key(element.tag()),
                                json_attribute("SQ", Json::Array(nested)),
                            );
                        }
                    }
                    continue;
                }
                // Bulk-data substitution does not apply inside items: binary
                // attributes coerce to their empty-array form instead.
                if let Some(values) = dicomjson::coerce(vr, element.value()) {
                    item_document
                        .insert(tag_key(element.tag()), json_attribute(vr.to_string(), values));
                }
            }
            if !item_document.is_empty() {
                mapped.push(Json::Object(item_document));
            }
        }
        Ok(mapped)
    }

    fn bulk_data_uri(&self, key: &InstanceKey) -> String {
        format!(
            "{}/dicomweb/studies/{}/series/{}/instances/{}/bulk/7fe00010",
            self.base_url,
            key.study(),
            key.series(),
            key.sop()
        )
    }
}
