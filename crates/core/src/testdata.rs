//! Shared fixtures for core tests: small in-memory data sets and helpers to
//! persist them as Part-10 files the way a real archive would hold them.

use crate::metadata::element_str;
use crate::{Dataset, DicomStore, InstanceKey};
use dicom::core::{DataElement, PrimitiveValue, Tag, VR};
use dicom::dictionary_std::tags;
use dicom::object::mem::InMemElement;
use dicom::object::meta::FileMetaTableBuilder;
use dicom::object::{DefaultDicomObject, InMemDicomObject, StandardDataDictionary};
use std::path::Path;

pub const EXPLICIT_VR_LE: &str = "1.2.840.10008.1.2.1";
pub const SECONDARY_CAPTURE: &str = "1.2.840.10008.5.1.4.1.1.7";

pub type TestElement = InMemElement<StandardDataDictionary>;

pub fn str_element(tag: Tag, vr: VR, value: &str) -> TestElement {
    DataElement::new(tag, vr, PrimitiveValue::from(value))
}

fn u16_element(tag: Tag, value: u16) -> TestElement {
    DataElement::new(tag, VR::US, PrimitiveValue::from(value))
}

/// A small but complete image-less data set with the identifying triple and
/// the attributes the query filters look at.
pub fn minimal_dataset(study: &str, series: &str, sop: &str, modality: &str) -> Dataset {
    InMemDicomObject::from_element_iter([
        str_element(tags::SOP_CLASS_UID, VR::UI, SECONDARY_CAPTURE),
        str_element(tags::SOP_INSTANCE_UID, VR::UI, sop),
        str_element(tags::STUDY_INSTANCE_UID, VR::UI, study),
        str_element(tags::SERIES_INSTANCE_UID, VR::UI, series),
        str_element(tags::MODALITY, VR::CS, modality),
        str_element(tags::PATIENT_NAME, VR::PN, "Doe^Jane"),
        str_element(tags::PATIENT_ID, VR::LO, "P-1"),
        str_element(tags::STUDY_DATE, VR::DA, "20240102"),
        str_element(tags::SERIES_NUMBER, VR::IS, "1"),
        str_element(tags::SERIES_DESCRIPTION, VR::LO, "AXIAL"),
    ])
}

/// A 2×2, 8-bit, single-frame monochrome image data set.
pub fn pixel_dataset_8bit(study: &str, series: &str, sop: &str, pixels: &[u8]) -> Dataset {
    assert_eq!(pixels.len(), 4, "fixture is a 2x2 single-frame image");
    let mut dataset = minimal_dataset(study, series, sop, "OT");
    dataset.put(u16_element(tags::ROWS, 2));
    dataset.put(u16_element(tags::COLUMNS, 2));
    dataset.put(u16_element(tags::BITS_ALLOCATED, 8));
    dataset.put(u16_element(tags::BITS_STORED, 8));
    dataset.put(u16_element(tags::HIGH_BIT, 7));
    dataset.put(u16_element(tags::PIXEL_REPRESENTATION, 0));
    dataset.put(u16_element(tags::SAMPLES_PER_PIXEL, 1));
    dataset.put(str_element(
        tags::PHOTOMETRIC_INTERPRETATION,
        VR::CS,
        "MONOCHROME2",
    ));
    dataset.put(DataElement::new(
        tags::PIXEL_DATA,
        VR::OB,
        PrimitiveValue::U8(pixels.to_vec().into()),
    ));
    dataset
}

/// An encapsulated PDF document data set (no declared MIME type).
pub fn pdf_dataset(study: &str, series: &str, sop: &str, document: &[u8]) -> Dataset {
    let mut dataset = minimal_dataset(study, series, sop, "OT");
    dataset.put(str_element(
        tags::SOP_CLASS_UID,
        VR::UI,
        crate::constants::ENCAPSULATED_PDF_SOP_CLASS_UID,
    ));
    dataset.put(DataElement::new(
        tags::ENCAPSULATED_DOCUMENT,
        VR::OB,
        PrimitiveValue::U8(document.to_vec().into()),
    ));
    dataset
}

/// Wrap a data set in a file object with an explicit-VR-LE meta table.
pub fn file_object(dataset: Dataset) -> DefaultDicomObject {
    let sop_class =
        element_str(&dataset, tags::SOP_CLASS_UID).unwrap_or_else(|| SECONDARY_CAPTURE.to_string());
    file_object_with_class(dataset, &sop_class)
}

pub fn file_object_with_class(dataset: Dataset, sop_class: &str) -> DefaultDicomObject {
    let sop = element_str(&dataset, tags::SOP_INSTANCE_UID)
        .unwrap_or_else(|| "1.2.3.4".to_string());
    dataset
        .with_meta(
            FileMetaTableBuilder::new()
                .transfer_syntax(EXPLICIT_VR_LE)
                .media_storage_sop_class_uid(sop_class)
                .media_storage_sop_instance_uid(sop),
        )
        .expect("file meta construction for test object")
}

/// Persist a data set into the archive layout under `root`, deriving the
/// storage key from its own identifying attributes.
pub fn write_instance(root: &Path, dataset: Dataset) {
    let key = InstanceKey::new(
        element_str(&dataset, tags::STUDY_INSTANCE_UID).expect("study uid"),
        element_str(&dataset, tags::SERIES_INSTANCE_UID).expect("series uid"),
        element_str(&dataset, tags::SOP_INSTANCE_UID).expect("sop uid"),
    )
    .expect("valid test key");
    let store = DicomStore::new(root);
    let path = store.prepare_instance_path(&key).expect("series directory");
    file_object(dataset)
        .write_to_file(&path)
        .expect("write test instance");
}

/// Serialise a data set to Part-10 bytes, preamble included.
pub fn part10_bytes(dataset: Dataset) -> Vec<u8> {
    let dir = tempfile::tempdir().expect("scratch dir");
    let path = dir.path().join("part.dcm");
    file_object(dataset)
        .write_to_file(&path)
        .expect("write part");
    std::fs::read(&path).expect("read part back")
}
