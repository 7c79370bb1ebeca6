//! # DWFS Core
//!
//! Core protocol adaptation logic for the DICOMweb filesystem server.
//!
//! This crate turns stored DICOM instances into DICOMweb responses and
//! multipart upload bodies into stored instances:
//! - DICOM-JSON attribute coercion and metadata mapping
//! - filesystem-backed study/series/instance queries
//! - frame extraction, VOI windowing and JPEG rendering
//! - multipart/related framing for retrieval and ingestion
//!
//! **No API concerns**: HTTP routing, content negotiation and status codes
//! belong in `api-rest`. Everything here is callable and testable without a
//! server.

pub mod config;
pub mod constants;
pub mod dicomjson;
pub mod error;
pub mod index;
pub mod ingest;
pub mod metadata;
pub mod multipart;
pub mod render;

#[cfg(test)]
pub(crate) mod testdata;

pub use config::CoreConfig;
pub use dwfs_store::{DicomStore, InstanceKey, StoreError, Uid};
pub use error::{ArchiveError, ArchiveResult};

/// The in-memory data set type produced by the decoder for every stored or
/// uploaded object.
pub type Dataset = dicom::object::InMemDicomObject<dicom::object::StandardDataDictionary>;
