//! DICOM instance storage
//!
//! This crate provides the filesystem layout for the DICOMweb filesystem
//! server: one Part-10 file per SOP instance, addressed by a three-level
//! study/series/instance hierarchy.
//!
//! ## Storage Layout
//!
//! ```text
//! <storage_root>/
//! └── <StudyInstanceUID>/
//!     └── <SeriesInstanceUID>/
//!         └── <SOPInstanceUID>.dcm
//! ```
//!
//! ## Design Principles
//!
//! - The filesystem is the database: no secondary index exists, queries
//!   enumerate the tree live
//! - A `(study, series, sop)` triple addresses exactly one file at a
//!   deterministic path; uniqueness is enforced only by placement
//! - Directories are created lazily on first write
//! - Concurrent writes to the same key are last-writer-wins; the store does
//!   not arbitrate them
//! - All path components are validated `Uid`s, so a stored key can never
//!   escape the storage root
//!
//! ## Example Usage
//!
//! ```no_run
//! use dwfs_store::{DicomStore, InstanceKey};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = DicomStore::new(Path::new("dicom-storage"));
//! let key = InstanceKey::new("1.2.3", "1.2.3.4", "1.2.3.4.5")?;
//! let path = store.prepare_instance_path(&key)?;
//! # Ok(())
//! # }
//! ```

mod store;

pub use dwfs_types::{Uid, UidError};
pub use store::{DicomStore, InstanceKey, DICOM_FILE_EXTENSION};

/// Errors that can occur during storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A study, series or instance path does not exist
    #[error("no such path in archive: {0}")]
    NotFound(String),

    /// Identifier failed path-safety validation
    #[error("invalid identifier: {0}")]
    Uid(#[from] dwfs_types::UidError),

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
