//! Storage layout and filesystem enumeration.
//!
//! The store is intentionally thin: it owns path construction, lazy
//! directory creation, whole-study deletion and directory walking, and
//! nothing else. Reading and decoding the DICOM content of a stored file is
//! the caller's concern, which keeps this crate free of any codec
//! dependency and makes the scan-based index easy to replace later without
//! touching the rest of the system.

use crate::StoreError;
use dwfs_types::{Uid, UidError};
use std::fs;
use std::path::{Path, PathBuf};

/// File extension used for stored SOP instances (without the dot).
pub const DICOM_FILE_EXTENSION: &str = "dcm";

/// Fully-qualified address of one stored SOP instance.
///
/// The three UIDs are validated at construction, so a key is always safe to
/// join onto the storage root.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InstanceKey {
    study: Uid,
    series: Uid,
    sop: Uid,
}

impl InstanceKey {
    /// Creates a key from the three identifying UIDs.
    ///
    /// # Errors
    ///
    /// Returns `UidError` if any component is empty or not path-safe.
    pub fn new(
        study: impl AsRef<str>,
        series: impl AsRef<str>,
        sop: impl AsRef<str>,
    ) -> Result<Self, UidError> {
        Ok(Self {
            study: Uid::new(study)?,
            series: Uid::new(series)?,
            sop: Uid::new(sop)?,
        })
    }

    pub fn study(&self) -> &Uid {
        &self.study
    }

    pub fn series(&self) -> &Uid {
        &self.series
    }

    pub fn sop(&self) -> &Uid {
        &self.sop
    }
}

/// Filesystem store for DICOM instances.
///
/// The store is stateless apart from the root path; construction performs no
/// I/O. All enumeration methods are snapshot-free live reads: a directory
/// that vanishes mid-walk (a concurrent study deletion) is treated as empty
/// rather than as an error.
#[derive(Debug, Clone)]
pub struct DicomStore {
    root: PathBuf,
}

impl DicomStore {
    /// Creates a store rooted at `root`. The directory does not need to
    /// exist yet; it is created on first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding every series of a study.
    pub fn study_dir(&self, study: &Uid) -> PathBuf {
        self.root.join(study.as_str())
    }

    /// Directory holding every instance of a series.
    pub fn series_dir(&self, study: &Uid, series: &Uid) -> PathBuf {
        self.study_dir(study).join(series.as_str())
    }

    /// Path at which the instance addressed by `key` is (or would be) stored.
    pub fn instance_path(&self, key: &InstanceKey) -> PathBuf {
        self.series_dir(key.study(), key.series())
            .join(format!("{}.{}", key.sop(), DICOM_FILE_EXTENSION))
    }

    /// Returns the instance path after creating its parent directories.
    ///
    /// This is the write-side entry point: directories appear lazily on the
    /// first instance of a study or series. Writing to the returned path
    /// overwrites any previous instance with the same key (last writer
    /// wins).
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Io` if directory creation fails.
    pub fn prepare_instance_path(&self, key: &InstanceKey) -> Result<PathBuf, StoreError> {
        let dir = self.series_dir(key.study(), key.series());
        fs::create_dir_all(&dir)?;
        Ok(self.instance_path(key))
    }

    /// Whether a study directory exists.
    pub fn study_exists(&self, study: &Uid) -> bool {
        self.study_dir(study).is_dir()
    }

    /// Removes a study and everything under it.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NotFound` if the study directory does not
    /// exist, or `StoreError::Io` if removal fails partway.
    pub fn delete_study(&self, study: &Uid) -> Result<(), StoreError> {
        let dir = self.study_dir(study);
        if !dir.is_dir() {
            return Err(StoreError::NotFound(format!("study {study}")));
        }
        fs::remove_dir_all(&dir)?;
        tracing::info!("deleted study directory {}", dir.display());
        Ok(())
    }

    /// All study directories, in directory enumeration order.
    pub fn study_dirs(&self) -> Vec<PathBuf> {
        subdirectories(&self.root)
    }

    /// All series directories of a study, in directory enumeration order.
    pub fn series_dirs(&self, study: &Uid) -> Vec<PathBuf> {
        subdirectories(&self.study_dir(study))
    }

    /// DICOM files directly inside `dir`, in directory enumeration order.
    pub fn instance_files_in(&self, dir: &Path) -> Vec<PathBuf> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!("cannot enumerate {}: {err}", dir.display());
                return Vec::new();
            }
        };
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext == DICOM_FILE_EXTENSION)
            })
            .collect()
    }

    /// Every instance file under a study, series by series.
    pub fn walk_study(&self, study: &Uid) -> Vec<PathBuf> {
        self.series_dirs(study)
            .iter()
            .flat_map(|series_dir| self.instance_files_in(series_dir))
            .collect()
    }

    /// Every instance file in the archive, study by study.
    pub fn walk_all(&self) -> Vec<PathBuf> {
        self.study_dirs()
            .iter()
            .flat_map(|study_dir| {
                subdirectories(study_dir)
                    .iter()
                    .flat_map(|series_dir| self.instance_files_in(series_dir))
                    .collect::<Vec<_>>()
            })
            .collect()
    }
}

fn subdirectories(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::debug!("cannot enumerate {}: {err}", dir.display());
            return Vec::new();
        }
    };
    entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect()
}
