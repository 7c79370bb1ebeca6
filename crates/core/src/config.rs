//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process
//! startup and then passed into core services. The intent is to avoid
//! reading process-wide environment variables during request handling, which
//! can lead to inconsistent behaviour in multi-threaded runtimes and test
//! harnesses.

use crate::{ArchiveError, ArchiveResult, DicomStore};
use std::path::{Path, PathBuf};

/// Default storage root when none is configured.
pub const DEFAULT_STORAGE_DIR: &str = "dicom-storage";

/// Default base URL used for BulkDataURI and RetrieveURL construction when
/// a request carries no Host header.
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:5152";

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    storage_dir: PathBuf,
    public_base_url: String,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// The base URL is stored without a trailing slash so URL construction
    /// can join path segments uniformly.
    pub fn new(storage_dir: PathBuf, public_base_url: String) -> ArchiveResult<Self> {
        let public_base_url = public_base_url.trim().trim_end_matches('/').to_string();
        if public_base_url.is_empty() {
            return Err(ArchiveError::InvalidInput(
                "public_base_url cannot be empty".into(),
            ));
        }

        Ok(Self {
            storage_dir,
            public_base_url,
        })
    }

    /// Resolve configuration from optional environment values, applying
    /// defaults for anything unset or blank.
    pub fn resolve(
        storage_dir: Option<String>,
        public_base_url: Option<String>,
    ) -> ArchiveResult<Self> {
        let storage_dir = storage_dir
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_STORAGE_DIR.into());
        let public_base_url = public_base_url
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_PUBLIC_BASE_URL.into());

        Self::new(PathBuf::from(storage_dir), public_base_url)
    }

    pub fn storage_dir(&self) -> &Path {
        &self.storage_dir
    }

    pub fn public_base_url(&self) -> &str {
        &self.public_base_url
    }

    /// Store handle over the configured storage root.
    pub fn store(&self) -> DicomStore {
        DicomStore::new(&self.storage_dir)
    }
}
