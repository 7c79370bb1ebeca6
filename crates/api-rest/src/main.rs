//! Standalone REST API server binary.
//!
//! ## Purpose
//! Runs the DICOMweb REST server on its own.
//!
//! ## Intended use
//! This binary is useful for development and debugging when you only want
//! the REST server without the production wiring. The workspace's main
//! `dwfs-run` binary is the deployable entry point.

use dwfs_core::CoreConfig;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the standalone DICOMweb REST API server.
///
/// # Environment Variables
/// - `DWFS_REST_ADDR`: Server address (default: "0.0.0.0:5152")
/// - `DWFS_STORAGE_DIR`: Archive root directory (default: "dicom-storage")
/// - `DWFS_PUBLIC_BASE_URL`: Base URL for retrieval links when a request
///   carries no Host header (default: "http://localhost:5152")
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the configuration is invalid, or
/// - the server address cannot be bound or the HTTP server fails.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("DWFS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:5152".into());
    let cfg = CoreConfig::resolve(
        std::env::var("DWFS_STORAGE_DIR").ok(),
        std::env::var("DWFS_PUBLIC_BASE_URL").ok(),
    )?;

    tracing::info!("-- Starting DICOMweb REST API on {}", addr);

    api_rest::serve(&addr, Arc::new(cfg)).await
}
