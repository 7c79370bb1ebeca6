//! Main entry point for the DICOMweb filesystem server.
//!
//! Resolves configuration from the environment once at startup and serves
//! the REST API. Everything request-scoped receives its configuration
//! explicitly; no handler reads environment variables.

use dwfs_core::CoreConfig;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Start the DICOMweb archive server.
///
/// # Environment Variables
/// - `DWFS_REST_ADDR`: Server address (default: "0.0.0.0:5152")
/// - `DWFS_STORAGE_DIR`: Archive root directory (default: "dicom-storage")
/// - `DWFS_PUBLIC_BASE_URL`: Base URL for retrieval links when a request
///   carries no Host header (default: "http://localhost:5152")
///
/// # Errors
/// Returns an error if logging cannot be initialised, the configuration is
/// invalid, or the HTTP server fails to bind or run.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("dwfs_core=info".parse()?)
                .add_directive("dwfs_store=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let addr = std::env::var("DWFS_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:5152".into());
    let cfg = CoreConfig::resolve(
        std::env::var("DWFS_STORAGE_DIR").ok(),
        std::env::var("DWFS_PUBLIC_BASE_URL").ok(),
    )?;

    tracing::info!("-- Starting DICOMweb filesystem server on {}", addr);

    api_rest::serve(&addr, Arc::new(cfg)).await
}
