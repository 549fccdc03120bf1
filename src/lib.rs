//! Docmirror: an offline Markdown mirror of a cloud document workspace
//!
//! This crate discovers the tree of documents reachable from a root URL of a
//! hosted document workspace, then exports every reachable document as
//! Markdown to a local directory. Discovery and export are separate phases
//! joined by a JSON manifest, so a crawl can be inspected (or version
//! controlled) before anything is written.

pub mod api;
pub mod config;
pub mod discover;
pub mod export;
pub mod progress;
pub mod render;
pub mod resource;

use thiserror::Error;

/// Main error type for docmirror operations
///
/// Per-item failures during a crawl or export never surface here; they are
/// recorded as warnings on the phase summary. Only structural problems
/// (invalid root URL, unreadable manifest, I/O on the output root) abort a
/// phase.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("Invalid root URL: {0}")]
    InvalidRootUrl(String),

    #[error("API error: {0}")]
    Api(#[from] api::ApiError),

    #[error("Manifest error: {0}")]
    Manifest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),
}

/// Result type alias for docmirror operations
pub type Result<T> = std::result::Result<T, MirrorError>;

// Re-export commonly used types
pub use api::ApiClient;
pub use config::{ApiConfig, DiscoverConfig, MirrorConfig};
pub use discover::{discover, DiscoverResult, DocumentItem};
pub use export::{plan_export, run_export, ExportSummary, PlanEntry};
pub use progress::{NoopProgress, ProgressObserver};
pub use render::render;
pub use resource::{parse_resource_url, ResourceKind, ResourceRef};
