//! Progress events emitted by the discovery and export phases
//!
//! These events are the only observable side channel of the core; a CLI or
//! UI layer consumes them to render spinners and counters. The core never
//! looks at how (or whether) they are rendered.

use crate::resource::ResourceKind;
use serde::Serialize;
use std::path::PathBuf;

/// Per-item outcome during discovery
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoverStatus {
    Processing,
    Success,
    Skip,
    Warning,
    Error,
}

/// Per-item outcome during export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportStatus {
    Processing,
    Success,
    Skip,
    Error,
}

/// One discovery progress event
#[derive(Debug, Clone, Serialize)]
pub struct DiscoverEvent {
    pub status: DiscoverStatus,
    pub sequence: u64,
    pub url: String,
    pub depth: u32,
    pub kind: Option<ResourceKind>,
    pub id: Option<String>,
    pub title: Option<String>,
    pub message: String,
    /// Documents discovered so far
    pub discovered: usize,
    /// Warnings recorded so far
    pub warnings: usize,
}

/// One export progress event
#[derive(Debug, Clone, Serialize)]
pub struct ExportEvent {
    pub status: ExportStatus,
    pub sequence: u64,
    pub id: String,
    pub message: String,
    pub target_path: Option<PathBuf>,
    pub written: usize,
    pub skipped: usize,
    pub warnings: usize,
}

/// Observer for phase progress; all methods default to no-ops
pub trait ProgressObserver {
    fn on_discover(&mut self, _event: &DiscoverEvent) {}
    fn on_export(&mut self, _event: &ExportEvent) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressObserver for NoopProgress {}
