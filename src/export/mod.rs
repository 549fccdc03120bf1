//! Export phase: discovery manifest → Markdown file tree
//!
//! Planning is a pure function over the manifest, so the file layout of a
//! run can be computed (and tested) without touching the network or the
//! filesystem. The writer then fetches bodies and materializes the plan.

mod manifest;
mod planner;
mod writer;

pub use manifest::{read_manifest, write_manifest};
pub use planner::{plan_export, sanitize_path_segment, PlanEntry};
pub use writer::{run_export, ExportSummary};
