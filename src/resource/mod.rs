//! Resource reference handling
//!
//! This module turns workspace URLs into typed resource references and
//! extracts embedded resource URLs from arbitrary nested payloads.

mod extract;
mod locator;

pub use extract::{extract_links, extract_links_from_text};
pub use locator::{parse_resource_url, ResourceKind, ResourceRef};
