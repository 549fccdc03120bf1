use serde::{Deserialize, Serialize};
use url::Url;

/// The content types the remote workspace exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceKind {
    /// A document page with a block body
    #[serde(rename = "docx")]
    DocPage,
    /// A wiki node, possibly wrapping an underlying object
    #[serde(rename = "wiki")]
    WikiNode,
    /// A spreadsheet
    #[serde(rename = "sheet")]
    Sheet,
    /// A structured base
    #[serde(rename = "base")]
    Base,
    /// A slide deck
    #[serde(rename = "slides")]
    Slides,
    /// Anything not recognized
    #[serde(rename = "unknown")]
    Unknown,
}

impl ResourceKind {
    /// Parses a URL path segment into a kind, normalizing aliases
    /// (`docs` → docx, `sheets` → sheet, `bitable` → base)
    pub fn from_segment(segment: &str) -> Self {
        match segment {
            "docx" | "docs" => Self::DocPage,
            "wiki" => Self::WikiNode,
            "sheet" | "sheets" => Self::Sheet,
            "base" | "bitable" => Self::Base,
            "slides" => Self::Slides,
            _ => Self::Unknown,
        }
    }

    /// Maps a wiki node's declared object type onto a kind
    pub fn from_obj_type(obj_type: &str) -> Self {
        match obj_type {
            "doc" | "docx" => Self::DocPage,
            "sheet" => Self::Sheet,
            "bitable" => Self::Base,
            "slides" => Self::Slides,
            _ => Self::Unknown,
        }
    }

    /// The canonical path segment for this kind
    pub fn segment(&self) -> &'static str {
        match self {
            Self::DocPage => "docx",
            Self::WikiNode => "wiki",
            Self::Sheet => "sheet",
            Self::Base => "base",
            Self::Slides => "slides",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.segment())
    }
}

/// A parsed reference to one workspace resource
///
/// Immutable once parsed. The identity key (`kind:token`) deduplicates the
/// same resource reached through different URLs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub token: String,
    /// Canonical URL: `origin/kind/token`, query and fragment dropped
    pub url: String,
}

impl ResourceRef {
    /// Identity key for deduplication: `kind:token`
    pub fn id(&self) -> String {
        format!("{}:{}", self.kind.segment(), self.token)
    }
}

/// Parses a workspace URL into a resource reference
///
/// Accepts only http(s) URLs whose host matches one of the known domain
/// suffixes and whose path starts with a recognized kind segment followed by
/// a token. Returns `None` for anything else; the caller decides whether that
/// is a warning or a fatal error.
pub fn parse_resource_url(raw: &str, domains: &[String]) -> Option<ResourceRef> {
    let url = Url::parse(raw.trim()).ok()?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    let host = url.host_str()?;
    if !host_matches(host, domains) {
        return None;
    }

    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());
    let kind = ResourceKind::from_segment(segments.next()?);
    if kind == ResourceKind::Unknown {
        return None;
    }

    let token = segments.next()?;
    if token.is_empty() {
        return None;
    }

    let canonical = format!(
        "{}://{}/{}/{}",
        url.scheme(),
        host,
        kind.segment(),
        token
    );

    Some(ResourceRef {
        kind,
        token: token.to_string(),
        url: canonical,
    })
}

/// Checks a host against the configured domain suffixes
fn host_matches(host: &str, domains: &[String]) -> bool {
    let host = host.to_lowercase();
    domains.iter().any(|d| {
        let d = d.to_lowercase();
        host == d || host.ends_with(&format!(".{}", d))
    })
}
