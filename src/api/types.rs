use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::time::Instant;

/// Seconds subtracted from the server-declared TTL before a cached token is
/// considered expired
const TOKEN_EXPIRY_MARGIN_SECS: i64 = 120;

/// Minimum lifetime granted to a cached token regardless of the margin
const TOKEN_MIN_LIFETIME_SECS: i64 = 60;

/// Top-level response envelope shared by all service endpoints
///
/// Only `code`, `msg` and `data` are interpreted; every other key is
/// tolerated and captured so that "flat" responses (payload fields beside the
/// status fields instead of under `data`) can still be unwrapped.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub code: i64,

    #[serde(default)]
    pub msg: String,

    #[serde(default)]
    pub data: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Envelope {
    /// Unwraps the payload: the explicit `data` field when present, otherwise
    /// the envelope's non-status fields
    pub fn into_data(self) -> Value {
        match self.data {
            Some(data) => data,
            None => Value::Object(self.extra),
        }
    }
}

/// One page of a paginated response
///
/// Items arrive under either `items` or `files` depending on the endpoint.
#[derive(Debug, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub items: Option<Vec<Value>>,

    #[serde(default)]
    pub files: Option<Vec<Value>>,

    #[serde(default)]
    pub has_more: bool,

    #[serde(default)]
    pub page_token: Option<String>,
}

impl Page {
    pub fn into_items(self) -> Vec<Value> {
        self.items.or(self.files).unwrap_or_default()
    }
}

/// A cached process-wide tenant credential
#[derive(Debug, Clone)]
pub struct TenantAccessToken {
    pub token: String,
    pub expires_at: Instant,
}

impl TenantAccessToken {
    /// Builds a cached token from the server-declared TTL in seconds,
    /// shaving the expiry margin but never dropping below the lifetime floor
    pub fn from_ttl(token: String, ttl_secs: i64) -> Self {
        let lifetime = (ttl_secs - TOKEN_EXPIRY_MARGIN_SECS).max(TOKEN_MIN_LIFETIME_SECS);
        Self {
            token,
            expires_at: Instant::now() + Duration::from_secs(lifetime as u64),
        }
    }

    pub fn is_valid(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Raw token issuance response (a flat envelope: the payload sits beside the
/// status fields)
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub tenant_access_token: String,
    pub expire: i64,
}

/// Document metadata payload
#[derive(Debug, Deserialize)]
pub struct DocumentMeta {
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DocumentMetaData {
    pub document: DocumentMeta,
}

/// Raw content payload
#[derive(Debug, Deserialize)]
pub struct RawContentData {
    #[serde(default)]
    pub content: String,
}

/// A normalized wiki node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WikiNode {
    pub node_token: String,
    pub parent_node_token: Option<String>,
    pub space_id: Option<String>,
    pub title: Option<String>,
    pub obj_type: Option<String>,
    pub obj_token: Option<String>,
    pub has_child: Option<bool>,
}

impl WikiNode {
    /// Normalizes a raw node value; fails when the primary token is missing
    pub fn from_value(value: &Value) -> Option<Self> {
        let node_token = non_empty_str(value.get("node_token"))?;
        Some(Self {
            node_token,
            parent_node_token: non_empty_str(value.get("parent_node_token")),
            space_id: space_id(value),
            title: non_empty_str(value.get("title")),
            obj_type: non_empty_str(value.get("obj_type")),
            obj_token: non_empty_str(value.get("obj_token")),
            has_child: value.get("has_child").and_then(Value::as_bool),
        })
    }
}

/// Space ids are serialized as either strings or integers across deployments
fn space_id(value: &Value) -> Option<String> {
    match value.get("space_id") {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
