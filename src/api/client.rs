use crate::api::limiter::RateLimiter;
use crate::api::types::{
    DocumentMetaData, Envelope, Page, RawContentData, TenantAccessToken, TokenResponse, WikiNode,
};
use crate::api::{ApiError, ApiResult, DocumentMeta};
use crate::config::ApiConfig;
use rand::Rng;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

/// Envelope code the service uses to signal a request-frequency limit
const RATE_LIMIT_CODE: i64 = 99991400;

/// Failure-message signature that allows advancing to the next wiki node
/// lookup candidate. Tied to the service's observed error text, so treated as
/// a best-effort compatibility shim.
const FIELD_VALIDATION_SIGNATURE: &str = "field validation";

const TOKEN_PATH: &str = "/open-apis/auth/v3/tenant_access_token/internal";
const WIKI_GET_NODE_PATH: &str = "/open-apis/wiki/v2/spaces/get_node";

/// A file fetched from the drive download endpoint
#[derive(Debug, Clone)]
pub struct DownloadedFile {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
    /// Filename from the content-disposition header, when present
    pub file_name: Option<String>,
}

/// Single-flight HTTP client for the remote document service
///
/// One instance per crawl/export invocation owns the rate limiter, the token
/// cache and the request sequence counter; all call sites borrow it mutably,
/// so requests are serialized by construction.
pub struct ApiClient {
    http: Client,
    config: ApiConfig,
    limiter: RateLimiter,
    token: Option<TenantAccessToken>,
    sequence: u64,
}

impl ApiClient {
    pub fn new(config: ApiConfig) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .gzip(true)
            .brotli(true)
            .build()?;

        let limiter = RateLimiter::new(Duration::from_millis(config.min_request_interval_ms));

        Ok(Self {
            http,
            config,
            limiter,
            token: None,
            sequence: 0,
        })
    }

    /// Number of HTTP requests issued so far
    pub fn request_count(&self) -> u64 {
        self.sequence
    }

    /// Returns the cached tenant token, refreshing it when consumed past its
    /// margin-adjusted expiry
    async fn ensure_token(&mut self) -> ApiResult<String> {
        if let Some(token) = &self.token {
            if token.is_valid() {
                return Ok(token.token.clone());
            }
        }

        tracing::debug!("Refreshing tenant access token");
        let body = json!({
            "app_id": self.config.app_id,
            "app_secret": self.config.app_secret,
        });
        let data = self
            .attempt(Method::POST, TOKEN_PATH, &[], Some(&body), None)
            .await?;
        let response: TokenResponse = decode(TOKEN_PATH, data)?;

        let token = TenantAccessToken::from_ttl(response.tenant_access_token, response.expire);
        let value = token.token.clone();
        self.token = Some(token);
        Ok(value)
    }

    /// Issues an authenticated request through the limiter and the retry
    /// driver, returning the unwrapped envelope payload
    ///
    /// The bearer token is resolved per attempt, so a token that expires
    /// mid-backoff is refreshed before the retry.
    async fn request_data(
        &mut self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> ApiResult<Value> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let result = match self.ensure_token().await {
                Ok(bearer) => {
                    self.attempt(method.clone(), path, query, body, Some(&bearer))
                        .await
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(data) => return Ok(data),
                Err(e) if e.is_retriable() && attempt < self.config.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        "Retriable failure on {} (attempt {}/{}): {}; backing off {:?}",
                        path,
                        attempt,
                        self.config.max_retries,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retriable() => {
                    return Err(ApiError::RetriesExhausted {
                        endpoint: path.to_string(),
                        attempts: attempt,
                        last: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// One request attempt: limiter slot, HTTP call, envelope validation
    async fn attempt(
        &mut self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> ApiResult<Value> {
        self.limiter.acquire().await;
        self.sequence += 1;

        let url = format!("{}{}", self.config.base_url, path);
        let mut request = self.http.request(method, &url);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(source) => {
                return Err(match source.status() {
                    Some(status) if status == StatusCode::TOO_MANY_REQUESTS => {
                        self.rate_limit_cooldown().await;
                        ApiError::RateLimited {
                            endpoint: path.to_string(),
                            message: source.to_string(),
                        }
                    }
                    Some(status) if status.is_server_error() => ApiError::Server {
                        endpoint: path.to_string(),
                        status: status.as_u16(),
                    },
                    _ => ApiError::Transport {
                        endpoint: path.to_string(),
                        source,
                    },
                });
            }
        };

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            self.rate_limit_cooldown().await;
            return Err(ApiError::RateLimited {
                endpoint: path.to_string(),
                message: format!("HTTP {}", status),
            });
        }
        if status.is_server_error() {
            return Err(ApiError::Server {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }

        let envelope: Envelope = response.json().await.map_err(|e| ApiError::Envelope {
            endpoint: path.to_string(),
            message: e.to_string(),
        })?;

        if envelope.code != 0 {
            if envelope.code == RATE_LIMIT_CODE {
                self.rate_limit_cooldown().await;
                return Err(ApiError::RateLimited {
                    endpoint: path.to_string(),
                    message: envelope.msg,
                });
            }
            return Err(ApiError::Service {
                endpoint: path.to_string(),
                code: envelope.code,
                message: envelope.msg,
            });
        }

        Ok(envelope.into_data())
    }

    /// Randomized cooldown applied before a rate-limit failure is surfaced to
    /// the retry driver. Drawn from a wider range than the limiter spacing.
    async fn rate_limit_cooldown(&self) {
        let min = self.config.rate_limit_cooldown_min_ms;
        let max = self.config.rate_limit_cooldown_max_ms.max(min + 1);
        let delay = rand::thread_rng().gen_range(min..max);
        tracing::debug!("Rate limited; cooling down {}ms", delay);
        tokio::time::sleep(Duration::from_millis(delay)).await;
    }

    /// Exponential backoff with jitter, clamped to the configured ceiling
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = self
            .config
            .retry_base_delay_ms
            .saturating_mul(1u64 << (attempt - 1).min(16));
        let capped = exp.min(self.config.retry_max_delay_ms);
        let half = (capped / 2).max(1);
        let jittered = half + rand::thread_rng().gen_range(0..half);
        Duration::from_millis(jittered.max(self.config.retry_base_delay_ms / 2))
    }

    /// Fetches document metadata (title)
    pub async fn get_document_meta(&mut self, token: &str) -> ApiResult<DocumentMeta> {
        let path = format!("/open-apis/docx/v1/documents/{}", token);
        let data = self.request_data(Method::GET, &path, &[], None).await?;
        let meta: DocumentMetaData = decode(&path, data)?;
        Ok(meta.document)
    }

    /// Lists every block of a document, following pagination to the end
    pub async fn get_document_blocks(&mut self, token: &str) -> ApiResult<Vec<Value>> {
        let path = format!("/open-apis/docx/v1/documents/{}/blocks", token);
        self.paged_items(&path, Vec::new()).await
    }

    /// Fetches the plain-text rendition of a document
    pub async fn get_raw_content(&mut self, token: &str) -> ApiResult<String> {
        let path = format!("/open-apis/docx/v1/documents/{}/raw_content", token);
        let data = self.request_data(Method::GET, &path, &[], None).await?;
        let raw: RawContentData = decode(&path, data)?;
        Ok(raw.content)
    }

    /// Looks up a wiki node, trying the query encodings accepted by different
    /// deployments of the node-lookup endpoint in a fixed order
    ///
    /// Advances to the next candidate only when the failure message carries
    /// the field-validation signature; any other failure aborts immediately.
    /// When every candidate fails, the error aggregates all of them.
    pub async fn get_wiki_node(&mut self, token: &str) -> ApiResult<WikiNode> {
        let candidates: [Vec<(String, String)>; 3] = [
            vec![("token".to_string(), token.to_string())],
            vec![
                ("token".to_string(), token.to_string()),
                ("obj_type".to_string(), "wiki".to_string()),
            ],
            vec![("node_token".to_string(), token.to_string())],
        ];

        let mut failures = Vec::new();
        for (index, query) in candidates.iter().enumerate() {
            match self
                .request_data(Method::GET, WIKI_GET_NODE_PATH, query, None)
                .await
            {
                Ok(data) => {
                    let raw = data.get("node").cloned().unwrap_or(data);
                    match WikiNode::from_value(&raw) {
                        Some(node) => return Ok(node),
                        None => {
                            failures.push(format!(
                                "candidate {}: node payload missing node_token",
                                index + 1
                            ));
                        }
                    }
                }
                Err(e) => {
                    let advances = matches!(
                        &e,
                        ApiError::Service { message, .. }
                            if message.to_lowercase().contains(FIELD_VALIDATION_SIGNATURE)
                    );
                    if !advances {
                        return Err(e);
                    }
                    tracing::debug!(
                        "Node lookup candidate {} rejected for {}: {}",
                        index + 1,
                        token,
                        e
                    );
                    failures.push(format!("candidate {}: {}", index + 1, e));
                }
            }
        }

        Err(ApiError::NodeLookup {
            token: token.to_string(),
            attempts: failures.join("; "),
        })
    }

    /// Lists the child nodes of a wiki node within a space
    pub async fn list_wiki_child_nodes(
        &mut self,
        space_id: &str,
        parent_token: &str,
    ) -> ApiResult<Vec<WikiNode>> {
        let path = format!("/open-apis/wiki/v2/spaces/{}/nodes", space_id);
        let items = self
            .paged_items(
                &path,
                vec![("parent_node_token".to_string(), parent_token.to_string())],
            )
            .await?;
        Ok(items.iter().filter_map(WikiNode::from_value).collect())
    }

    /// Downloads a drive file, returning its bytes plus the content-type and
    /// content-disposition filename headers
    pub async fn download_file(&mut self, token: &str) -> ApiResult<DownloadedFile> {
        let path = format!("/open-apis/drive/v1/files/{}/download", token);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match self.ensure_token().await {
                Ok(bearer) => self.attempt_download(&path, &bearer).await,
                Err(e) => Err(e),
            };
            match result {
                Ok(file) => return Ok(file),
                Err(e) if e.is_retriable() && attempt < self.config.max_retries => {
                    let delay = self.backoff_delay(attempt);
                    tracing::warn!(
                        "Retriable download failure on {} (attempt {}): {}",
                        path,
                        attempt,
                        e
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) if e.is_retriable() => {
                    return Err(ApiError::RetriesExhausted {
                        endpoint: path,
                        attempts: attempt,
                        last: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn attempt_download(&mut self, path: &str, bearer: &str) -> ApiResult<DownloadedFile> {
        self.limiter.acquire().await;
        self.sequence += 1;

        let url = format!("{}{}", self.config.base_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(bearer)
            .send()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: path.to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            self.rate_limit_cooldown().await;
            return Err(ApiError::RateLimited {
                endpoint: path.to_string(),
                message: format!("HTTP {}", status),
            });
        }
        if status.is_server_error() {
            return Err(ApiError::Server {
                endpoint: path.to_string(),
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(ApiError::Service {
                endpoint: path.to_string(),
                code: status.as_u16() as i64,
                message: format!("HTTP {}", status),
            });
        }

        let content_type = header_str(&response, "content-type");
        let file_name = header_str(&response, "content-disposition")
            .as_deref()
            .and_then(disposition_filename);

        let bytes = response
            .bytes()
            .await
            .map_err(|source| ApiError::Transport {
                endpoint: path.to_string(),
                source,
            })?;

        Ok(DownloadedFile {
            bytes: bytes.to_vec(),
            content_type,
            file_name,
        })
    }

    /// Accumulates every item of a paginated endpoint
    ///
    /// Continues while the server reports more pages and supplies a next-page
    /// token; a "more" flag without a token terminates the loop instead of
    /// spinning on the same page.
    async fn paged_items(
        &mut self,
        path: &str,
        base_query: Vec<(String, String)>,
    ) -> ApiResult<Vec<Value>> {
        let mut out = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = base_query.clone();
            query.push(("page_size".to_string(), self.config.page_size.to_string()));
            if let Some(token) = &page_token {
                query.push(("page_token".to_string(), token.clone()));
            }

            let data = self.request_data(Method::GET, path, &query, None).await?;
            let page: Page = decode(path, data)?;

            let has_more = page.has_more;
            let next = page.page_token.clone();
            out.extend(page.into_items());

            if !has_more {
                break;
            }
            match next {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => {
                    tracing::warn!("{} reported more pages without a page token", path);
                    break;
                }
            }
        }

        Ok(out)
    }
}

/// Validates the unwrapped payload against an operation-specific shape
fn decode<T: DeserializeOwned>(endpoint: &str, data: Value) -> ApiResult<T> {
    serde_json::from_value(data).map_err(|e| ApiError::Shape {
        endpoint: endpoint.to_string(),
        message: e.to_string(),
    })
}

fn header_str(response: &reqwest::Response, name: &str) -> Option<String> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// Extracts the filename from a content-disposition header value
fn disposition_filename(value: &str) -> Option<String> {
    for part in value.split(';') {
        let part = part.trim();
        if let Some(rest) = part.strip_prefix("filename=") {
            let name = rest.trim_matches('"').trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
    }
    None
}
