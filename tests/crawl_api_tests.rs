//! API client and discovery tests against a mock service

use docmirror::api::{ApiClient, ApiError};
use docmirror::{discover, ApiConfig, DiscoverConfig, MirrorConfig, NoopProgress};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(base_url: &str) -> MirrorConfig {
    MirrorConfig {
        api: ApiConfig {
            base_url: base_url.to_string(),
            app_id: "cli_test".to_string(),
            app_secret: "secret".to_string(),
            min_request_interval_ms: 0,
            max_retries: 3,
            retry_base_delay_ms: 1,
            retry_max_delay_ms: 5,
            rate_limit_cooldown_min_ms: 1,
            rate_limit_cooldown_max_ms: 2,
            ..ApiConfig::default()
        },
        discover: DiscoverConfig {
            max_depth: 3,
            max_docs: 50,
        },
        domains: vec!["feishu.cn".to_string()],
    }
}

async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/open-apis/auth/v3/tenant_access_token/internal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "tenant_access_token": "t-test",
            "expire": 7200,
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_token_issued_once_and_cached() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/open-apis/auth/v3/tenant_access_token/internal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "tenant_access_token": "t-test",
            "expire": 7200,
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/D1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"document": {"title": "One"}},
        })))
        .mount(&server)
        .await;

    let mut client = ApiClient::new(test_config(&server.uri()).api).unwrap();
    let first = client.get_document_meta("D1").await.unwrap();
    let second = client.get_document_meta("D1").await.unwrap();
    assert_eq!(first.title.as_deref(), Some("One"));
    assert_eq!(second.title.as_deref(), Some("One"));
    // One token request plus two metadata requests
    assert_eq!(client.request_count(), 3);
}

#[tokio::test]
async fn test_blocks_pagination_follows_page_tokens() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    // Mounted first so the page-token request matches it before the generic mock
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/D1/blocks"))
        .and(query_param("page_token", "p2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"items": [{"block_id": "b2", "text": {}}], "has_more": false},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/D1/blocks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {
                "items": [{"block_id": "b1", "text": {}}],
                "has_more": true,
                "page_token": "p2",
            },
        })))
        .mount(&server)
        .await;

    let mut client = ApiClient::new(test_config(&server.uri()).api).unwrap();
    let blocks = client.get_document_blocks("D1").await.unwrap();
    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0]["block_id"], "b1");
    assert_eq!(blocks[1]["block_id"], "b2");
}

#[tokio::test]
async fn test_rate_limit_envelope_is_retried() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/D1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 99991400,
            "msg": "request frequency limited",
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/D1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"document": {"title": "Recovered"}},
        })))
        .mount(&server)
        .await;

    let mut client = ApiClient::new(test_config(&server.uri()).api).unwrap();
    let meta = client.get_document_meta("D1").await.unwrap();
    assert_eq!(meta.title.as_deref(), Some("Recovered"));
}

#[tokio::test]
async fn test_server_errors_exhaust_retries() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/D1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut client = ApiClient::new(test_config(&server.uri()).api).unwrap();
    let err = client.get_document_meta("D1").await.unwrap_err();
    assert!(matches!(err, ApiError::RetriesExhausted { attempts: 3, .. }));
}

#[tokio::test]
async fn test_service_error_is_not_retried() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/D1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1254005,
            "msg": "document not found",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = ApiClient::new(test_config(&server.uri()).api).unwrap();
    let err = client.get_document_meta("D1").await.unwrap_err();
    assert!(matches!(err, ApiError::Service { code: 1254005, .. }));
}

#[tokio::test]
async fn test_node_lookup_advances_past_field_validation() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    // Only the node_token encoding is accepted by this deployment
    Mock::given(method("GET"))
        .and(path("/open-apis/wiki/v2/spaces/get_node"))
        .and(query_param("node_token", "W1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"node": {
                "node_token": "W1",
                "space_id": "7001",
                "title": "Home",
                "obj_type": "docx",
                "obj_token": "D9",
            }},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/wiki/v2/spaces/get_node"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 99992402,
            "msg": "invalid param, field validation failed",
        })))
        .mount(&server)
        .await;

    let mut client = ApiClient::new(test_config(&server.uri()).api).unwrap();
    let node = client.get_wiki_node("W1").await.unwrap();
    assert_eq!(node.node_token, "W1");
    assert_eq!(node.obj_type.as_deref(), Some("docx"));
}

#[tokio::test]
async fn test_node_lookup_aborts_on_other_service_errors() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/open-apis/wiki/v2/spaces/get_node"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 131006,
            "msg": "no permission",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = ApiClient::new(test_config(&server.uri()).api).unwrap();
    let err = client.get_wiki_node("W1").await.unwrap_err();
    assert!(matches!(err, ApiError::Service { code: 131006, .. }));
}

#[tokio::test]
async fn test_discover_follows_document_links() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/Root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"document": {"title": "Root Doc"}},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/Root/blocks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"items": [{
                "block_id": "b1",
                "text": {"elements": [{"text_run": {
                    "content": "see https://a.feishu.cn/docx/Child for details",
                }}]},
            }], "has_more": false},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/Child"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"document": {"title": "Child Doc"}},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/Child/blocks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"items": [], "has_more": false},
        })))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let mut client = ApiClient::new(config.api.clone()).unwrap();
    let mut observer = NoopProgress;
    let result = discover(
        &mut client,
        &config,
        "https://a.feishu.cn/docx/Root",
        &mut observer,
    )
    .await
    .unwrap();

    assert_eq!(result.total, 2);
    assert_eq!(result.documents[0].id, "docx:Root");
    assert_eq!(result.documents[0].title.as_deref(), Some("Root Doc"));
    assert_eq!(result.documents[1].id, "docx:Child");
    assert_eq!(result.documents[1].depth, 1);
    assert_eq!(result.documents[1].parent_ids, vec!["docx:Root"]);
    assert_eq!(result.tree.len(), 1);
    assert_eq!(result.tree[0].children[0].id, "docx:Child");
}

#[tokio::test]
async fn test_discover_expands_wiki_node_and_children() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/open-apis/wiki/v2/spaces/get_node"))
        .and(query_param("token", "W1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"node": {
                "node_token": "W1",
                "space_id": "7001",
                "title": "Home",
                "obj_type": "docx",
                "obj_token": "D9",
                "has_child": true,
            }},
        })))
        .mount(&server)
        .await;
    // The child node carries no space id and no mapped object
    Mock::given(method("GET"))
        .and(path("/open-apis/wiki/v2/spaces/get_node"))
        .and(query_param("token", "W2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"node": {
                "node_token": "W2",
                "title": "Child",
            }},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/wiki/v2/spaces/7001/nodes"))
        .and(query_param("parent_node_token", "W1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"items": [{
                "node_token": "W2",
                "space_id": "7001",
                "title": "Child",
            }], "has_more": false},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/D9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"document": {"title": "Home Doc"}},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/D9/blocks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"items": [], "has_more": false},
        })))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let mut client = ApiClient::new(config.api.clone()).unwrap();
    let mut observer = NoopProgress;
    let result = discover(
        &mut client,
        &config,
        "https://a.feishu.cn/wiki/W1",
        &mut observer,
    )
    .await
    .unwrap();

    assert_eq!(result.total, 3);
    assert!(result.warnings.is_empty());

    let root = result.documents.iter().find(|d| d.id == "wiki:W1").unwrap();
    assert_eq!(root.depth, 0);
    assert_eq!(root.title.as_deref(), Some("Home"));
    assert_eq!(root.obj_kind.as_deref(), Some("docx"));
    assert_eq!(root.obj_token.as_deref(), Some("D9"));

    // The mapped object sits at the node's own level, not one deeper
    let mapped = result.documents.iter().find(|d| d.id == "docx:D9").unwrap();
    assert_eq!(mapped.depth, 0);
    assert_eq!(mapped.parent_ids, vec!["wiki:W1"]);
    assert_eq!(mapped.title.as_deref(), Some("Home Doc"));

    let child = result.documents.iter().find(|d| d.id == "wiki:W2").unwrap();
    assert_eq!(child.depth, 1);
    assert_eq!(child.parent_ids, vec!["wiki:W1"]);
    assert_eq!(child.title.as_deref(), Some("Child"));

    assert_eq!(result.tree.len(), 1);
    assert_eq!(result.tree[0].id, "wiki:W1");
    assert_eq!(result.tree[0].children.len(), 2);
}

#[tokio::test]
async fn test_rediscovery_merges_links_without_refetching() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    // Root and Child link to each other; each may be fetched only once
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/Root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"document": {"title": "Root Doc"}},
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/Root/blocks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"items": [{
                "block_id": "b1",
                "text": {"elements": [{"text_run": {
                    "content": "https://a.feishu.cn/docx/Child",
                }}]},
            }], "has_more": false},
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/Child"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"document": {"title": "Child Doc"}},
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/Child/blocks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"items": [{
                "block_id": "b1",
                "text": {"elements": [{"text_run": {
                    "content": "back to https://a.feishu.cn/docx/Root",
                }}]},
            }], "has_more": false},
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let mut client = ApiClient::new(config.api.clone()).unwrap();
    let mut observer = NoopProgress;
    let result = discover(
        &mut client,
        &config,
        "https://a.feishu.cn/docx/Root",
        &mut observer,
    )
    .await
    .unwrap();

    assert_eq!(result.total, 2);
    // Both edges are recorded, each exactly once
    assert_eq!(result.relations.len(), 2);
    let root = result
        .documents
        .iter()
        .find(|d| d.id == "docx:Root")
        .unwrap();
    assert_eq!(root.parent_ids, vec!["docx:Child"]);
}

#[tokio::test]
async fn test_discover_depth_limit_stops_expansion() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    // Root links to Child; depth 0 means no link is followed
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/Root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"document": {"title": "Root Doc"}},
        })))
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri());
    config.discover.max_depth = 0;
    let mut client = ApiClient::new(config.api.clone()).unwrap();
    let mut observer = NoopProgress;
    let result = discover(
        &mut client,
        &config,
        "https://a.feishu.cn/docx/Root",
        &mut observer,
    )
    .await
    .unwrap();

    assert_eq!(result.total, 1);
    // Block listing is never requested at the depth limit
    assert_eq!(client.request_count(), 2);
}

#[tokio::test]
async fn test_discover_tolerates_per_item_failures() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/Root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"document": {"title": "Root Doc"}},
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/Root/blocks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "msg": "ok",
            "data": {"items": [{
                "block_id": "b1",
                "text": {"elements": [{"text_run": {
                    "content": "https://a.feishu.cn/docx/Broken",
                }}]},
            }], "has_more": false},
        })))
        .mount(&server)
        .await;
    // Every request about the broken document fails hard
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/Broken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1254005,
            "msg": "document not found",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/Broken/blocks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1254005,
            "msg": "document not found",
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/open-apis/docx/v1/documents/Broken/raw_content"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 1254005,
            "msg": "document not found",
        })))
        .mount(&server)
        .await;

    let config = test_config(&server.uri());
    let mut client = ApiClient::new(config.api.clone()).unwrap();
    let mut observer = NoopProgress;
    let result = discover(
        &mut client,
        &config,
        "https://a.feishu.cn/docx/Root",
        &mut observer,
    )
    .await
    .unwrap();

    // The broken document is recorded, the crawl completes, warnings remain
    assert_eq!(result.total, 2);
    assert!(!result.warnings.is_empty());
}

#[tokio::test]
async fn test_discover_document_cap() {
    let server = MockServer::start().await;
    mount_token(&server).await;

    for token in ["Root", "A", "B", "C"] {
        Mock::given(method("GET"))
            .and(path(format!("/open-apis/docx/v1/documents/{}", token)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "msg": "ok",
                "data": {"document": {"title": token}},
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/open-apis/docx/v1/documents/{}/blocks", token)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 0,
                "msg": "ok",
                "data": {"items": [{
                    "block_id": "b",
                    "text": {"elements": [{"text_run": {"content":
                        "https://a.feishu.cn/docx/A https://a.feishu.cn/docx/B https://a.feishu.cn/docx/C",
                    }}]},
                }], "has_more": false},
            })))
            .mount(&server)
            .await;
    }

    let mut config = test_config(&server.uri());
    config.discover.max_docs = 2;
    let mut client = ApiClient::new(config.api.clone()).unwrap();
    let mut observer = NoopProgress;
    let result = discover(
        &mut client,
        &config,
        "https://a.feishu.cn/docx/Root",
        &mut observer,
    )
    .await
    .unwrap();

    assert_eq!(result.total, 2);
    assert!(result
        .warnings
        .iter()
        .any(|w| w.contains("cap")));
}

#[tokio::test]
async fn test_discover_rejects_invalid_root() {
    let config = test_config("http://localhost:1");
    let mut client = ApiClient::new(config.api.clone()).unwrap();
    let mut observer = NoopProgress;
    let err = discover(
        &mut client,
        &config,
        "https://example.com/docx/T",
        &mut observer,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, docmirror::MirrorError::InvalidRootUrl(_)));
}
