use crate::api::ApiClient;
use crate::config::MirrorConfig;
use crate::discover::tree::build_tree;
use crate::discover::types::{DiscoverResult, DocumentItem, DocumentRelation};
use crate::progress::{DiscoverEvent, DiscoverStatus, ProgressObserver};
use crate::resource::{
    extract_links, extract_links_from_text, parse_resource_url, ResourceKind, ResourceRef,
};
use crate::{MirrorError, Result};
use chrono::Utc;
use serde_json::Value;
use std::collections::{HashMap, HashSet, VecDeque};
use url::Url;

/// A URL queued for discovery
#[derive(Debug, Clone)]
struct QueuedDoc {
    url: String,
    depth: u32,
    parent_id: Option<String>,
    title_hint: Option<String>,
}

/// Breadth-first discovery over the workspace resource graph
///
/// Owns the document map, relation set and warning list for one crawl; the
/// API client is borrowed for the duration so all requests stay serialized.
pub struct Crawler<'a> {
    client: &'a mut ApiClient,
    observer: &'a mut dyn ProgressObserver,
    max_depth: u32,
    max_docs: usize,
    domains: Vec<String>,
    docs: HashMap<String, DocumentItem>,
    order: Vec<String>,
    relations: Vec<DocumentRelation>,
    relation_keys: HashSet<String>,
    warnings: Vec<String>,
    sequence: u64,
}

/// Discovers every document reachable from the root URL
///
/// The root URL must parse as a workspace resource; anything else is a fatal
/// input error. Per-item failures during the walk are recorded as warnings on
/// the result and never abort the crawl.
pub async fn discover(
    client: &mut ApiClient,
    config: &MirrorConfig,
    root_url: &str,
    observer: &mut dyn ProgressObserver,
) -> Result<DiscoverResult> {
    let root = parse_resource_url(root_url, &config.domains)
        .ok_or_else(|| MirrorError::InvalidRootUrl(root_url.to_string()))?;

    let mut crawler = Crawler {
        client,
        observer,
        max_depth: config.discover.max_depth,
        max_docs: config.discover.max_docs,
        domains: config.domains.clone(),
        docs: HashMap::new(),
        order: Vec::new(),
        relations: Vec::new(),
        relation_keys: HashSet::new(),
        warnings: Vec::new(),
        sequence: 0,
    };
    crawler.run(root).await
}

impl<'a> Crawler<'a> {
    async fn run(&mut self, root: ResourceRef) -> Result<DiscoverResult> {
        let root_url = root.url.clone();
        tracing::info!("Starting discovery from {}", root_url);

        let mut queue = VecDeque::new();
        queue.push_back(QueuedDoc {
            url: root.url,
            depth: 0,
            parent_id: None,
            title_hint: None,
        });

        while let Some(queued) = queue.pop_front() {
            self.sequence += 1;
            self.emit(
                DiscoverStatus::Processing,
                &queued.url,
                queued.depth,
                None,
                None,
                "processing",
            );

            let resource = match parse_resource_url(&queued.url, &self.domains) {
                Some(resource) => resource,
                None => {
                    self.warn(format!("Unparseable URL skipped: {}", queued.url));
                    self.emit(
                        DiscoverStatus::Warning,
                        &queued.url,
                        queued.depth,
                        None,
                        None,
                        "URL did not parse as a workspace resource",
                    );
                    continue;
                }
            };
            let id = resource.id();

            // Re-discovery only merges the new parent link; no re-fetch
            if self.docs.contains_key(&id) {
                if let Some(parent) = &queued.parent_id {
                    self.link(parent, &id);
                }
                self.emit(
                    DiscoverStatus::Skip,
                    &queued.url,
                    queued.depth,
                    Some(&resource),
                    Some(&id),
                    "already discovered",
                );
                continue;
            }

            if self.docs.len() >= self.max_docs {
                self.warn(format!(
                    "Document cap of {} reached; abandoning {} queued URLs",
                    self.max_docs,
                    queue.len() + 1
                ));
                self.emit(
                    DiscoverStatus::Warning,
                    &queued.url,
                    queued.depth,
                    Some(&resource),
                    Some(&id),
                    "document cap reached; crawl stopped",
                );
                break;
            }

            let mut item = DocumentItem {
                id: id.clone(),
                kind: resource.kind,
                token: resource.token.clone(),
                url: resource.url.clone(),
                depth: queued.depth,
                title: queued.title_hint.clone(),
                obj_kind: None,
                obj_token: None,
                parent_ids: Vec::new(),
            };
            if let Some(parent) = &queued.parent_id {
                item.add_parent(parent);
            }
            self.docs.insert(id.clone(), item);
            self.order.push(id.clone());
            if let Some(parent) = &queued.parent_id {
                self.record_relation(parent, &id);
            }

            let outcome = match resource.kind {
                ResourceKind::DocPage => {
                    self.process_doc_page(&id, &resource, queued.depth, &mut queue)
                        .await
                }
                ResourceKind::WikiNode => {
                    self.process_wiki_node(&id, &resource, queued.depth, &mut queue)
                        .await
                }
                other => {
                    self.warn(format!("{}: kind {} is never expanded", id, other));
                    self.emit(
                        DiscoverStatus::Warning,
                        &queued.url,
                        queued.depth,
                        Some(&resource),
                        Some(&id),
                        "kind is not expanded",
                    );
                    continue;
                }
            };

            match outcome {
                Ok(message) => {
                    self.emit(
                        DiscoverStatus::Success,
                        &queued.url,
                        queued.depth,
                        Some(&resource),
                        Some(&id),
                        &message,
                    );
                }
                Err(e) => {
                    // One bad document never aborts discovery
                    self.warn(format!("{}: {}", id, e));
                    self.emit(
                        DiscoverStatus::Error,
                        &queued.url,
                        queued.depth,
                        Some(&resource),
                        Some(&id),
                        &e.to_string(),
                    );
                }
            }
        }

        let documents: Vec<DocumentItem> = self
            .order
            .iter()
            .map(|id| self.docs[id].clone())
            .collect();
        let tree = build_tree(&self.order, &self.relations);

        tracing::info!(
            "Discovery finished: {} documents, {} warnings",
            documents.len(),
            self.warnings.len()
        );

        Ok(DiscoverResult {
            generated_at: Utc::now(),
            root_url,
            total: documents.len(),
            warnings: std::mem::take(&mut self.warnings),
            documents,
            relations: std::mem::take(&mut self.relations),
            tree,
        })
    }

    /// Expands a document page: title, then outbound links
    async fn process_doc_page(
        &mut self,
        id: &str,
        resource: &ResourceRef,
        depth: u32,
        queue: &mut VecDeque<QueuedDoc>,
    ) -> crate::api::ApiResult<String> {
        match self.client.get_document_meta(&resource.token).await {
            Ok(meta) => {
                if let Some(title) = meta.title {
                    self.set_title(id, title);
                }
            }
            Err(e) => self.warn(format!("{}: title fetch failed: {}", id, e)),
        }

        if depth >= self.max_depth {
            return Ok("depth limit reached; links not followed".to_string());
        }

        let links = match self.client.get_document_blocks(&resource.token).await {
            Ok(blocks) => extract_links(&Value::Array(blocks), &self.domains),
            Err(e) => {
                self.warn(format!(
                    "{}: block listing failed ({}); extracting links from raw content",
                    id, e
                ));
                let raw = self.client.get_raw_content(&resource.token).await?;
                extract_links_from_text(&raw, &self.domains)
            }
        };

        let count = links.len();
        for url in links {
            queue.push_back(QueuedDoc {
                url,
                depth: depth + 1,
                parent_id: Some(id.to_string()),
                title_hint: None,
            });
        }
        Ok(format!("{} outbound links enqueued", count))
    }

    /// Expands a wiki node: mapped object at the same depth, children one
    /// level deeper
    async fn process_wiki_node(
        &mut self,
        id: &str,
        resource: &ResourceRef,
        depth: u32,
        queue: &mut VecDeque<QueuedDoc>,
    ) -> crate::api::ApiResult<String> {
        let node = self.client.get_wiki_node(&resource.token).await?;

        if let Some(title) = &node.title {
            self.set_title(id, title.clone());
        }
        if let Some(item) = self.docs.get_mut(id) {
            item.obj_kind = node.obj_type.clone();
            item.obj_token = node.obj_token.clone();
        }

        let origin = origin_of(&resource.url);
        let mut enqueued = 0;

        // The mapped object is the same hierarchical level, not a new one
        if let (Some(obj_type), Some(obj_token)) = (&node.obj_type, &node.obj_token) {
            let kind = ResourceKind::from_obj_type(obj_type);
            if kind != ResourceKind::Unknown {
                queue.push_back(QueuedDoc {
                    url: format!("{}/{}/{}", origin, kind.segment(), obj_token),
                    depth,
                    parent_id: Some(id.to_string()),
                    title_hint: node.title.clone(),
                });
                enqueued += 1;
            }
        }

        if depth >= self.max_depth {
            return Ok(format!(
                "depth limit reached; {} mapped object enqueued",
                enqueued
            ));
        }
        let space_id = match &node.space_id {
            Some(space_id) => space_id.clone(),
            None => return Ok(format!("no space id; {} mapped object enqueued", enqueued)),
        };

        let children = self
            .client
            .list_wiki_child_nodes(&space_id, &node.node_token)
            .await?;
        for child in children {
            queue.push_back(QueuedDoc {
                url: format!("{}/wiki/{}", origin, child.node_token),
                depth: depth + 1,
                parent_id: Some(id.to_string()),
                title_hint: child.title,
            });
            enqueued += 1;
        }

        Ok(format!("{} nodes enqueued", enqueued))
    }

    fn set_title(&mut self, id: &str, title: String) {
        if title.is_empty() {
            return;
        }
        if let Some(item) = self.docs.get_mut(id) {
            item.title = Some(title);
        }
    }

    /// Merges a parent link into an existing item and the relation set
    fn link(&mut self, parent_id: &str, child_id: &str) {
        if let Some(item) = self.docs.get_mut(child_id) {
            item.add_parent(parent_id);
        }
        self.record_relation(parent_id, child_id);
    }

    /// Records a relation at most once regardless of how often it is seen
    fn record_relation(&mut self, parent_id: &str, child_id: &str) {
        let key = format!("{}=>{}", parent_id, child_id);
        if self.relation_keys.insert(key) {
            self.relations.push(DocumentRelation {
                parent_id: parent_id.to_string(),
                child_id: child_id.to_string(),
            });
        }
    }

    fn warn(&mut self, message: String) {
        tracing::warn!("{}", message);
        self.warnings.push(message);
    }

    fn emit(
        &mut self,
        status: DiscoverStatus,
        url: &str,
        depth: u32,
        resource: Option<&ResourceRef>,
        id: Option<&str>,
        message: &str,
    ) {
        let title = id
            .and_then(|id| self.docs.get(id))
            .and_then(|item| item.title.clone());
        self.observer.on_discover(&DiscoverEvent {
            status,
            sequence: self.sequence,
            url: url.to_string(),
            depth,
            kind: resource.map(|r| r.kind),
            id: id.map(|s| s.to_string()),
            title,
            message: message.to_string(),
            discovered: self.docs.len(),
            warnings: self.warnings.len(),
        });
    }
}

/// Scheme and host of a canonical resource URL
fn origin_of(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.host_str() {
            Some(host) => format!("{}://{}", parsed.scheme(), host),
            None => url.to_string(),
        },
        Err(_) => url.to_string(),
    }
}
