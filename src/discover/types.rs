use crate::resource::ResourceKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One discovered document
///
/// Created once per unique identity key; `title`, `obj_kind` and `obj_token`
/// are filled in as richer data arrives during the crawl. Items are never
/// deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentItem {
    /// Identity key: `kind:token`
    pub id: String,
    pub kind: ResourceKind,
    pub token: String,
    pub url: String,
    /// BFS distance from the root
    pub depth: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Underlying object kind for wiki nodes mapped to a concrete object
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obj_token: Option<String>,
    /// All observed parents, first-seen order, duplicates suppressed
    #[serde(default)]
    pub parent_ids: Vec<String>,
}

impl DocumentItem {
    /// Appends a parent id unless it is already recorded
    pub fn add_parent(&mut self, parent_id: &str) {
        if !self.parent_ids.iter().any(|p| p == parent_id) {
            self.parent_ids.push(parent_id.to_string());
        }
    }
}

/// A unique parent/child edge between two discovered documents
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRelation {
    pub parent_id: String,
    pub child_id: String,
}

/// One node of the rooted document forest
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentTreeNode {
    pub id: String,
    #[serde(default)]
    pub children: Vec<DocumentTreeNode>,
}

/// The discovery manifest: the sole handoff artifact between the discovery
/// and export phases
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoverResult {
    pub generated_at: DateTime<Utc>,
    pub root_url: String,
    pub total: usize,
    #[serde(default)]
    pub warnings: Vec<String>,
    pub documents: Vec<DocumentItem>,
    #[serde(default)]
    pub relations: Vec<DocumentRelation>,
    #[serde(default)]
    pub tree: Vec<DocumentTreeNode>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_parent_dedupes_preserving_order() {
        let mut item = DocumentItem {
            id: "docx:T".to_string(),
            kind: ResourceKind::DocPage,
            token: "T".to_string(),
            url: "https://a.feishu.cn/docx/T".to_string(),
            depth: 1,
            title: None,
            obj_kind: None,
            obj_token: None,
            parent_ids: vec![],
        };
        item.add_parent("wiki:A");
        item.add_parent("wiki:B");
        item.add_parent("wiki:A");
        assert_eq!(item.parent_ids, vec!["wiki:A", "wiki:B"]);
    }

    #[test]
    fn test_manifest_round_trip() {
        let result = DiscoverResult {
            generated_at: Utc::now(),
            root_url: "https://a.feishu.cn/docx/Root".to_string(),
            total: 1,
            warnings: vec!["one warning".to_string()],
            documents: vec![DocumentItem {
                id: "docx:Root".to_string(),
                kind: ResourceKind::DocPage,
                token: "Root".to_string(),
                url: "https://a.feishu.cn/docx/Root".to_string(),
                depth: 0,
                title: Some("Root".to_string()),
                obj_kind: None,
                obj_token: None,
                parent_ids: vec![],
            }],
            relations: vec![],
            tree: vec![DocumentTreeNode {
                id: "docx:Root".to_string(),
                children: vec![],
            }],
        };

        let json = serde_json::to_string(&result).unwrap();
        assert!(json.contains("\"generatedAt\""));
        assert!(json.contains("\"rootUrl\""));
        assert!(json.contains("\"kind\":\"docx\""));

        let back: DiscoverResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total, 1);
        assert_eq!(back.documents[0].id, "docx:Root");
        assert_eq!(back.tree[0].id, "docx:Root");
    }
}
