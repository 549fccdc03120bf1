use crate::discover::{DiscoverResult, DocumentItem, DocumentTreeNode};
use crate::resource::ResourceKind;
use std::collections::{HashMap, HashSet};

/// One planned export target: the item plus its directory-safe path segments
///
/// The last segment names the item's own file; the preceding segments name
/// the directories of its ancestors.
#[derive(Debug, Clone)]
pub struct PlanEntry {
    pub item: DocumentItem,
    pub path_segments: Vec<String>,
}

impl PlanEntry {
    /// Relative file path for this entry, with the Markdown extension
    pub fn relative_path(&self) -> std::path::PathBuf {
        let mut path = std::path::PathBuf::new();
        if let Some((file, dirs)) = self.path_segments.split_last() {
            for dir in dirs {
                path.push(dir);
            }
            path.push(format!("{}.md", file));
        }
        path
    }
}

/// Maps a discovery manifest to the list of files an export will write
///
/// Walks the document forest depth-first, assigning every item a filesystem
/// path that mirrors its place in the tree. Items reachable from several
/// parents are planned once, at their first position. A wiki node that wraps
/// a document suppresses the separately-discovered document entry; the
/// wrapped document's children attach to the wiki node's own path instead.
pub fn plan_export(result: &DiscoverResult) -> Vec<PlanEntry> {
    let items: HashMap<&str, &DocumentItem> = result
        .documents
        .iter()
        .map(|item| (item.id.as_str(), item))
        .collect();

    // A manifest without a tree still exports every document, flat
    let forest: Vec<DocumentTreeNode> = if result.tree.is_empty() {
        result
            .documents
            .iter()
            .map(|item| DocumentTreeNode {
                id: item.id.clone(),
                children: Vec::new(),
            })
            .collect()
    } else {
        result.tree.clone()
    };

    let mut out = Vec::new();
    let mut visited = HashSet::new();
    plan_group(&forest, &[], &items, &mut visited, &mut out);
    out
}

fn plan_group(
    group: &[DocumentTreeNode],
    dir: &[String],
    items: &HashMap<&str, &DocumentItem>,
    visited: &mut HashSet<String>,
    out: &mut Vec<PlanEntry>,
) {
    let mut used: HashMap<String, usize> = HashMap::new();

    for node in group {
        let item = match items.get(node.id.as_str()) {
            Some(item) => *item,
            None => continue,
        };
        if !visited.insert(item.id.clone()) {
            continue;
        }

        let base = segment_for(item);
        let count = used.entry(base.to_lowercase()).or_insert(0);
        *count += 1;
        let segment = if *count == 1 {
            base
        } else {
            format!("{}-{}", base, count)
        };

        let mut path = dir.to_vec();
        path.push(segment);
        let children = effective_children(node, item, items, visited);
        out.push(PlanEntry {
            item: item.clone(),
            path_segments: path.clone(),
        });
        plan_group(&children, &path, items, visited, out);
    }
}

/// The node's children, with a wrapped-document child folded away
///
/// A wiki node whose underlying object is a document may also appear in the
/// manifest as that document itself. Exporting both would write the same
/// content twice, so the document child is dropped and its children are
/// spliced in at its position.
fn effective_children(
    node: &DocumentTreeNode,
    item: &DocumentItem,
    items: &HashMap<&str, &DocumentItem>,
    visited: &mut HashSet<String>,
) -> Vec<DocumentTreeNode> {
    let wraps_document = item.kind == ResourceKind::WikiNode
        && matches!(item.obj_kind.as_deref(), Some("doc") | Some("docx"));

    let mut children = Vec::with_capacity(node.children.len());
    for child in &node.children {
        let is_wrapped = wraps_document
            && items.get(child.id.as_str()).map_or(false, |c| {
                c.kind == ResourceKind::DocPage && Some(&c.token) == item.obj_token.as_ref()
            });
        if is_wrapped {
            visited.insert(child.id.clone());
            children.extend(child.children.iter().cloned());
        } else {
            children.push(child.clone());
        }
    }
    children
}

fn segment_for(item: &DocumentItem) -> String {
    let fallback = format!("{}-{}", item.kind.segment(), item.token);
    let title = item.title.as_deref().unwrap_or("");
    sanitize_path_segment(title, &fallback)
}

/// Makes a title safe for use as one path component
///
/// Path separators, reserved filesystem characters and control characters
/// become dashes; whitespace and dash runs collapse; a value that sanitizes
/// to nothing yields the fallback.
pub fn sanitize_path_segment(raw: &str, fallback: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| {
            if c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '-'
            } else {
                c
            }
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");

    let mut out = String::with_capacity(collapsed.len());
    let mut prev_dash = false;
    for c in collapsed.chars() {
        if c == '-' {
            if !prev_dash {
                out.push(c);
            }
            prev_dash = true;
        } else {
            out.push(c);
            prev_dash = false;
        }
    }

    let trimmed = out.trim_matches(|c: char| c == '-' || c.is_whitespace());
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}
