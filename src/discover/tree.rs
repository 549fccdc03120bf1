use crate::discover::types::{DocumentRelation, DocumentTreeNode};
use std::collections::{HashMap, HashSet};

/// Builds a rooted forest from the relation set, restricted to known ids
///
/// A node is a root iff it never appears as a relation's child among known
/// ids. Cycles are broken by refusing to re-enter an id already on the
/// current root-to-node path, so no path ever contains the same id twice.
pub fn build_tree(doc_ids: &[String], relations: &[DocumentRelation]) -> Vec<DocumentTreeNode> {
    let known: HashSet<&str> = doc_ids.iter().map(String::as_str).collect();

    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut has_parent: HashSet<&str> = HashSet::new();
    for relation in relations {
        let parent = relation.parent_id.as_str();
        let child = relation.child_id.as_str();
        if !known.contains(parent) || !known.contains(child) {
            continue;
        }
        children.entry(parent).or_default().push(child);
        has_parent.insert(child);
    }

    doc_ids
        .iter()
        .filter(|id| !has_parent.contains(id.as_str()))
        .map(|id| {
            let mut path = HashSet::new();
            attach(id, &children, &mut path)
        })
        .collect()
}

fn attach<'a>(
    id: &'a str,
    children: &HashMap<&'a str, Vec<&'a str>>,
    path: &mut HashSet<&'a str>,
) -> DocumentTreeNode {
    path.insert(id);
    // Eligibility is settled before descending; the path set is restored
    // between siblings, so the two-step walk matches a lazy one
    let eligible: Vec<&str> = children
        .get(id)
        .map(|ids| {
            ids.iter()
                .copied()
                .filter(|child| !path.contains(child))
                .collect()
        })
        .unwrap_or_default();
    let child_nodes = eligible
        .into_iter()
        .map(|child| attach(child, children, path))
        .collect();
    path.remove(id);

    DocumentTreeNode {
        id: id.to_string(),
        children: child_nodes,
    }
}
