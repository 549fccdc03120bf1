//! Graph discovery: BFS over the workspace resource graph
//!
//! Starting from a root URL, the crawler walks outbound links and wiki child
//! nodes breadth-first, deduplicating by resource identity, bounding the walk
//! by depth and document count, and tolerating per-item failures. The result
//! is a manifest of documents, parent/child relations and a rooted forest.

mod crawler;
mod tree;
mod types;

pub use crawler::discover;
pub use tree::build_tree;
pub use types::{DiscoverResult, DocumentItem, DocumentRelation, DocumentTreeNode};
