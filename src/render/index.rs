use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Resolved block tag
///
/// Every raw block resolves to exactly one of these during preprocessing;
/// unrecognized blocks degrade to `Paragraph` and are never dropped unless
/// they render empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockType {
    /// The document's own page block (title holder, not body content)
    Page,
    /// Heading level 1–6
    Heading(u8),
    Bullet,
    Ordered,
    Code,
    Quote,
    Todo,
    Table,
    TableCell,
    Paragraph,
}

impl BlockType {
    /// Whether this block contributes to list nesting depth
    pub fn is_list(self) -> bool {
        matches!(self, Self::Bullet | Self::Ordered | Self::Todo)
    }

    /// Payload keys that may carry this block's rich-text elements
    pub fn payload_keys(self) -> &'static [&'static str] {
        match self {
            Self::Page => &["page"],
            Self::Heading(1) => &["heading1"],
            Self::Heading(2) => &["heading2"],
            Self::Heading(3) => &["heading3"],
            Self::Heading(4) => &["heading4"],
            Self::Heading(5) => &["heading5"],
            // Levels beyond six clamp to six; the payload may still sit
            // under its original key
            Self::Heading(_) => &["heading6", "heading7", "heading8", "heading9"],
            Self::Bullet => &["bullet"],
            Self::Ordered => &["ordered"],
            Self::Code => &["code"],
            Self::Quote => &["quote"],
            Self::Todo => &["todo"],
            Self::Table => &["table"],
            Self::TableCell => &["table_cell"],
            Self::Paragraph => &["text", "paragraph"],
        }
    }
}

/// Type-specific payload keys checked first during resolution
const PAYLOAD_TAGS: &[(&str, BlockType)] = &[
    ("page", BlockType::Page),
    ("heading1", BlockType::Heading(1)),
    ("heading2", BlockType::Heading(2)),
    ("heading3", BlockType::Heading(3)),
    ("heading4", BlockType::Heading(4)),
    ("heading5", BlockType::Heading(5)),
    ("heading6", BlockType::Heading(6)),
    ("heading7", BlockType::Heading(6)),
    ("heading8", BlockType::Heading(6)),
    ("heading9", BlockType::Heading(6)),
    ("bullet", BlockType::Bullet),
    ("ordered", BlockType::Ordered),
    ("code", BlockType::Code),
    ("quote", BlockType::Quote),
    ("todo", BlockType::Todo),
    ("table", BlockType::Table),
    ("table_cell", BlockType::TableCell),
    ("text", BlockType::Paragraph),
];

/// Resolves a raw block record to its tag
///
/// Resolution order: a type-specific payload key on the record, then a
/// normalized string type tag, then the numeric type code table, then
/// paragraph.
pub fn resolve_block_type(block: &Value) -> BlockType {
    for (key, block_type) in PAYLOAD_TAGS {
        if block.get(*key).map_or(false, |v| !v.is_null()) {
            return *block_type;
        }
    }

    let tag = block.get("block_type").or_else(|| block.get("type"));
    if let Some(text) = tag.and_then(Value::as_str) {
        let normalized = text.trim().to_lowercase();
        if let Some(block_type) = type_from_tag(&normalized) {
            return block_type;
        }
        if let Ok(code) = normalized.parse::<i64>() {
            if let Some(block_type) = type_from_code(code) {
                return block_type;
            }
        }
    }
    if let Some(code) = tag.and_then(Value::as_i64) {
        if let Some(block_type) = type_from_code(code) {
            return block_type;
        }
    }

    BlockType::Paragraph
}

fn type_from_tag(tag: &str) -> Option<BlockType> {
    PAYLOAD_TAGS
        .iter()
        .find(|(key, _)| *key == tag)
        .map(|(_, block_type)| *block_type)
        .or(match tag {
            "paragraph" => Some(BlockType::Paragraph),
            _ => None,
        })
}

fn type_from_code(code: i64) -> Option<BlockType> {
    match code {
        1 => Some(BlockType::Page),
        3..=8 => Some(BlockType::Heading((code - 2) as u8)),
        9 => Some(BlockType::Bullet),
        10 | 13 => Some(BlockType::Ordered),
        11 => Some(BlockType::Code),
        12 => Some(BlockType::Quote),
        14 => Some(BlockType::Todo),
        31 => Some(BlockType::Table),
        32 => Some(BlockType::TableCell),
        _ => None,
    }
}

/// One resolved block
#[derive(Debug, Clone)]
pub struct BlockNode {
    pub id: Option<String>,
    pub parent_id: Option<String>,
    pub block_type: BlockType,
    pub raw: Value,
}

impl BlockNode {
    /// The block's type-specific payload, when present
    pub fn payload(&self) -> Option<&Value> {
        self.block_type
            .payload_keys()
            .iter()
            .find_map(|key| self.raw.get(*key))
            .filter(|v| !v.is_null())
    }

    /// Ids this block declares as its children, across the alternative
    /// encodings (a plain array, or a container with an id sub-key)
    pub fn child_ids(&self) -> Vec<String> {
        let container = match self.raw.get("children") {
            Some(value) => value,
            None => return Vec::new(),
        };
        let array = match container {
            Value::Array(items) => Some(items),
            Value::Object(map) => map
                .get("ids")
                .or_else(|| map.get("children"))
                .and_then(Value::as_array),
            _ => None,
        };
        array
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|s| s.to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Lookup of block identity → resolved node, in original list order
#[derive(Debug)]
pub struct BlockIndex {
    pub nodes: Vec<BlockNode>,
    by_id: HashMap<String, usize>,
}

impl BlockIndex {
    /// Builds the index from a flat block list
    ///
    /// Reads ids and parent pointers from any of the supported field
    /// encodings, then back-fills a child's parent pointer from any parent's
    /// declared child list. That reconciles documents that encode the
    /// hierarchy from either side.
    pub fn build(blocks: &[Value]) -> Self {
        let mut nodes = Vec::with_capacity(blocks.len());
        let mut by_id = HashMap::new();

        for block in blocks {
            let id = string_field(block, &["block_id", "id"]);
            let parent_id = string_field(block, &["parent_id"]).or_else(|| {
                block
                    .get("parent")
                    .and_then(|p| string_field(p, &["block_id", "id"]))
            });
            let node = BlockNode {
                id: id.clone(),
                parent_id,
                block_type: resolve_block_type(block),
                raw: block.clone(),
            };
            if let Some(id) = id {
                by_id.entry(id).or_insert(nodes.len());
            }
            nodes.push(node);
        }

        // Back-fill parents from declared child lists
        let mut backfill = Vec::new();
        for node in &nodes {
            if let Some(parent_id) = &node.id {
                for child_id in node.child_ids() {
                    backfill.push((child_id, parent_id.clone()));
                }
            }
        }
        for (child_id, parent_id) in backfill {
            if let Some(&index) = by_id.get(&child_id) {
                if nodes[index].parent_id.is_none() {
                    nodes[index].parent_id = Some(parent_id);
                }
            }
        }

        Self { nodes, by_id }
    }

    pub fn get(&self, id: &str) -> Option<&BlockNode> {
        self.by_id.get(id).map(|&index| &self.nodes[index])
    }

    /// Whether any ancestor along the parent chain is a table
    pub fn has_table_ancestor(&self, node: &BlockNode) -> bool {
        self.any_ancestor(node, |ancestor| ancestor.block_type == BlockType::Table)
    }

    /// Number of list-type blocks along the ancestor chain
    pub fn list_depth(&self, node: &BlockNode) -> usize {
        let mut depth = 0;
        self.any_ancestor(node, |ancestor| {
            if ancestor.block_type.is_list() {
                depth += 1;
            }
            false
        });
        depth
    }

    /// Walks the parent chain, guarding against linkage cycles
    fn any_ancestor(&self, node: &BlockNode, mut predicate: impl FnMut(&BlockNode) -> bool) -> bool {
        let mut visited = HashSet::new();
        let mut current = node.parent_id.as_deref();
        while let Some(id) = current {
            if !visited.insert(id.to_string()) {
                break;
            }
            match self.get(id) {
                Some(ancestor) => {
                    if predicate(ancestor) {
                        return true;
                    }
                    current = ancestor.parent_id.as_deref();
                }
                None => break,
            }
        }
        false
    }
}

fn string_field(value: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| {
        value
            .get(*key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    })
}
