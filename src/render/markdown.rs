use crate::render::code::resolve_fence_language;
use crate::render::index::{BlockIndex, BlockNode, BlockType};
use crate::render::inline;
use crate::render::table::render_table;
use serde_json::Value;
use std::collections::HashMap;

/// Renders a fetched block list to a Markdown document
///
/// The pass is tolerant by construction: unrecognized blocks degrade to
/// paragraphs, blocks that render empty are dropped, and a document whose
/// blocks produce no body content falls back to the raw-content text when
/// one is supplied.
///
/// # Arguments
/// * `title` - document title, emitted as a level-one heading when non-empty
/// * `blocks` - flat block records as returned by the blocks endpoint
/// * `raw_fallback` - plain-text body used when the blocks yield no content
pub fn render(title: Option<&str>, blocks: &[Value], raw_fallback: Option<&str>) -> String {
    let index = BlockIndex::build(blocks);
    let body = render_body(&index);

    let heading = title
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| format!("# {}\n\n", t));

    let mut full = String::new();
    if let Some(heading) = &heading {
        full.push_str(heading);
    }
    full.push_str(&body);

    if !has_markdown_body_content(&full) {
        if let Some(raw) = raw_fallback {
            let raw = raw.replace("\r\n", "\n");
            let raw = raw.trim();
            if !raw.is_empty() {
                full.clear();
                if let Some(heading) = &heading {
                    full.push_str(heading);
                }
                full.push_str(raw);
            }
        }
    }

    let normalized = normalize_markdown(&full);
    if normalized.trim().is_empty() {
        String::new()
    } else {
        format!("{}\n", normalized.trim_end())
    }
}

fn render_body(index: &BlockIndex) -> String {
    // Ordered-list counters keyed by (parent, nesting depth), so sibling
    // runs number independently at each level
    let mut counters: HashMap<(Option<String>, usize), u64> = HashMap::new();
    let mut body = String::new();
    let mut prev_was_list = false;

    for node in &index.nodes {
        if node.block_type == BlockType::Page {
            continue;
        }
        // Table descendants are rendered inside their table's cells
        if index.has_table_ancestor(node) {
            continue;
        }

        let depth = index.list_depth(node);
        let piece = match render_block(node, index, depth, &mut counters) {
            Some(piece) => piece,
            None => continue,
        };

        // A break in an ordered run restarts numbering afterwards
        if node.block_type != BlockType::Ordered && depth == 0 {
            counters.clear();
        }

        let is_list = node.block_type.is_list();
        if !body.is_empty() {
            body.push_str(if is_list && prev_was_list { "\n" } else { "\n\n" });
        }
        body.push_str(&piece);
        prev_was_list = is_list;
    }

    body
}

fn render_block(
    node: &BlockNode,
    index: &BlockIndex,
    depth: usize,
    counters: &mut HashMap<(Option<String>, usize), u64>,
) -> Option<String> {
    let payload = node.payload();

    match node.block_type {
        BlockType::Page => None,
        BlockType::Table => render_table(node, index),
        BlockType::TableCell => None,
        BlockType::Code => {
            let content = payload.map(inline::plain_text).unwrap_or_default();
            let content = content.replace("\r\n", "\n");
            let content = content.trim_end();
            if content.is_empty() {
                return None;
            }
            let language = resolve_fence_language(&node.raw, payload, content);
            Some(format!("```{}\n{}\n```", language, content))
        }
        BlockType::Heading(level) => {
            let text = payload.map(inline::rich_text).unwrap_or_default();
            if text.trim().is_empty() {
                return None;
            }
            let level = level.clamp(1, 6) as usize;
            Some(format!("{} {}", "#".repeat(level), text))
        }
        BlockType::Quote => {
            let text = payload.map(inline::rich_text).unwrap_or_default();
            if text.trim().is_empty() {
                return None;
            }
            let quoted: Vec<String> = text
                .lines()
                .map(|line| {
                    if line.is_empty() {
                        ">".to_string()
                    } else {
                        format!("> {}", line)
                    }
                })
                .collect();
            Some(quoted.join("\n"))
        }
        BlockType::Bullet | BlockType::Todo | BlockType::Ordered => {
            let text = payload.map(inline::rich_text).unwrap_or_default();
            if text.trim().is_empty() {
                return None;
            }
            let indent = "  ".repeat(depth);
            let marker = match node.block_type {
                BlockType::Bullet => "- ".to_string(),
                BlockType::Todo => {
                    if todo_done(payload) {
                        "- [x] ".to_string()
                    } else {
                        "- [ ] ".to_string()
                    }
                }
                _ => {
                    let key = (node.parent_id.clone(), depth);
                    let number = match explicit_number(node, payload) {
                        Some(n) => {
                            counters.insert(key, n);
                            n
                        }
                        None => {
                            let entry = counters.entry(key).or_insert(0);
                            *entry += 1;
                            *entry
                        }
                    };
                    format!("{}. ", number)
                }
            };
            Some(format!("{}{}{}", indent, marker, text))
        }
        BlockType::Paragraph => {
            let text = payload.map(inline::rich_text).unwrap_or_default();
            if text.trim().is_empty() {
                return None;
            }
            Some(text)
        }
    }
}

fn todo_done(payload: Option<&Value>) -> bool {
    payload
        .and_then(|p| p.get("style"))
        .and_then(|s| s.get("done"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

/// Explicit sequence number declared on an ordered item, when one is set
///
/// Checked on the payload's style object, the payload itself, then the raw
/// record; non-numeric markers like `"auto"` yield `None`.
fn explicit_number(node: &BlockNode, payload: Option<&Value>) -> Option<u64> {
    let sources = [
        payload.and_then(|p| p.get("style")),
        payload,
        Some(&node.raw),
    ];
    for source in sources.into_iter().flatten() {
        for key in ["order", "number", "seq", "sequence"] {
            if let Some(value) = source.get(key) {
                match value {
                    Value::Number(n) => {
                        if let Some(n) = n.as_u64().filter(|n| *n > 0) {
                            return Some(n);
                        }
                    }
                    Value::String(s) => {
                        if let Ok(n) = s.trim().parse::<u64>() {
                            if n > 0 {
                                return Some(n);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
    }
    None
}

/// Whether the rendered document carries any body content beyond headings
pub fn has_markdown_body_content(md: &str) -> bool {
    md.lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && !line.starts_with('#'))
}

/// Post-render cleanup pass
///
/// Heading lines lose embedded bold markers and collapsed whitespace; fenced
/// code passes through untouched.
pub fn normalize_markdown(md: &str) -> String {
    let mut out = Vec::new();
    let mut in_fence = false;
    for line in md.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            out.push(line.to_string());
            continue;
        }
        if !in_fence && trimmed.starts_with('#') {
            out.push(normalize_heading(trimmed));
            continue;
        }
        out.push(line.to_string());
    }
    out.join("\n")
}

fn normalize_heading(line: &str) -> String {
    let hashes: String = line.chars().take_while(|c| *c == '#').collect();
    let rest = line[hashes.len()..].replace("**", "");
    let words: Vec<&str> = rest.split_whitespace().collect();
    if words.is_empty() {
        hashes
    } else {
        format!("{} {}", hashes, words.join(" "))
    }
}
