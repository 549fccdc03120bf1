use crate::render::index::{BlockIndex, BlockNode, BlockType};
use crate::render::inline;
use serde_json::Value;
use std::collections::HashSet;

/// Renders a table block as a pipe-delimited Markdown table
///
/// Returns `None` when no cell matrix can be reconstructed from any of the
/// supported encodings.
pub fn render_table(node: &BlockNode, index: &BlockIndex) -> Option<String> {
    let matrix = extract_matrix(node, index)?;
    if matrix.is_empty() {
        return None;
    }

    let width = matrix.iter().map(Vec::len).max().unwrap_or(0);
    if width == 0 {
        return None;
    }

    let mut rows = matrix;
    for row in &mut rows {
        row.resize(width, String::new());
    }

    let mut out = String::new();
    out.push_str(&emit_row(&rows[0]));
    out.push('\n');
    out.push_str(&emit_row(&vec!["---".to_string(); width]));
    for row in &rows[1..] {
        out.push('\n');
        out.push_str(&emit_row(row));
    }
    Some(out)
}

fn emit_row(cells: &[String]) -> String {
    let mut line = String::from("|");
    for cell in cells {
        line.push(' ');
        line.push_str(cell);
        line.push_str(" |");
    }
    line
}

/// Tries the matrix encodings in order: a `rows` field, a `cells` field, a
/// `cell_ids` field, then row-major slicing of the block's children against
/// declared row/column counts
fn extract_matrix(node: &BlockNode, index: &BlockIndex) -> Option<Vec<Vec<String>>> {
    let payload = node.payload();
    let (row_size, column_size) = declared_sizes(node, payload);

    for field in ["rows", "cells", "cell_ids"] {
        let value = payload
            .and_then(|p| p.get(field))
            .or_else(|| node.raw.get(field));
        if let Some(value) = value {
            if let Some(matrix) = value_matrix(value, index, row_size, column_size) {
                return Some(matrix);
            }
        }
    }

    // Reconstruct from linked children when the table declares its shape
    let (rows, columns) = (row_size?, column_size?);
    if rows == 0 || columns == 0 {
        return None;
    }
    let children = node.child_ids();
    if children.len() < rows * columns {
        return None;
    }
    let cells: Vec<String> = children
        .iter()
        .take(rows * columns)
        .map(|id| resolve_cell(&Value::String(id.clone()), index))
        .collect();
    Some(cells.chunks(columns).map(|chunk| chunk.to_vec()).collect())
}

/// Reads declared row/column counts from the payload's property object or
/// directly from the payload/record
fn declared_sizes(node: &BlockNode, payload: Option<&Value>) -> (Option<usize>, Option<usize>) {
    let sources = [
        payload.and_then(|p| p.get("property")),
        payload,
        node.raw.get("property"),
        Some(&node.raw),
    ];
    for source in sources.into_iter().flatten() {
        let rows = size_field(source, "row_size");
        let columns = size_field(source, "column_size");
        if rows.is_some() || columns.is_some() {
            return (rows, columns);
        }
    }
    (None, None)
}

fn size_field(value: &Value, key: &str) -> Option<usize> {
    value
        .get(key)
        .and_then(Value::as_u64)
        .map(|n| n as usize)
        .filter(|n| *n > 0)
}

/// Interprets a rows/cells/cell_ids value as a matrix
///
/// An array of arrays is taken as-is; a flat array needs declared sizes to
/// slice row-major.
fn value_matrix(
    value: &Value,
    index: &BlockIndex,
    row_size: Option<usize>,
    column_size: Option<usize>,
) -> Option<Vec<Vec<String>>> {
    let items = value.as_array()?;
    if items.is_empty() {
        return None;
    }

    if items.iter().all(|item| item.is_array()) {
        return Some(
            items
                .iter()
                .map(|row| {
                    row.as_array()
                        .map(|cells| cells.iter().map(|c| resolve_cell(c, index)).collect())
                        .unwrap_or_default()
                })
                .collect(),
        );
    }

    let columns = column_size?;
    let rows = row_size.unwrap_or_else(|| items.len().div_ceil(columns));
    if columns == 0 || rows == 0 {
        return None;
    }
    let cells: Vec<String> = items
        .iter()
        .take(rows * columns)
        .map(|c| resolve_cell(c, index))
        .collect();
    Some(cells.chunks(columns).map(|chunk| chunk.to_vec()).collect())
}

/// Resolves one cell entry to sanitized text
///
/// A string that names a block in the index resolves to that block's text;
/// any other string is literal. Objects are rendered as rich text.
fn resolve_cell(value: &Value, index: &BlockIndex) -> String {
    let text = match value {
        Value::String(s) => match index.get(s) {
            Some(node) => block_text(node, index),
            None => s.clone(),
        },
        Value::Object(_) => {
            if let Some(elements) = value.get("elements") {
                inline::styled_elements(elements)
            } else {
                String::new()
            }
        }
        Value::Number(n) => n.to_string(),
        _ => String::new(),
    };
    sanitize_cell(&text)
}

/// Rich-text-aware text of a block, descending into its children when the
/// block itself carries no elements
pub(crate) fn block_text(node: &BlockNode, index: &BlockIndex) -> String {
    let mut visited = HashSet::new();
    block_text_inner(node, index, &mut visited)
}

fn block_text_inner(node: &BlockNode, index: &BlockIndex, visited: &mut HashSet<String>) -> String {
    if let Some(id) = &node.id {
        if !visited.insert(id.clone()) {
            return String::new();
        }
    }

    let own = match node.block_type {
        BlockType::Code => node.payload().map(inline::plain_text).unwrap_or_default(),
        _ => node.payload().map(inline::rich_text).unwrap_or_default(),
    };
    if !own.is_empty() {
        return own;
    }

    let parts: Vec<String> = node
        .child_ids()
        .iter()
        .filter_map(|id| index.get(id))
        .map(|child| block_text_inner(child, index, visited))
        .filter(|text| !text.is_empty())
        .collect();
    parts.join("\n")
}

/// Escapes pipes and folds embedded newlines for a table cell
fn sanitize_cell(text: &str) -> String {
    text.replace('|', "\\|")
        .replace("\r\n", "<br>")
        .replace('\n', "<br>")
}
