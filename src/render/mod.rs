//! Document-model renderer: block list → Markdown
//!
//! The renderer is a pure transform over already-fetched data. A one-pass
//! preprocessing step resolves the loosely-typed block records into a closed
//! index of typed nodes; the rendering pass then dispatches on the resolved
//! tag and never probes raw shapes again.

mod code;
mod index;
mod inline;
mod markdown;
mod table;

pub use index::{BlockIndex, BlockNode, BlockType};
pub use markdown::{has_markdown_body_content, normalize_markdown, render};
