use serde_json::Value;

/// Renders a payload's rich-text elements with inline styling
pub fn rich_text(payload: &Value) -> String {
    payload
        .get("elements")
        .map(styled_elements)
        .unwrap_or_default()
}

/// Renders rich-text elements without any styling (code block content)
pub fn plain_text(payload: &Value) -> String {
    payload
        .get("elements")
        .and_then(Value::as_array)
        .map(|elements| {
            elements
                .iter()
                .filter_map(element_content)
                .collect::<Vec<_>>()
                .concat()
        })
        .unwrap_or_default()
}

/// Renders an element array with inline styling
pub fn styled_elements(elements: &Value) -> String {
    elements
        .as_array()
        .map(|elements| {
            elements
                .iter()
                .map(styled_element)
                .collect::<Vec<_>>()
                .concat()
        })
        .unwrap_or_default()
}

fn styled_element(element: &Value) -> String {
    if let Some(run) = element.get("text_run") {
        let content = run
            .get("content")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let style = run
            .get("text_element_style")
            .cloned()
            .unwrap_or(Value::Null);
        return compose(content, &style);
    }
    // Document mentions degrade to their title text
    if let Some(mention) = element.get("mention_doc") {
        let title = mention
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or_default();
        if let Some(url) = mention.get("url").and_then(Value::as_str) {
            if !url.is_empty() {
                return format!("[{}]({})", title, url);
            }
        }
        return title.to_string();
    }
    element_content(element).unwrap_or_default()
}

fn element_content(element: &Value) -> Option<String> {
    if let Some(run) = element.get("text_run") {
        return run
            .get("content")
            .and_then(Value::as_str)
            .map(|s| s.to_string());
    }
    element
        .get("content")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

/// Applies inline styles in a fixed order so runs with several flags nest
/// consistently: inline code, bold, italic, strikethrough, underline, link
pub fn compose(content: &str, style: &Value) -> String {
    if content.is_empty() {
        return String::new();
    }

    let mut text = content.to_string();
    if flag(style, "inline_code") {
        text = wrap_inline_code(&text);
    }
    if flag(style, "bold") {
        text = format!("**{}**", text);
    }
    if flag(style, "italic") {
        text = format!("*{}*", text);
    }
    if flag(style, "strikethrough") {
        text = format!("~~{}~~", text);
    }
    if flag(style, "underline") {
        text = format!("<u>{}</u>", text);
    }
    if let Some(url) = style
        .get("link")
        .and_then(|l| l.get("url"))
        .and_then(Value::as_str)
    {
        if !url.is_empty() {
            text = format!("[{}]({})", text, url);
        }
    }
    text
}

/// Wraps content in an inline-code span
///
/// The backtick fence widens past the longest backtick run already in the
/// content, with a space pad when the content starts or ends with a backtick.
pub fn wrap_inline_code(content: &str) -> String {
    let mut longest = 0usize;
    let mut run = 0usize;
    for c in content.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    let fence = "`".repeat(longest + 1);
    let pad = if content.starts_with('`') || content.ends_with('`') {
        " "
    } else {
        ""
    };
    format!("{fence}{pad}{content}{pad}{fence}")
}

fn flag(style: &Value, name: &str) -> bool {
    style.get(name).and_then(Value::as_bool).unwrap_or(false)
}
