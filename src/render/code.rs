use serde_json::Value;

/// Numeric code-language ids used by the service's code blocks
const LANGUAGE_IDS: &[(i64, &str)] = &[
    (1, "text"),
    (7, "bash"),
    (8, "csharp"),
    (9, "cpp"),
    (10, "c"),
    (12, "css"),
    (15, "dart"),
    (18, "dockerfile"),
    (22, "go"),
    (24, "html"),
    (28, "json"),
    (29, "java"),
    (30, "javascript"),
    (32, "kotlin"),
    (33, "latex"),
    (36, "lua"),
    (38, "makefile"),
    (39, "markdown"),
    (41, "objectivec"),
    (43, "php"),
    (44, "perl"),
    (46, "powershell"),
    (48, "protobuf"),
    (49, "python"),
    (50, "r"),
    (52, "ruby"),
    (53, "rust"),
    (55, "scss"),
    (56, "sql"),
    (57, "scala"),
    (60, "shell"),
    (61, "swift"),
    (63, "typescript"),
    (66, "xml"),
    (67, "yaml"),
];

/// Normalizes a language name or alias to its canonical fence tag
pub fn normalize_language(raw: &str) -> String {
    let lower = raw.trim().to_lowercase();
    match lower.as_str() {
        "js" => "javascript",
        "ts" => "typescript",
        "yml" => "yaml",
        "sh" | "zsh" => "shell",
        "py" => "python",
        "rb" => "ruby",
        "golang" => "go",
        "c++" => "cpp",
        "cs" | "c#" => "csharp",
        "objective-c" | "objc" => "objectivec",
        "plain" | "plaintext" | "txt" => "text",
        "md" => "markdown",
        other => other,
    }
    .to_string()
}

/// Resolves the fence language for a code block
///
/// Reads the style-level language (numeric id or string alias), falling back
/// to a block-level language field, then refines by content: JavaScript and
/// TypeScript bodies that look like JSX become `jsx`/`tsx`, and HTML or plain
/// text carrying both a `<template>` and a `<script>` tag becomes `vue`.
/// Refinement is skipped for empty content.
pub fn resolve_fence_language(block: &Value, payload: Option<&Value>, content: &str) -> String {
    let style = payload.and_then(|p| p.get("style"));

    let mut language = style
        .and_then(|s| s.get("language"))
        .and_then(language_value)
        .unwrap_or_default();

    if language.is_empty() {
        language = block
            .get("language")
            .and_then(language_value)
            .unwrap_or_default();
    }

    if content.trim().is_empty() {
        return language;
    }

    match language.as_str() {
        "javascript" if looks_like_jsx(content) => "jsx".to_string(),
        "typescript" if looks_like_jsx(content) => "tsx".to_string(),
        "html" | "text" if looks_like_vue(content) => "vue".to_string(),
        _ => language,
    }
}

fn language_value(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .and_then(|id| LANGUAGE_IDS.iter().find(|(code, _)| *code == id))
            .map(|(_, name)| name.to_string()),
        Value::String(s) if !s.trim().is_empty() => Some(normalize_language(s)),
        _ => None,
    }
}

/// Heuristic for JSX-style bodies: capitalized tag elements, `return (<`, or
/// a fragment opener
fn looks_like_jsx(content: &str) -> bool {
    if content.contains("return (<") || content.contains("<>") {
        return true;
    }
    let bytes = content.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'<' {
            if let Some(next) = bytes.get(i + 1) {
                if next.is_ascii_uppercase() {
                    return true;
                }
            }
        }
    }
    false
}

fn looks_like_vue(content: &str) -> bool {
    content.contains("<template") && content.contains("<script")
}
