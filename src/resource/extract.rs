use crate::resource::locator::parse_resource_url;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::OnceLock;

fn url_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"https?://[^\s"'<>\\\)\]]+"#).expect("valid URL pattern"))
}

/// Extracts workspace resource URLs from an arbitrary nested value
///
/// Walks strings, arrays, and objects depth-first in their natural order,
/// matches URL-like substrings, and keeps only the ones that parse into a
/// resource reference. First-occurrence order is preserved; duplicates are
/// collapsed by canonical URL.
pub fn extract_links(value: &Value, domains: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    walk(value, domains, &mut out, &mut seen);
    out
}

/// Extracts workspace resource URLs from plain text
pub fn extract_links_from_text(text: &str, domains: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    let mut seen = HashSet::new();
    scan_text(text, domains, &mut out, &mut seen);
    out
}

fn walk(value: &Value, domains: &[String], out: &mut Vec<String>, seen: &mut HashSet<String>) {
    match value {
        Value::String(s) => scan_text(s, domains, out, seen),
        Value::Array(items) => {
            for item in items {
                walk(item, domains, out, seen);
            }
        }
        Value::Object(map) => {
            for (_, v) in map {
                walk(v, domains, out, seen);
            }
        }
        _ => {}
    }
}

fn scan_text(text: &str, domains: &[String], out: &mut Vec<String>, seen: &mut HashSet<String>) {
    for m in url_pattern().find_iter(text) {
        // Sentence punctuation glued to the end of a URL is not part of it
        let candidate = m
            .as_str()
            .trim_end_matches(|c| matches!(c, '.' | ',' | ';' | ':' | '!' | '?'));
        if let Some(r) = parse_resource_url(candidate, domains) {
            if seen.insert(r.url.clone()) {
                out.push(r.url);
            }
        }
    }
}
