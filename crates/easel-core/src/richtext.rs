//! Plain-text extraction from editor rich-text documents.
//!
//! The canvas editor stores text shapes as a ProseMirror-style tree: nodes
//! are JSON objects with an optional `text` leaf field and an optional
//! `content` array of children. The walk is explicit and depth-limited so a
//! hostile payload cannot overflow the stack; subtrees past the limit are
//! skipped.

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::defaults::RICHTEXT_MAX_DEPTH;

/// Extract plain text from a rich-text tree, paragraph boundaries joined
/// with newlines. Returns an empty string for non-text payloads.
pub fn extract_plain_text(root: &JsonValue) -> String {
    let mut out = String::new();
    walk(root, 0, &mut out);
    out.trim().to_string()
}

fn walk(node: &JsonValue, depth: usize, out: &mut String) {
    if depth > RICHTEXT_MAX_DEPTH {
        debug!(depth, "rich-text tree exceeds depth limit, skipping subtree");
        return;
    }

    match node {
        JsonValue::Array(items) => {
            for item in items {
                walk(item, depth + 1, out);
            }
        }
        JsonValue::Object(map) => {
            if let Some(text) = map.get("text").and_then(|v| v.as_str()) {
                out.push_str(text);
            }
            if let Some(children) = map.get("content") {
                walk(children, depth + 1, out);
            }
            // Block-level nodes end a line.
            let node_type = map.get("type").and_then(|v| v.as_str());
            if matches!(node_type, Some("paragraph") | Some("heading") | Some("listItem"))
                && !out.is_empty()
                && !out.ends_with('\n')
            {
                out.push('\n');
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extracts_simple_paragraph() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "Hello world"}]}
            ]
        });
        assert_eq!(extract_plain_text(&doc), "Hello world");
    }

    #[test]
    fn test_joins_paragraphs_with_newline() {
        let doc = json!({
            "type": "doc",
            "content": [
                {"type": "paragraph", "content": [{"type": "text", "text": "First"}]},
                {"type": "paragraph", "content": [{"type": "text", "text": "Second"}]}
            ]
        });
        assert_eq!(extract_plain_text(&doc), "First\nSecond");
    }

    #[test]
    fn test_concatenates_inline_runs() {
        let doc = json!({
            "type": "paragraph",
            "content": [
                {"type": "text", "text": "bold"},
                {"type": "text", "text": " and plain"}
            ]
        });
        assert_eq!(extract_plain_text(&doc), "bold and plain");
    }

    #[test]
    fn test_ignores_non_text_payloads() {
        assert_eq!(extract_plain_text(&json!(42)), "");
        assert_eq!(extract_plain_text(&json!(null)), "");
        assert_eq!(extract_plain_text(&json!("bare string")), "");
        assert_eq!(extract_plain_text(&json!({})), "");
    }

    #[test]
    fn test_depth_limit_skips_deep_subtree() {
        // Build a chain deeper than the limit with text at the bottom.
        let mut node = json!({"type": "text", "text": "buried"});
        for _ in 0..(RICHTEXT_MAX_DEPTH + 10) {
            node = json!({"type": "paragraph", "content": [node]});
        }
        assert_eq!(extract_plain_text(&node), "");
    }

    #[test]
    fn test_text_within_depth_limit_survives() {
        let mut node = json!({"type": "text", "text": "reachable"});
        for _ in 0..10 {
            node = json!({"type": "doc", "content": [node]});
        }
        assert_eq!(extract_plain_text(&node), "reachable");
    }
}
