//! Markdown frontmatter and heuristic thread-digest extraction.
//!
//! Message archive files are Markdown with a JSON frontmatter block
//! delimited by `---json` / `---`, per the on-disk format. The digesting
//! heuristics in `summarize_thread` (key points, action items) are pure
//! string scans over message bodies — no Markdown AST is required for the
//! line-prefix and action-keyword rules the specification defines.

use regex::Regex;
use std::sync::LazyLock;

/// Render a message file: `---json\n{frontmatter}\n---\n\n{body}`.
pub fn render_frontmatter(frontmatter_json: &str, body_md: &str) -> String {
    format!("---json\n{frontmatter_json}\n---\n\n{body_md}")
}

/// Split a rendered message file back into its frontmatter JSON and body.
/// Returns `None` if the file does not start with a `---json` block.
pub fn parse_frontmatter(contents: &str) -> Option<(&str, &str)> {
    let rest = contents.strip_prefix("---json\n")?;
    let end = rest.find("\n---\n")?;
    let frontmatter = &rest[..end];
    let body = rest[end + "\n---\n".len()..].trim_start_matches('\n');
    Some((frontmatter, body))
}

/// Extract key points: lines beginning with `# `, `## `, `- `, `* ` in any
/// message body, trimmed and deduplicated, truncated to 12 items.
pub fn extract_key_points<'a>(bodies: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut points = Vec::new();

    for body in bodies {
        for line in body.lines() {
            let trimmed = line.trim();
            let candidate = if let Some(rest) = trimmed.strip_prefix("## ") {
                Some(rest.trim())
            } else if let Some(rest) = trimmed.strip_prefix("# ") {
                Some(rest.trim())
            } else if let Some(rest) = trimmed.strip_prefix("- ") {
                Some(rest.trim())
            } else if let Some(rest) = trimmed.strip_prefix("* ") {
                Some(rest.trim())
            } else {
                None
            };

            if let Some(point) = candidate {
                if !point.is_empty() && seen.insert(point.to_string()) {
                    points.push(point.to_string());
                    if points.len() >= 12 {
                        return points;
                    }
                }
            }
        }
    }

    points
}

static ACTION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^\s*(?:-|\*|\d+\.)?\s*(?:\[(?: |x)\]\s*)?(?:TODO|ACTION|FIXME|NEXT|BLOCKED)[:\-]\s*(.+)$",
    )
    .expect("static action regex is valid")
});

/// Extract action items matching the fixed TODO/ACTION/FIXME/NEXT/BLOCKED
/// pattern, case-insensitive, capturing the remainder of the line,
/// truncated to 12 items.
pub fn extract_actions<'a>(bodies: impl IntoIterator<Item = &'a str>) -> Vec<String> {
    let mut actions = Vec::new();
    for body in bodies {
        for line in body.lines() {
            if let Some(caps) = ACTION_RE.captures(line) {
                if let Some(m) = caps.get(1) {
                    actions.push(m.as_str().trim().to_string());
                    if actions.len() >= 12 {
                        return actions;
                    }
                }
            }
        }
    }
    actions
}

/// Markdown image references: `![alt](url)`. Returns `(alt, url)` pairs in
/// document order.
pub fn extract_image_refs(body_md: &str) -> Vec<(String, String)> {
    static IMG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\(([^)\s]+)\)").expect("static image regex is valid"));
    IMG_RE
        .captures_iter(body_md)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_frontmatter() {
        let rendered = render_frontmatter(r#"{"a":1}"#, "hello\nworld");
        let (fm, body) = parse_frontmatter(&rendered).unwrap();
        assert_eq!(fm, r#"{"a":1}"#);
        assert_eq!(body, "hello\nworld");
    }

    #[test]
    fn extracts_key_points_deduplicated_and_truncated() {
        let bodies = vec!["# Title\n- point one\n- point one\n* point two"];
        let points = extract_key_points(bodies);
        assert_eq!(points, vec!["Title", "point one", "point two"]);
    }

    #[test]
    fn extracts_actions_case_insensitive() {
        let bodies = vec!["- TODO: fix the thing\n2. action: ship it\nblocked- wait on review"];
        let actions = extract_actions(bodies);
        assert_eq!(actions, vec!["fix the thing", "ship it", "wait on review"]);
    }

    #[test]
    fn extracts_checkbox_action_items() {
        let bodies = vec!["- [ ] NEXT: review PR\n- [x] FIXME: typo"];
        let actions = extract_actions(bodies);
        assert_eq!(actions, vec!["review PR", "typo"]);
    }

    #[test]
    fn extracts_markdown_image_refs() {
        let refs = extract_image_refs("see ![a diagram](./diagram.png) and ![](data:image/png;base64,AA==)");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].0, "a diagram");
        assert_eq!(refs[1].1.starts_with("data:image/png"), true);
    }
}
