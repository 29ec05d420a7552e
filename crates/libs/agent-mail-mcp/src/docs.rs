//! Markdown documentation generation for the tool directory.

use crate::tools::ToolSchema;

/// Renders the tool directory as a single Markdown reference page.
pub fn generate_markdown_docs(schemas: &[ToolSchema]) -> String {
    let mut md = String::from("# Agent Mail Tool Reference\n\n");
    md.push_str(&format!("Total tools: {}\n\n", schemas.len()));

    md.push_str("## Writer verbs\n\n");
    for schema in schemas.iter().filter(|s| s.writer) {
        md.push_str(&format!("- `{}` — {}\n", schema.name, schema.description));
    }

    md.push_str("\n## Reader verbs\n\n");
    for schema in schemas.iter().filter(|s| !s.writer) {
        md.push_str(&format!("- `{}` — {}\n", schema.name, schema.description));
    }

    md
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_every_schema_once() {
        let schemas = crate::tools::get_tool_schemas(false);
        let md = generate_markdown_docs(&schemas);
        for schema in &schemas {
            assert!(md.contains(&schema.name), "missing {} in docs", schema.name);
        }
    }
}
