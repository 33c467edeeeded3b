//! Prompt assembly for the generation provider.
//!
//! The prompt tells the provider which output grammar the parser accepts.
//! That is a hint only: [`crate::parser`] enforces the grammar.

use crate::models::{GenerationPrompt, SchemaSummary, StoreKind};

const RELATIONAL_PREAMBLE: &str = "You are generating SQLite queries. The current database schema is:\n";

const RELATIONAL_RULES: &str = "\nOnly use these tables. Do not assume any additional tables exist.\n\
Return one or more valid SQL statements separated by `;`.\n\
Return only SQL. Do not include any markdown or explanation.\n\n";

const DOCUMENT_PREAMBLE: &str = "You are working with the following document database schema:\n";

const DOCUMENT_RULES: &str = "\nRespond with exactly one of the following literal structures:\n\
- For a read query: ('collection_name', filter_mapping)\n\
- For aggregation: ('collection_name', [stage_mapping, ...])\n\
- For updates: ('collection_name', (filter_mapping, update_mapping))\n\n\
Use only data literals: strings, numbers, true/false/null, mappings, and lists.\n\
Do NOT wrap anything in db[...] or method calls. Return only the tuple.\n\
Examples:\n\
('doctors', {\"years_experience\": {\"$gt\": 20}})\n\
('doctors', [{\"$match\": {\"specialty\": \"ENT\"}}, {\"$project\": {\"name\": 1, \"_id\": 0}}])\n\
('doctors', ({\"name\": {\"$regex\": \"Smith$\"}}, {\"$set\": {\"years_experience\": 30}}))\n\n";

/// Render one `- <container> with fields: [a, b]` line per container.
pub fn render_schema(schema: &SchemaSummary) -> String {
    if schema.is_empty() {
        return "- (no containers found)\n".to_string();
    }
    let mut out = String::new();
    for (container, fields) in schema.iter() {
        out.push_str(&format!(
            "- {} with fields: [{}]\n",
            container,
            fields.join(", ")
        ));
    }
    out
}

/// Build the prompt for one request. Deterministic for equal inputs.
pub fn assemble_prompt(schema: &SchemaSummary, kind: StoreKind, request: &str) -> GenerationPrompt {
    let (preamble, rules) = match kind {
        StoreKind::Relational => (RELATIONAL_PREAMBLE, RELATIONAL_RULES),
        StoreKind::Document => (DOCUMENT_PREAMBLE, DOCUMENT_RULES),
    };

    let mut text = String::with_capacity(preamble.len() + rules.len() + request.len() + 256);
    text.push_str(preamble);
    text.push_str(&render_schema(schema));
    text.push_str(rules);
    text.push_str(request);
    GenerationPrompt::new(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> SchemaSummary {
        vec![("orders", vec!["id".to_string(), "total".to_string()])]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_schema_lines() {
        assert_eq!(render_schema(&orders()), "- orders with fields: [id, total]\n");
    }

    #[test]
    fn test_relational_prompt_contains_parts_in_order() {
        let prompt = assemble_prompt(&orders(), StoreKind::Relational, "big orders please");
        let text = prompt.as_str();
        let schema_at = text.find("- orders with fields: [id, total]").unwrap();
        let rules_at = text.find("separated by `;`").unwrap();
        assert!(text.starts_with("You are generating SQLite queries"));
        assert!(schema_at < rules_at);
        assert!(text.ends_with("big orders please"));
    }

    #[test]
    fn test_document_prompt_names_grammar() {
        let prompt = assemble_prompt(&SchemaSummary::new(), StoreKind::Document, "find ENT");
        let text = prompt.as_str();
        assert!(text.contains("(no containers found)"));
        assert!(text.contains("('collection_name', (filter_mapping, update_mapping))"));
        assert!(text.ends_with("find ENT"));
    }

    #[test]
    fn test_deterministic() {
        let a = assemble_prompt(&orders(), StoreKind::Document, "q");
        let b = assemble_prompt(&orders(), StoreKind::Document, "q");
        assert_eq!(a, b);
    }
}
