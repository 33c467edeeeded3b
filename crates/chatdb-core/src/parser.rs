//! Turning a sanitized payload into a [`StructuredQuery`].
//!
//! Relational payloads are split into statements. Document payloads go
//! through the restricted-literal parser in [`crate::literal`] and must have
//! the shape `(container, body)` where `body` is a mapping (filter), a
//! sequence of mappings (pipeline), or a grouping of two mappings (update).

use serde_json::Value;

use crate::error::PipelineError;
use crate::literal::{parse_literal, Literal, LiteralErrorKind};
use crate::models::{Document, StoreKind, StructuredQuery};

/// Stage name that is unwrapped when it is the only key of a filter.
pub const MATCH_STAGE: &str = "$match";

/// Parse a sanitized payload for the given store kind.
///
/// Nothing in the payload is ever executed here.
pub fn parse_query(payload: &str, kind: StoreKind) -> Result<StructuredQuery, PipelineError> {
    match kind {
        StoreKind::Relational => parse_relational(payload),
        StoreKind::Document => parse_document(payload),
    }
}

// ============ Relational ============

/// Split on `;`, trim each statement, and drop empty ones.
///
/// Semicolons inside quoted SQL text (`'...'`, `"..."`, `` `...` ``) or
/// inside comments (`/* ... */`, `-- ...` to end of line) do not split a
/// statement, and quotes inside comments are not tracked. Comments stay in
/// the statement text; a piece holding nothing but comments is dropped.
pub fn split_statements(payload: &str) -> Vec<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Scan {
        Code,
        Quoted(char),
        BlockComment,
        LineComment,
    }

    let mut statements = Vec::new();
    let mut current = String::new();
    let mut has_code = false;
    let mut state = Scan::Code;
    let mut chars = payload.chars().peekable();

    while let Some(c) = chars.next() {
        match state {
            Scan::Quoted(q) => {
                if c == q {
                    state = Scan::Code;
                }
            }
            Scan::BlockComment => {
                if c == '*' && chars.peek() == Some(&'/') {
                    current.push(c);
                    chars.next();
                    current.push('/');
                    state = Scan::Code;
                    continue;
                }
            }
            Scan::LineComment => {
                if c == '\n' {
                    state = Scan::Code;
                }
            }
            Scan::Code => match c {
                ';' => {
                    if has_code {
                        statements.push(std::mem::take(&mut current));
                    }
                    current.clear();
                    has_code = false;
                    continue;
                }
                '/' | '-' if chars.peek() == Some(&if c == '/' { '*' } else { '-' }) => {
                    current.push(c);
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                    state = if c == '/' {
                        Scan::BlockComment
                    } else {
                        Scan::LineComment
                    };
                    continue;
                }
                '\'' | '"' | '`' => {
                    has_code = true;
                    state = Scan::Quoted(c);
                }
                c if !c.is_whitespace() => has_code = true,
                _ => {}
            },
        }
        current.push(c);
    }
    if has_code {
        statements.push(current);
    }

    statements
        .into_iter()
        .map(|s| s.trim().to_string())
        .collect()
}

/// A payload that opens like a structured literal is a document-style
/// answer, not SQL. `(SELECT ...)` stays valid; `('name', ...)` does not.
fn looks_like_literal(payload: &str) -> bool {
    let trimmed = payload.trim_start();
    if trimmed.starts_with('{') || trimmed.starts_with('[') {
        return true;
    }
    match trimmed.strip_prefix('(') {
        Some(rest) => {
            let rest = rest.trim_start();
            rest.starts_with('\'')
                || rest.starts_with('"')
                || rest.starts_with('{')
                || rest.starts_with('[')
        }
        None => false,
    }
}

fn parse_relational(payload: &str) -> Result<StructuredQuery, PipelineError> {
    if looks_like_literal(payload) {
        return Err(shape_mismatch(
            payload,
            "expected SQL statements, found a structured literal",
        ));
    }
    let statements = split_statements(payload);
    if statements.is_empty() {
        return Err(PipelineError::EmptyPayload);
    }
    Ok(StructuredQuery::RelationalStatements { statements })
}

// ============ Document ============

fn shape_mismatch(payload: &str, reason: impl Into<String>) -> PipelineError {
    PipelineError::ShapeMismatch {
        payload: payload.to_string(),
        reason: reason.into(),
    }
}

fn into_document(payload: &str, literal: Literal, what: &str) -> Result<Document, PipelineError> {
    match literal {
        Literal::Mapping(_) => match literal.into_json() {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(shape_mismatch(payload, format!("{} must be a mapping", what))),
            Err(reason) => Err(shape_mismatch(payload, reason)),
        },
        other => Err(shape_mismatch(
            payload,
            format!("{} must be a mapping, found {}", what, other.type_name()),
        )),
    }
}

/// `{"$match": M}` with a mapping `M` becomes `M`.
pub fn unwrap_match_stage(filter: Document) -> Document {
    if filter.len() == 1 {
        if let Some(Value::Object(inner)) = filter.get(MATCH_STAGE) {
            return inner.clone();
        }
    }
    filter
}

fn parse_document(payload: &str) -> Result<StructuredQuery, PipelineError> {
    let literal = parse_literal(payload).map_err(|err| match err.kind {
        LiteralErrorKind::Unsafe => PipelineError::UnsafePayload {
            payload: payload.to_string(),
            reason: err.to_string(),
        },
        LiteralErrorKind::Malformed => shape_mismatch(payload, err.to_string()),
    })?;

    let mut parts = match literal {
        Literal::Group(parts) if parts.len() == 2 => parts,
        Literal::Group(parts) => {
            return Err(shape_mismatch(
                payload,
                format!(
                    "expected a (collection, query) pair, found a grouping of {}",
                    parts.len()
                ),
            ))
        }
        other => {
            return Err(shape_mismatch(
                payload,
                format!(
                    "expected a (collection, query) pair, found a {}",
                    other.type_name()
                ),
            ))
        }
    };

    let body = parts.pop().unwrap_or(Literal::Null);
    let container = match parts.pop() {
        Some(Literal::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
        Some(Literal::String(_)) => {
            return Err(shape_mismatch(payload, "collection name must not be empty"))
        }
        Some(other) => {
            return Err(shape_mismatch(
                payload,
                format!("collection name must be a string, found {}", other.type_name()),
            ))
        }
        None => return Err(shape_mismatch(payload, "missing collection name")),
    };

    match body {
        Literal::Mapping(_) => {
            let filter = into_document(payload, body, "filter")?;
            Ok(StructuredQuery::DocumentFilter {
                container,
                filter: unwrap_match_stage(filter),
            })
        }
        Literal::Sequence(items) => {
            let stages = items
                .into_iter()
                .map(|item| into_document(payload, item, "each pipeline stage"))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(StructuredQuery::DocumentPipeline { container, stages })
        }
        Literal::Group(pair) if pair.len() == 2 => {
            let mut pair = pair.into_iter();
            let filter = pair.next().unwrap_or(Literal::Null);
            let update = pair.next().unwrap_or(Literal::Null);
            Ok(StructuredQuery::DocumentUpdate {
                container,
                filter: into_document(payload, filter, "update filter")?,
                update: into_document(payload, update, "update document")?,
            })
        }
        Literal::Group(pair) => Err(shape_mismatch(
            payload,
            format!(
                "an update must be a (filter, update) pair, found a grouping of {}",
                pair.len()
            ),
        )),
        other => Err(shape_mismatch(
            payload,
            format!(
                "query must be a mapping, a sequence of mappings, or a (filter, update) pair; found {}",
                other.type_name()
            ),
        )),
    }
}
