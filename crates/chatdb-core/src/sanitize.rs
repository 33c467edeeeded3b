//! Removal of prose and markup from generated text.
//!
//! Generation providers wrap the query in code fences and surround it with
//! headings, bullet lists, and explanations. [`sanitize`] keeps only the
//! lines that can be part of the query itself. The parser still treats the
//! result as untrusted.

use crate::error::PipelineError;
use crate::models::SanitizedPayload;

/// Lines whose trimmed, lower-cased form starts with one of these are prose.
pub const PROSE_MARKERS: &[&str] = &[
    "**",
    "--",
    "*",
    "- ",
    "• ",
    "#",
    "this query does",
    "this query will",
    "example",
    "explanation",
    "note",
    "remember",
    "here is",
    "here's",
];

/// Language tags that may follow an opening fence.
const FENCE_LANGUAGES: &[&str] = &[
    "sql",
    "sqlite",
    "mysql",
    "python",
    "py",
    "json",
    "javascript",
    "js",
    "mongodb",
    "mongo",
    "text",
];

const FENCE: &str = "```";

/// Strips fence markup from one line. `None` means the line is a bare fence
/// delimiter (optionally with a language tag) and carries no payload.
fn strip_fence(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix(FENCE) else {
        let end = line.trim_end();
        return Some(end.strip_suffix(FENCE).unwrap_or(line));
    };

    let rest = rest.strip_suffix(FENCE).unwrap_or(rest).trim();
    if rest.is_empty() {
        return None;
    }

    let lower = rest.to_ascii_lowercase();
    for lang in FENCE_LANGUAGES {
        if lower == *lang {
            return None;
        }
        if lower.starts_with(lang)
            && rest[lang.len()..].starts_with(|c: char| c.is_whitespace())
        {
            return Some(rest[lang.len()..].trim_start());
        }
    }
    Some(rest)
}

/// True when the line is explanatory prose rather than payload.
pub fn is_prose(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    PROSE_MARKERS.iter().any(|marker| lower.starts_with(marker))
}

/// Remove fence delimiters and prose lines, then trim the result.
///
/// Remaining lines keep their relative order and are joined with `\n`.
/// Applying `sanitize` to its own output returns the same text.
///
/// # Errors
///
/// [`PipelineError::EmptyPayload`] when no payload line survives.
pub fn sanitize(raw: &str) -> Result<SanitizedPayload, PipelineError> {
    let kept: Vec<&str> = raw
        .lines()
        .filter_map(strip_fence)
        .filter(|line| !is_prose(line))
        .collect();

    let payload = kept.join("\n").trim().to_string();
    if payload.is_empty() {
        return Err(PipelineError::EmptyPayload);
    }
    Ok(SanitizedPayload::new(payload))
}
