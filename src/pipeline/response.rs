//! Response parsing: turn the rewriting service's free-form answer into
//! `{index, text}` entries.
//!
//! Even well-prompted models wrap JSON in ```` ```json ```` fences, prepend a
//! sentence of chatter, emit CRLF line endings, or sprinkle zero-width
//! characters. Cleanup runs first, in this order:
//!
//! 1. Normalise line endings (CRLF → LF)
//! 2. Strip invisible Unicode (zero-width spaces, BOM, …)
//! 3. Strip the fenced code block wrapper (fence + language tag, payload,
//!    closing fence), or cut down to the outermost JSON value when the
//!    model added prose around it
//!
//! Parsing then accepts three shapes:
//!
//! ```text
//! [{"index": 0, "text": "…"}, …]             list (preferred)
//! {"fragments": [{"index": 0, "text": "…"}]}  wrapped list
//! {"0": "…", "1": "…"}                        keyed object
//! ```
//!
//! Anything else fails loudly with [`DocPatchError::MalformedResponse`]; an
//! unparseable answer is never replaced by blank text.

use crate::error::DocPatchError;
use crate::fragment::GeneratedFragment;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Parse a raw service answer into generated fragments, in answer order.
pub fn parse_generated(raw: &str) -> Result<Vec<GeneratedFragment>, DocPatchError> {
    let s = normalise_line_endings(raw);
    let s = remove_invisible_chars(&s);
    if s.trim().is_empty() {
        return Err(DocPatchError::EmptyResponse);
    }
    let payload = strip_code_fence(&s);
    let payload = outermost_json(payload).unwrap_or(payload);

    let parsed: ResponseShape =
        serde_json::from_str(payload).map_err(|e| malformed(e.to_string(), raw))?;

    let items = match parsed {
        ResponseShape::List(items) | ResponseShape::Wrapped { fragments: items } => items
            .into_iter()
            .map(|item| {
                Ok(GeneratedFragment {
                    index: item.index.resolve().ok_or_else(|| {
                        malformed(format!("invalid index {:?}", item.index), raw)
                    })?,
                    text: item.text,
                })
            })
            .collect::<Result<Vec<_>, DocPatchError>>()?,
        ResponseShape::Keyed(map) => map
            .into_iter()
            .map(|(key, text)| {
                let index = key
                    .trim()
                    .parse::<usize>()
                    .map_err(|_| malformed(format!("non-numeric key {key:?}"), raw))?;
                Ok(GeneratedFragment { index, text })
            })
            .collect::<Result<Vec<_>, DocPatchError>>()?,
    };

    Ok(items)
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResponseShape {
    List(Vec<ResponseItem>),
    Wrapped { fragments: Vec<ResponseItem> },
    Keyed(BTreeMap<String, Option<String>>),
}

#[derive(Debug, Deserialize)]
struct ResponseItem {
    index: IndexRepr,
    #[serde(default)]
    text: Option<String>,
}

/// Models sometimes quote numbers; accept `3` and `"3"` alike.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum IndexRepr {
    Number(u64),
    Text(String),
}

impl IndexRepr {
    fn resolve(&self) -> Option<usize> {
        match self {
            IndexRepr::Number(n) => usize::try_from(*n).ok(),
            IndexRepr::Text(s) => s.trim().parse().ok(),
        }
    }
}

fn malformed(detail: String, raw: &str) -> DocPatchError {
    DocPatchError::MalformedResponse {
        detail,
        excerpt: raw.trim().chars().take(80).collect(),
    }
}

// ── Cleanup rules ────────────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn remove_invisible_chars(input: &str) -> String {
    input.replace(['\u{200B}', '\u{FEFF}', '\u{200C}', '\u{200D}', '\u{2060}'], "")
}

static RE_CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)```[ \t]*[A-Za-z0-9_+-]*[ \t]*\n(.*?)\n[ \t]*```").unwrap()
});

/// Return the payload of the first fenced block, or the input unchanged.
fn strip_code_fence(input: &str) -> &str {
    RE_CODE_FENCE
        .captures(input)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .unwrap_or_else(|| input.trim())
}

/// Slice from the first `[` or `{` to its last matching closer.
///
/// Handles "Here is the JSON: [...] Let me know!" without a full parser: the
/// candidate is accepted only if it is itself valid JSON.
fn outermost_json(input: &str) -> Option<&str> {
    let start = input.find(['[', '{'])?;
    let closer = if input[start..].starts_with('[') { ']' } else { '}' };
    let end = input.rfind(closer)?;
    if end <= start {
        return None;
    }
    let candidate = &input[start..=end];
    serde_json::from_str::<serde_json::Value>(candidate)
        .ok()
        .map(|_| candidate)
}
