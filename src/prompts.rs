//! Prompts for the rewriting service.
//!
//! Callers can override the system prompt via
//! [`crate::config::RewriteConfig::system_prompt`]; the constant here is used
//! only when no override is provided. The user message is always built by
//! [`rewrite_request`] because it carries the index contract the response
//! parser relies on.

use crate::fragment::Fragment;
use serde::Serialize;

/// Default system prompt for fragment rewriting.
pub const DEFAULT_SYSTEM_PROMPT: &str = r#"You are an expert editor. You receive numbered text fragments cut from a document (a resume, a cover letter, a report) and a description of the goal the document must serve. Rewrite the fragments so the document serves that goal better.

Follow these rules precisely:

1. INDEX CONTRACT
   - Every fragment has an integer "index". Return exactly the indices you were given.
   - Never invent, merge, split, or renumber indices.

2. WHAT TO CHANGE
   - Rewrite wording only where it helps the goal. Keep facts, names, dates, numbers and contact details unchanged.
   - If a fragment should stay as it is, return its text unchanged.
   - Keep each rewritten fragment close to the original length: it must fit back into the same place in the layout.
   - Do not add markup, LaTeX commands, or Markdown that was not in the original fragment.

3. OUTPUT FORMAT
   - Output ONLY a JSON array: [{"index": 0, "text": "..."}, {"index": 1, "text": "..."}]
   - No commentary, no explanations."#;

#[derive(Serialize)]
struct RequestFragment<'a> {
    index: usize,
    text: &'a str,
}

/// Build the user message: the goal description followed by the fragment list.
pub fn rewrite_request(context: &str, fragments: &[&Fragment]) -> String {
    let items: Vec<RequestFragment<'_>> = fragments
        .iter()
        .map(|f| RequestFragment {
            index: f.index,
            text: &f.text,
        })
        .collect();
    // Serialising `usize` + `&str` pairs cannot fail.
    let json = serde_json::to_string_pretty(&items).unwrap_or_default();

    format!(
        "<goal>\n{}\n</goal>\n\n<fragments>\n{}\n</fragments>",
        context.trim(),
        json
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fragment::Anchor;

    #[test]
    fn request_lists_indices_and_context() {
        let a = Fragment {
            index: 0,
            text: "Senior Engineer".into(),
            anchor: Anchor::Literal,
        };
        let b = Fragment {
            index: 4,
            text: "Said \"hi\"".into(),
            anchor: Anchor::Literal,
        };
        let msg = rewrite_request("  Staff role at a compiler team  ", &[&a, &b]);
        assert!(msg.starts_with("<goal>\nStaff role at a compiler team\n</goal>"));
        assert!(msg.contains("\"index\": 4"));
        assert!(msg.contains(r#"Said \"hi\""#), "text must be JSON-escaped");
    }

    #[test]
    fn default_prompt_states_json_contract() {
        assert!(DEFAULT_SYSTEM_PROMPT.contains("\"index\""));
        assert!(DEFAULT_SYSTEM_PROMPT.contains("JSON array"));
    }
}
