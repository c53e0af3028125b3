//! LaTeX extraction: the visible text of the source, cut at markup.
//!
//! Each body line is scanned for markup (commands and their option
//! brackets, braces, inline math, `~`, `&`). The text between markup tokens
//! forms the fragments, so a fragment is cleaned text and at the same time a
//! literal substring of the raw source: the rewriter finds it again with a
//! plain substring search and the surrounding markup is never touched.
//!
//! ```text
//! \section{Experience}            → "Experience"
//! \item[--] Led a team of 5.      → "Led a team of 5."
//! \textbf{Lead} Engineer          → "Lead", "Engineer"
//! Saved 50\% of build time.       → "Saved 50\% of build time."
//! ```
//!
//! Escaped characters (`\%`, `\&`, `\$`, `\#`, `\_`, `\{`, `\}`) count as
//! text. Commands whose argument is not visible (`\label`, `\cite`,
//! `\includegraphics`, `\begin`, ...) swallow that argument.
//!
//! Never fragmented:
//! - the preamble (everything up to and including `\begin{document}`) and
//!   anything after `\end{document}`
//! - comments (an unescaped `%` to end of line)
//! - verbatim-like and math display environments
//!
//! With [`LatexGranularity::Block`] a segment that ends its line is joined
//! with a segment that opens the next line when nothing but a single line
//! break lies between them. Any markup, comment, skipped environment or
//! blank line ends the block.

use super::FragmentExtractor;
use crate::config::LatexGranularity;
use crate::error::DocPatchError;
use crate::fragment::{Anchor, RawFragment};
use crate::pipeline::input::Document;
use once_cell::sync::Lazy;
use regex::Regex;

/// Environments whose body is never rewritten.
const OPAQUE_ENVIRONMENTS: &[&str] = &[
    "verbatim",
    "verbatim*",
    "Verbatim",
    "lstlisting",
    "minted",
    "comment",
    "equation",
    "equation*",
    "align",
    "align*",
    "tikzpicture",
];

/// Commands whose first braced argument is not visible text.
const INVISIBLE_ARG_COMMANDS: &[&str] = &[
    "begin",
    "end",
    "label",
    "ref",
    "eqref",
    "pageref",
    "cite",
    "citep",
    "citet",
    "includegraphics",
    "input",
    "include",
    "vspace",
    "hspace",
    "setlength",
    "addtolength",
    "usepackage",
    "documentclass",
    "bibliographystyle",
    "bibliography",
    "pagestyle",
    "thispagestyle",
    "newcommand",
    "renewcommand",
    "url",
    "href",
    "color",
    "textcolor",
    "fontsize",
];

/// Characters that stay text when escaped with a backslash.
const ESCAPABLE: &[u8] = b"%&$#_{}";

#[derive(Debug, Clone, Copy, Default)]
pub struct LatexExtractor {
    granularity: LatexGranularity,
}

impl LatexExtractor {
    pub fn new(granularity: LatexGranularity) -> Self {
        Self { granularity }
    }
}

impl FragmentExtractor for LatexExtractor {
    fn extract(&self, document: &Document) -> Result<Vec<RawFragment>, DocPatchError> {
        let source = document.as_utf8()?;
        Ok(extract_spans(source, self.granularity)
            .into_iter()
            .map(|(start, end)| RawFragment::new(&source[start..end], Anchor::Literal))
            .collect())
    }
}

/// Byte ranges of every fragment, in source order.
pub fn extract_spans(source: &str, granularity: LatexGranularity) -> Vec<(usize, usize)> {
    let segments = body_segments(source);
    match granularity {
        LatexGranularity::Line => segments,
        LatexGranularity::Block => {
            let mut blocks: Vec<(usize, usize)> = Vec::new();
            for seg in segments {
                match blocks.last_mut() {
                    Some(last) if is_soft_break(&source[last.1..seg.0]) => last.1 = seg.1,
                    _ => blocks.push(seg),
                }
            }
            blocks
        }
    }
}

/// Whitespace holding exactly one line break.
fn is_soft_break(gap: &str) -> bool {
    gap.chars().all(char::is_whitespace) && gap.matches('\n').count() == 1
}

/// Text segments of the document body, as absolute byte ranges.
fn body_segments(source: &str) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let has_document_env = source
        .lines()
        .any(|l| strip_comment(l).0.contains(r"\begin{document}"));
    let mut in_body = !has_document_env;
    let mut opaque: Option<&'static str> = None;

    let mut offset = 0;
    for raw in source.split_inclusive('\n') {
        let line_start = offset;
        offset += raw.len();

        let (code, _) = strip_comment(raw.trim_end_matches(['\n', '\r']));

        if !in_body {
            if code.contains(r"\begin{document}") {
                in_body = true;
            }
            continue;
        }
        if code.contains(r"\end{document}") {
            break;
        }
        if let Some(env) = opaque {
            if code.contains(&format!(r"\end{{{env}}}")) {
                opaque = None;
            }
            continue;
        }
        if let Some(env) = opens_opaque(code) {
            if !code.contains(&format!(r"\end{{{env}}}")) {
                opaque = Some(env);
            }
            continue;
        }

        out.extend(
            text_segments(code)
                .into_iter()
                .map(|(s, e)| (line_start + s, line_start + e)),
        );
    }
    out
}

/// Split off an unescaped `%` comment. Returns the code part and whether a
/// comment was present.
fn strip_comment(line: &str) -> (&str, bool) {
    let bytes = line.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        if b != b'%' {
            continue;
        }
        let backslashes = bytes[..i].iter().rev().take_while(|&&c| c == b'\\').count();
        if backslashes % 2 == 0 {
            return (&line[..i], true);
        }
    }
    (line, false)
}

fn opens_opaque(code: &str) -> Option<&'static str> {
    let caps = RE_BEGIN_ENV.captures(code)?;
    let name = caps.get(1)?.as_str();
    OPAQUE_ENVIRONMENTS.iter().copied().find(|env| *env == name)
}

static RE_BEGIN_ENV: Lazy<Regex> = Lazy::new(|| Regex::new(r"\\begin\{([^}]+)\}").unwrap());

/// One lexical unit of a line.
enum Token {
    /// Visible text, this many bytes long.
    Text(usize),
    /// Markup ending at this byte offset.
    Markup(usize),
}

/// Maximal runs of visible text in one comment-free line, trimmed, keeping
/// only runs with at least one alphanumeric character.
fn text_segments(code: &str) -> Vec<(usize, usize)> {
    let mut segments = Vec::new();
    let mut run_start: Option<usize> = None;
    let mut i = 0;
    while i < code.len() {
        match next_token(code, i) {
            Token::Text(len) => {
                run_start.get_or_insert(i);
                i += len;
            }
            Token::Markup(end) => {
                if let Some(start) = run_start.take() {
                    push_trimmed(code, start, i, &mut segments);
                }
                i = end;
            }
        }
    }
    if let Some(start) = run_start {
        push_trimmed(code, start, code.len(), &mut segments);
    }
    segments
}

fn push_trimmed(code: &str, start: usize, end: usize, out: &mut Vec<(usize, usize)>) {
    let run = &code[start..end];
    let lead = run.len() - run.trim_start().len();
    let trimmed = run.trim();
    if trimmed.chars().any(char::is_alphanumeric) {
        out.push((start + lead, start + lead + trimmed.len()));
    }
}

fn next_token(code: &str, i: usize) -> Token {
    let bytes = code.as_bytes();
    match bytes[i] {
        b'\\' => command_token(code, i),
        b'$' => {
            let close = if bytes.get(i + 1) == Some(&b'$') { "$$" } else { "$" };
            Token::Markup(find_closer(code, i + close.len(), close))
        }
        b'{' | b'}' | b'~' | b'&' => Token::Markup(i + 1),
        _ => Token::Text(code[i..].chars().next().map_or(1, char::len_utf8)),
    }
}

/// Token starting at a backslash.
fn command_token(code: &str, i: usize) -> Token {
    let bytes = code.as_bytes();
    let Some(&next) = bytes.get(i + 1) else {
        return Token::Markup(i + 1);
    };
    if ESCAPABLE.contains(&next) {
        return Token::Text(2);
    }
    match next {
        b'(' => Token::Markup(find_closer(code, i + 2, r"\)")),
        b'[' => Token::Markup(find_closer(code, i + 2, r"\]")),
        b'\\' => Token::Markup(skip_options(code, i + 2)),
        c if c.is_ascii_alphabetic() || c == b'@' => {
            let name_end = i
                + 1
                + bytes[i + 1..]
                    .iter()
                    .take_while(|c| c.is_ascii_alphabetic() || **c == b'@')
                    .count();
            let name = &code[i + 1..name_end];
            let mut end = name_end;
            if bytes.get(end) == Some(&b'*') {
                end += 1;
            }
            end = skip_options(code, end);
            if INVISIBLE_ARG_COMMANDS.contains(&name) {
                end = skip_group(code, end, b'{', b'}');
            }
            Token::Markup(end)
        }
        // Control symbols: `\,`, `\ `, `\-`, ...
        _ => Token::Markup(i + 1 + code[i + 1..].chars().next().map_or(1, char::len_utf8)),
    }
}

/// Skip any `[...]` groups that directly follow position `i`.
fn skip_options(code: &str, mut i: usize) -> usize {
    while code.as_bytes().get(i) == Some(&b'[') {
        i = skip_group(code, i, b'[', b']');
    }
    i
}

/// Skip one balanced group opened at `i`; unclosed groups run to the end of
/// the line. Returns `i` unchanged when no group opens there.
fn skip_group(code: &str, i: usize, open: u8, close: u8) -> usize {
    let bytes = code.as_bytes();
    if bytes.get(i) != Some(&open) {
        return i;
    }
    let mut depth = 0usize;
    let mut j = i;
    while j < bytes.len() {
        match bytes[j] {
            b'\\' => j += 1,
            b if b == open => depth += 1,
            b if b == close => {
                depth -= 1;
                if depth == 0 {
                    return j + 1;
                }
            }
            _ => {}
        }
        j += 1;
    }
    bytes.len()
}

/// Offset just past the next `closer` at or after `from`, or the end of the
/// line.
fn find_closer(code: &str, from: usize, closer: &str) -> usize {
    code.get(from..)
        .and_then(|rest| rest.find(closer))
        .map_or(code.len(), |pos| from + pos + closer.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CV: &str = r"\documentclass{article}
\usepackage{geometry}
\title{Ignored Title}
\begin{document}
\section{Experience} % work history
Senior Engineer at Acme.
  \item Built tools in Rust.
\item[--] Led a team of 5.

% a full-line comment
\begin{verbatim}
do not touch
\end{verbatim}
\vspace{2mm}
Saved 50\% of build time.
\end{document}
trailing text
";

    fn texts(source: &str, g: LatexGranularity) -> Vec<&str> {
        extract_spans(source, g)
            .into_iter()
            .map(|(s, e)| &source[s..e])
            .collect()
    }

    #[test]
    fn line_segments_skip_preamble_comments_and_verbatim() {
        assert_eq!(
            texts(CV, LatexGranularity::Line),
            vec![
                "Experience",
                "Senior Engineer at Acme.",
                "Built tools in Rust.",
                "Led a team of 5.",
                r"Saved 50\% of build time.",
            ]
        );
    }

    #[test]
    fn inline_markup_splits_a_line() {
        assert_eq!(
            texts(r"\textbf{Lead} Engineer, \emph{Rust} team", LatexGranularity::Line),
            vec!["Lead", "Engineer,", "Rust", "team"]
        );
        assert_eq!(
            texts(r"See \cite{knuth} and $O(n^2)$ time~\ref{fig:a}.", LatexGranularity::Line),
            vec!["See", "and", "time"]
        );
        assert_eq!(
            texts(r"Built \href{https://x.dev}{x.dev} in R\&D", LatexGranularity::Line),
            vec!["Built", "x.dev", r"in R\&D"]
        );
    }

    #[test]
    fn block_segments_join_consecutive_lines() {
        let src = "Line one\nline two\n\nThird % note\nfourth\n";
        assert_eq!(
            texts(src, LatexGranularity::Block),
            vec!["Line one\nline two", "Third", "fourth"]
        );
    }

    #[test]
    fn block_never_spans_a_verbatim_environment() {
        let src = "Intro text\n\\begin{verbatim}\ncode\n\\end{verbatim}\nAfter text\n";
        let blocks = texts(src, LatexGranularity::Block);
        assert_eq!(blocks, vec!["Intro text", "After text"]);
        assert!(blocks.iter().all(|b| !b.contains("code")));

        let src = "Before\n\\begin{equation}\nE = mc^2\n\\end{equation}\nAfter\n";
        assert_eq!(texts(src, LatexGranularity::Block), vec!["Before", "After"]);
    }

    #[test]
    fn block_starts_fresh_at_every_item() {
        let src = "\\item First thing\n\\item Second thing\ncontinued\n";
        assert_eq!(
            texts(src, LatexGranularity::Block),
            vec!["First thing", "Second thing\ncontinued"]
        );
    }

    #[test]
    fn segments_are_literal_substrings() {
        for g in [LatexGranularity::Line, LatexGranularity::Block] {
            for (s, e) in extract_spans(CV, g) {
                assert!(CV.contains(&CV[s..e]));
                assert!(!CV[s..e].contains('\\') || CV[s..e].contains(r"\%"));
            }
        }
    }

    #[test]
    fn no_document_environment_means_whole_file() {
        assert_eq!(texts("Hello\n\\newpage\nWorld", LatexGranularity::Line), vec!["Hello", "World"]);
    }

    #[test]
    fn escaped_percent_is_not_a_comment() {
        assert_eq!(strip_comment(r"50\% done % real"), (r"50\% done ", true));
        assert_eq!(strip_comment(r"a\\% c"), (r"a\\", true));
        assert_eq!(strip_comment("plain"), ("plain", false));
    }

    #[test]
    fn non_ascii_text_is_kept_whole() {
        assert_eq!(
            texts("Ingénieur à \\textit{Zürich}", LatexGranularity::Line),
            vec!["Ingénieur à", "Zürich"]
        );
    }

    #[test]
    fn extractor_reads_document() {
        let doc = Document::from_bytes("cv.tex", CV.as_bytes().to_vec()).unwrap();
        let out = LatexExtractor::default().extract(&doc).unwrap();
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|f| f.anchor == Anchor::Literal));
    }
}
