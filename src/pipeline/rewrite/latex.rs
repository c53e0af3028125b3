//! LaTeX rewriting: literal substring replacement over the raw source.
//!
//! Entries are applied in index order, each against the buffer left by the
//! previous one, and every occurrence of `original` is replaced. When the
//! original is gone but the replacement is present (a duplicate line already
//! rewritten by an earlier entry, or a second pass), the entry counts as
//! already applied.

use super::{DocumentRewriter, FragmentOutcome, Rewritten};
use crate::error::{DocPatchError, FragmentError};
use crate::fragment::Anchor;
use crate::pipeline::input::Document;
use crate::pipeline::mapping::Mapping;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct LatexRewriter;

impl DocumentRewriter for LatexRewriter {
    fn rewrite(&self, document: &Document, mapping: &Mapping) -> Result<Rewritten, DocPatchError> {
        let mut buffer = document.as_utf8()?.to_string();
        let mut outcomes = BTreeMap::new();
        let mut applied = false;

        for entry in mapping.targets() {
            let index = entry.index;
            let Some((original, replacement)) = entry.change() else {
                outcomes.insert(index, FragmentOutcome::Unchanged);
                continue;
            };
            if !matches!(entry.anchor, None | Some(Anchor::Literal)) {
                outcomes.insert(
                    index,
                    FragmentOutcome::Skipped(FragmentError::WrongAnchorKind {
                        index,
                        format: document.format.to_string(),
                    }),
                );
                continue;
            }

            let occurrences = buffer.matches(original).count();
            let outcome = if occurrences > 0 {
                debug!("Fragment {}: {} occurrence(s) replaced", index, occurrences);
                buffer = buffer.replace(original, replacement);
                applied = true;
                FragmentOutcome::Applied
            } else if !replacement.is_empty() && buffer.contains(replacement) {
                FragmentOutcome::AlreadyApplied
            } else {
                FragmentOutcome::Skipped(FragmentError::LiteralNotFound {
                    index,
                    original: original.to_string(),
                })
            };
            outcomes.insert(index, outcome);
        }

        let bytes = if applied {
            buffer.into_bytes()
        } else {
            document.bytes.clone()
        };
        Ok(Rewritten { bytes, outcomes })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(src: &str) -> Document {
        Document::from_bytes("cv.tex", src.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn replaces_every_occurrence() {
        let d = doc("Rust here.\n\\textbf{Rust} there.\nAnd Rust again.\n");
        let m = Mapping::from_pairs([(0, "Rust", Some("Zig"))]);
        let out = LatexRewriter.rewrite(&d, &m).unwrap();
        assert_eq!(
            String::from_utf8(out.bytes).unwrap(),
            "Zig here.\n\\textbf{Zig} there.\nAnd Zig again.\n"
        );
        assert_eq!(out.outcomes[&0], FragmentOutcome::Applied);
    }

    #[test]
    fn entries_apply_in_index_order() {
        let d = doc("a b");
        let m = Mapping::from_pairs([(0, "a", Some("b")), (1, "b", Some("c"))]);
        let out = LatexRewriter.rewrite(&d, &m).unwrap();
        assert_eq!(out.bytes, b"c c");
    }

    #[test]
    fn missing_literal_and_already_applied() {
        let d = doc("Lead Engineer\n");
        let m = Mapping::from_pairs([
            (0, "Senior Engineer", Some("Lead Engineer")),
            (1, "Intern", Some("Staff")),
        ]);
        let out = LatexRewriter.rewrite(&d, &m).unwrap();
        assert_eq!(out.outcomes[&0], FragmentOutcome::AlreadyApplied);
        assert_eq!(
            out.outcomes[&1],
            FragmentOutcome::Skipped(FragmentError::LiteralNotFound {
                index: 1,
                original: "Intern".into()
            })
        );
        assert_eq!(out.bytes, d.bytes);
    }

    #[test]
    fn docx_anchor_is_rejected() {
        let d = doc("x");
        let m = crate::pipeline::mapping::map(
            &[crate::fragment::Fragment {
                index: 0,
                text: "x".into(),
                anchor: Anchor::Docx { paragraph: 0, run: 0 },
            }],
            &[crate::fragment::GeneratedFragment::new(0, "y")],
        );
        let out = LatexRewriter.rewrite(&d, &m).unwrap();
        assert!(matches!(
            out.outcomes[&0],
            FragmentOutcome::Skipped(FragmentError::WrongAnchorKind { .. })
        ));
    }
}
