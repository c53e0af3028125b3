//! DOCX rewriting: replace the text of anchored runs in `word/document.xml`.
//!
//! The run's `w:rPr` and every other run are re-emitted as read, so only the
//! targeted text changes. Before writing, the run's current text is checked:
//!
//! | run text now      | outcome                    |
//! |-------------------|----------------------------|
//! | `original`        | applied                    |
//! | `replacement`     | already applied            |
//! | anything else     | skipped, `TextMismatch`    |
//! | run does not exist| skipped, `StaleAnchor`     |

use super::{DocumentRewriter, FragmentOutcome, Rewritten};
use crate::error::{DocPatchError, FragmentError};
use crate::fragment::Anchor;
use crate::pipeline::input::Document;
use crate::pipeline::mapping::Mapping;
use crate::pipeline::ooxml::{read_part, replace_part, RunTable, DOCUMENT_PART};
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Clone, Copy, Default)]
pub struct DocxRewriter;

impl DocumentRewriter for DocxRewriter {
    fn rewrite(&self, document: &Document, mapping: &Mapping) -> Result<Rewritten, DocPatchError> {
        let xml = read_part(&document.bytes, &document.path, DOCUMENT_PART)?;
        let table = RunTable::parse(&xml).map_err(|detail| DocPatchError::CorruptDocument {
            path: document.path.clone(),
            detail,
        })?;

        let mut outcomes = BTreeMap::new();
        let mut edits: BTreeMap<(usize, usize), String> = BTreeMap::new();

        for entry in mapping.targets() {
            let index = entry.index;
            let Some((original, replacement)) = entry.change() else {
                outcomes.insert(index, FragmentOutcome::Unchanged);
                continue;
            };
            let Some(Anchor::Docx { paragraph, run }) = entry.anchor else {
                outcomes.insert(
                    index,
                    FragmentOutcome::Skipped(FragmentError::WrongAnchorKind {
                        index,
                        format: document.format.to_string(),
                    }),
                );
                continue;
            };

            let outcome = match table.find(paragraph, run) {
                None => FragmentOutcome::Skipped(FragmentError::StaleAnchor {
                    index,
                    paragraph,
                    run,
                }),
                Some(span) if span.text == original => {
                    debug!("Fragment {}: paragraph {} run {} rewritten", index, paragraph, run);
                    edits.insert((paragraph, run), replacement.to_string());
                    FragmentOutcome::Applied
                }
                Some(span) if span.text == replacement => FragmentOutcome::AlreadyApplied,
                Some(span) => FragmentOutcome::Skipped(FragmentError::TextMismatch {
                    index,
                    original: original.to_string(),
                    found: span.text.clone(),
                }),
            };
            outcomes.insert(index, outcome);
        }

        if edits.is_empty() {
            return Ok(Rewritten {
                bytes: document.bytes.clone(),
                outcomes,
            });
        }

        let new_xml = table
            .render(&edits)
            .map_err(|e| DocPatchError::Internal(format!("re-serialising document.xml: {e}")))?;
        let bytes = replace_part(&document.bytes, &document.path, DOCUMENT_PART, &new_xml)?;
        Ok(Rewritten { bytes, outcomes })
    }
}
