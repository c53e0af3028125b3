//! DOCX extraction: one fragment per non-empty run of `word/document.xml`.
//!
//! Empty runs are skipped but still consume a run number, so the
//! `(paragraph, run)` anchor of every emitted fragment is the run's real
//! position in its paragraph.

use super::FragmentExtractor;
use crate::error::DocPatchError;
use crate::fragment::{Anchor, RawFragment};
use crate::pipeline::input::Document;
use crate::pipeline::ooxml::{read_part, RunTable, DOCUMENT_PART};

#[derive(Debug, Clone, Copy, Default)]
pub struct DocxExtractor;

impl FragmentExtractor for DocxExtractor {
    fn extract(&self, document: &Document) -> Result<Vec<RawFragment>, DocPatchError> {
        let xml = read_part(&document.bytes, &document.path, DOCUMENT_PART)?;
        let table = RunTable::parse(&xml).map_err(|detail| DocPatchError::CorruptDocument {
            path: document.path.clone(),
            detail,
        })?;

        Ok(table
            .runs()
            .iter()
            .filter(|span| !span.text.is_empty())
            .map(|span| {
                RawFragment::new(
                    span.text.clone(),
                    Anchor::Docx {
                        paragraph: span.paragraph,
                        run: span.run,
                    },
                )
            })
            .collect())
    }
}
