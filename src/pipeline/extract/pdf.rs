//! PDF extraction: one fragment per word of each page's text layer.
//!
//! pdfium reports characters, not words. Characters are grouped into words
//! at whitespace and control characters (pdfium synthesises `\r\n` at line
//! ends), and a word's bounding box is the union of its characters' loose
//! bounds. Coordinates are PDF user space: points, origin bottom-left.
//!
//! The rewriter re-derives the same word list from the document it is about
//! to edit with [`page_words`], so extraction and rewriting always agree on
//! what a "word" is.

use super::FragmentExtractor;
use crate::error::DocPatchError;
use crate::fragment::{Anchor, BoundingBox, RawFragment};
use crate::pipeline::input::Document;
use crate::pipeline::pdfium::{bind_pdfium, load_error};
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct PdfExtractor {
    pdfium_lib_path: Option<PathBuf>,
}

impl PdfExtractor {
    pub fn new(pdfium_lib_path: Option<PathBuf>) -> Self {
        Self { pdfium_lib_path }
    }
}

impl FragmentExtractor for PdfExtractor {
    fn extract(&self, document: &Document) -> Result<Vec<RawFragment>, DocPatchError> {
        let pdfium = bind_pdfium(self.pdfium_lib_path.as_deref())?;
        let pdf = pdfium
            .load_pdf_from_byte_slice(&document.bytes, None)
            .map_err(|e| load_error(&document.path, e))?;

        let mut out = Vec::new();
        for (page_index, page) in pdf.pages().iter().enumerate() {
            let words = page_words(&page).map_err(|e| DocPatchError::CorruptDocument {
                path: document.path.clone(),
                detail: format!("page {}: text layer unreadable: {:?}", page_index + 1, e),
            })?;
            debug!("Page {}: {} words", page_index + 1, words.len());
            out.extend(words.into_iter().map(|w| {
                RawFragment::new(
                    w.text,
                    Anchor::Pdf {
                        page: page_index,
                        bbox: w.bbox,
                    },
                )
            }));
        }
        Ok(out)
    }
}

/// A word of a page's text layer.
#[derive(Debug, Clone, PartialEq)]
pub struct PageWord {
    pub text: String,
    pub bbox: BoundingBox,
}

/// Words of one page, in text-layer order.
pub fn page_words(page: &PdfPage) -> Result<Vec<PageWord>, PdfiumError> {
    let text = page.text()?;
    let chars = text.chars();
    Ok(group_words(chars.iter().filter_map(|ch| {
        let c = ch.unicode_char()?;
        let bbox = ch.loose_bounds().ok().map(|r| {
            BoundingBox::new(
                r.left().value,
                r.bottom().value,
                r.right().value,
                r.top().value,
            )
        });
        Some((c, bbox))
    })))
}

/// Group characters into words at whitespace and control characters.
///
/// Characters without bounds still contribute text; a word none of whose
/// characters has bounds is dropped, since it cannot be located again.
pub fn group_words<I>(chars: I) -> Vec<PageWord>
where
    I: IntoIterator<Item = (char, Option<BoundingBox>)>,
{
    let mut words = Vec::new();
    let mut text = String::new();
    let mut bbox: Option<BoundingBox> = None;

    let mut flush = |text: &mut String, bbox: &mut Option<BoundingBox>| {
        if let (false, Some(b)) = (text.is_empty(), bbox.take()) {
            words.push(PageWord {
                text: std::mem::take(text),
                bbox: b,
            });
        }
        text.clear();
    };

    for (c, char_box) in chars {
        if c.is_whitespace() || c.is_control() {
            flush(&mut text, &mut bbox);
            continue;
        }
        text.push(c);
        if let Some(cb) = char_box {
            bbox = Some(match bbox {
                Some(b) => b.union(&cb),
                None => cb,
            });
        }
    }
    flush(&mut text, &mut bbox);
    words
}

#[cfg(test)]
mod tests {
    use super::*;

    fn glyphs(s: &str, x: f32, y: f32) -> Vec<(char, Option<BoundingBox>)> {
        s.chars()
            .enumerate()
            .map(|(i, c)| {
                let x0 = x + i as f32 * 6.0;
                (c, Some(BoundingBox::new(x0, y, x0 + 5.0, y + 10.0)))
            })
            .collect()
    }

    #[test]
    fn splits_on_whitespace_and_line_breaks() {
        let mut chars = glyphs("Senior Engineer", 72.0, 700.0);
        chars.push(('\r', None));
        chars.push(('\n', None));
        chars.extend(glyphs("Acme", 72.0, 686.0));

        let words = group_words(chars);
        let texts: Vec<&str> = words.iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Senior", "Engineer", "Acme"]);
        assert_eq!(words[0].bbox, BoundingBox::new(72.0, 700.0, 107.0, 710.0));
        assert_eq!(words[2].bbox.y0, 686.0);
    }

    #[test]
    fn unboxed_words_are_dropped() {
        let chars = vec![('a', None), (' ', None), ('b', Some(BoundingBox::new(0.0, 0.0, 1.0, 1.0)))];
        let words = group_words(chars);
        assert_eq!(words.len(), 1);
        assert_eq!(words[0].text, "b");
    }

    #[test]
    fn empty_page_has_no_words() {
        assert!(group_words(Vec::new()).is_empty());
        assert!(group_words(vec![(' ', None), ('\n', None)]).is_empty());
    }
}
