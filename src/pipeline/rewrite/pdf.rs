//! PDF rewriting: cover the original word and draw the replacement on top.
//!
//! PDF has no editable text runs, so a replacement is painted:
//!
//! 1. the page named by the entry's anchor is re-read with
//!    [`page_words`](crate::pipeline::extract::pdf::page_words);
//! 2. the first word in text-layer order whose text equals `original` is
//!    chosen, falling back to the first word that merely contains it;
//! 3. an opaque rectangle in the background colour covers that word's box;
//! 4. the replacement is drawn at the box origin in Helvetica.
//!
//! The replacement is drawn at the configured size when it fits the covered
//! box. A wider replacement is shrunk until it does and reported as
//! [`FragmentOutcome::Resized`]; one that would need less than
//! [`MIN_FONT_SIZE`] is skipped with [`FragmentError::DoesNotFit`] and the
//! page is left alone. Widths come from the Helvetica metrics, so the check
//! needs no pdfium.
//!
//! The original glyphs stay in the content stream underneath, and the
//! replacement does not reuse the original font. Repeated words are not
//! told apart beyond page order: a box already claimed by an earlier entry
//! is not reused, otherwise the first match wins.

use super::{DocumentRewriter, FragmentOutcome, Rewritten};
use crate::config::{PdfStyle, Rgb};
use crate::error::{DocPatchError, FragmentError};
use crate::fragment::{Anchor, BoundingBox};
use crate::pipeline::extract::pdf::{page_words, PageWord};
use crate::pipeline::input::Document;
use crate::pipeline::mapping::Mapping;
use crate::pipeline::pdfium::{bind_pdfium, load_error};
use pdfium_render::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use tracing::{debug, warn};

/// Extra points painted around a word box so ascenders and descenders are
/// covered.
const COVER_PADDING: f32 = 1.0;

/// Smallest font size a replacement is shrunk to.
pub const MIN_FONT_SIZE: f32 = 4.0;

/// Helvetica cap height, per unit of font size.
const CAP_HEIGHT: f32 = 0.718;

/// Helvetica advance widths for `' '..='~'`, in 1/1000 em.
#[rustfmt::skip]
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278,
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556,
    278, 278, 584, 584, 584, 556, 1015,
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833,
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611,
    278, 278, 278, 469, 556, 333,
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833,
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500,
    334, 260, 334, 584,
];

/// Width used for characters outside the table.
const DEFAULT_WIDTH: u16 = 556;

/// Width of `text` set in Helvetica at `size` points.
pub fn helvetica_width(text: &str, size: f32) -> f32 {
    let units: u32 = text
        .chars()
        .map(|c| {
            let code = c as u32;
            if (32..=126).contains(&code) {
                u32::from(HELVETICA_WIDTHS[(code - 32) as usize])
            } else {
                u32::from(DEFAULT_WIDTH)
            }
        })
        .sum();
    units as f32 * size / 1000.0
}

/// Font size at which `text` fits the area painted over `bbox`, at most
/// `requested`. `None` when that would be below [`MIN_FONT_SIZE`].
pub fn fit_font_size(text: &str, bbox: &BoundingBox, requested: f32) -> Option<f32> {
    // Text starts at x0; the cover reaches COVER_PADDING past x1 and y1.
    let available = bbox.width() + COVER_PADDING;
    let tallest = (bbox.height() * 0.8 + COVER_PADDING) / CAP_HEIGHT;

    let mut size = requested.min(tallest);
    let width = helvetica_width(text, size);
    if width > available {
        size *= available / width;
    }
    (size >= MIN_FONT_SIZE).then_some(size)
}

/// One planned paint operation.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfEdit {
    pub index: usize,
    pub page: usize,
    pub bbox: BoundingBox,
    pub replacement: String,
    pub font_size: f32,
}

/// Result of [`plan_pdf_edits`].
#[derive(Debug, Clone, Default)]
pub struct PdfPlan {
    pub edits: Vec<PdfEdit>,
    pub outcomes: BTreeMap<usize, FragmentOutcome>,
}

/// Decide which word box each mapping entry paints over.
///
/// `pages[n]` holds the words of page `n` in text-layer order. Pure, so the
/// matching and sizing rules are testable without pdfium.
pub fn plan_pdf_edits(mapping: &Mapping, pages: &[Vec<PageWord>], font_size: f32) -> PdfPlan {
    let mut plan = PdfPlan::default();
    // (page, word position) already painted by an earlier entry.
    let mut claimed: HashSet<(usize, usize)> = HashSet::new();

    for entry in mapping.targets() {
        let index = entry.index;
        let Some((original, replacement)) = entry.change() else {
            plan.outcomes.insert(index, FragmentOutcome::Unchanged);
            continue;
        };
        let Some(Anchor::Pdf { page, .. }) = entry.anchor else {
            plan.outcomes.insert(
                index,
                FragmentOutcome::Skipped(FragmentError::WrongAnchorKind {
                    index,
                    format: "PDF".to_string(),
                }),
            );
            continue;
        };

        let words = pages.get(page).map(Vec::as_slice).unwrap_or_default();
        let free = |pos: &usize| !claimed.contains(&(page, *pos));
        let found = (0..words.len())
            .filter(free)
            .find(|&pos| words[pos].text == original)
            .or_else(|| {
                (0..words.len())
                    .filter(free)
                    .find(|&pos| words[pos].text.contains(original))
            });

        match found {
            Some(pos) => {
                let bbox = words[pos].bbox;
                let Some(size) = fit_font_size(replacement, &bbox, font_size) else {
                    plan.outcomes.insert(
                        index,
                        FragmentOutcome::Skipped(FragmentError::DoesNotFit {
                            index,
                            replacement: replacement.to_string(),
                            available: bbox.width(),
                        }),
                    );
                    continue;
                };
                claimed.insert((page, pos));
                debug!(
                    "Fragment {}: page {} word {} {:?} at {:.1}pt",
                    index, page, pos, words[pos].text, size
                );
                plan.edits.push(PdfEdit {
                    index,
                    page,
                    bbox,
                    replacement: replacement.to_string(),
                    font_size: size,
                });
                let outcome = if size < font_size {
                    FragmentOutcome::Resized { font_size: size }
                } else {
                    FragmentOutcome::Applied
                };
                plan.outcomes.insert(index, outcome);
            }
            None => {
                plan.outcomes.insert(
                    index,
                    FragmentOutcome::Skipped(FragmentError::AnchorNotFound {
                        index,
                        page,
                        original: original.to_string(),
                    }),
                );
            }
        }
    }
    plan
}

#[derive(Debug, Clone, Default)]
pub struct PdfRewriter {
    pdfium_lib_path: Option<PathBuf>,
    style: PdfStyle,
}

impl PdfRewriter {
    pub fn new(pdfium_lib_path: Option<PathBuf>, style: PdfStyle) -> Self {
        Self {
            pdfium_lib_path,
            style,
        }
    }
}

fn pdf_color(c: Rgb) -> PdfColor {
    PdfColor::new(c.r, c.g, c.b, 255)
}

impl DocumentRewriter for PdfRewriter {
    fn rewrite(&self, document: &Document, mapping: &Mapping) -> Result<Rewritten, DocPatchError> {
        let pdfium = bind_pdfium(self.pdfium_lib_path.as_deref())?;
        let mut pdf = pdfium
            .load_pdf_from_byte_slice(&document.bytes, None)
            .map_err(|e| load_error(&document.path, e))?;

        let mut pages_words = Vec::new();
        for (n, page) in pdf.pages().iter().enumerate() {
            pages_words.push(page_words(&page).map_err(|e| DocPatchError::CorruptDocument {
                path: document.path.clone(),
                detail: format!("page {}: text layer unreadable: {:?}", n + 1, e),
            })?);
        }

        let PdfPlan { edits, mut outcomes } = plan_pdf_edits(mapping, &pages_words, self.style.font_size);
        if edits.is_empty() {
            return Ok(Rewritten {
                bytes: document.bytes.clone(),
                outcomes,
            });
        }

        let font = pdf.fonts_mut().helvetica();
        let mut painted = 0usize;
        for edit in &edits {
            if let Err(e) = self.paint(&pdf, font, edit) {
                warn!("Fragment {}: drawing failed on page {}: {:?}", edit.index, edit.page, e);
                outcomes.insert(
                    edit.index,
                    FragmentOutcome::Skipped(FragmentError::DrawFailed {
                        index: edit.index,
                        detail: format!("{:?}", e),
                    }),
                );
            } else {
                painted += 1;
            }
        }

        if painted == 0 {
            return Ok(Rewritten {
                bytes: document.bytes.clone(),
                outcomes,
            });
        }

        let bytes = pdf.save_to_bytes().map_err(|e| DocPatchError::CorruptDocument {
            path: document.path.clone(),
            detail: format!("saving rewritten PDF failed: {:?}", e),
        })?;
        Ok(Rewritten { bytes, outcomes })
    }
}

impl PdfRewriter {
    /// Cover `edit.bbox` and draw the replacement over it.
    fn paint(&self, pdf: &PdfDocument, font: PdfFontToken, edit: &PdfEdit) -> Result<(), PdfiumError> {
        let mut page = pdf.pages().get(edit.page as u16)?;
        let b = edit.bbox;

        let cover = PdfRect::new_from_values(
            b.y0 - COVER_PADDING,
            b.x0 - COVER_PADDING,
            b.y1 + COVER_PADDING,
            b.x1 + COVER_PADDING,
        );
        page.objects_mut().create_path_object_rect(
            cover,
            None,
            None,
            Some(pdf_color(self.style.background)),
        )?;

        if edit.replacement.trim().is_empty() {
            return Ok(());
        }

        // Baseline sits a fifth of the box above its bottom, clear of descenders.
        let baseline = b.y0 + b.height() * 0.2;
        let mut text = page.objects_mut().create_text_object(
            PdfPoints::new(b.x0),
            PdfPoints::new(baseline),
            &edit.replacement,
            font,
            PdfPoints::new(edit.font_size),
        )?;
        text.set_fill_color(pdf_color(self.style.text_color))?;
        Ok(())
    }
}
