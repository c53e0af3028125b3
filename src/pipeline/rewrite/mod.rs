//! Document rewriting: apply a [`Mapping`] to the document it was built from.
//!
//! One [`DocumentRewriter`] per format, chosen by [`rewriter_for`]:
//!
//! - **PDF**: cover the first matching word box on the anchored page and draw
//!   the replacement over it, shrunk to the box when it is wider ([`pdf`]).
//! - **DOCX**: swap the text of the anchored run, keeping its properties
//!   ([`docx`]).
//! - **LaTeX**: replace every occurrence of the original literal in the
//!   source ([`latex`]). Unlike PDF and DOCX, which touch only the first
//!   match, all occurrences change: there is no structural anchor to tell
//!   them apart.
//!
//! Failures to resolve a single entry are recorded as
//! [`FragmentOutcome::Skipped`] and never abort the document. When no entry
//! is applied, the original bytes are returned untouched.

pub mod docx;
pub mod latex;
pub mod pdf;

use crate::config::RewriteConfig;
use crate::error::{DocPatchError, FragmentError};
use crate::fragment::DocumentFormat;
use crate::pipeline::input::Document;
use crate::pipeline::mapping::Mapping;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub use docx::DocxRewriter;
pub use latex::LatexRewriter;
pub use pdf::PdfRewriter;

/// What happened to one mapping entry.
#[derive(Debug, Clone, PartialEq)]
pub enum FragmentOutcome {
    /// The document now carries the replacement.
    Applied,
    /// Applied, drawn at a smaller font size so it stays inside the original
    /// word box (PDF).
    Resized { font_size: f32 },
    /// Nothing to do: no replacement, or replacement equal to the original.
    Unchanged,
    /// The anchored text already equals the replacement.
    AlreadyApplied,
    /// The entry could not be resolved against the document.
    Skipped(FragmentError),
}

impl FragmentOutcome {
    /// True when the document carries the replacement.
    pub fn is_applied(&self) -> bool {
        matches!(self, FragmentOutcome::Applied | FragmentOutcome::Resized { .. })
    }
}

/// A rewritten document plus one outcome per targeted index.
#[derive(Debug, Clone)]
pub struct Rewritten {
    pub bytes: Vec<u8>,
    pub outcomes: BTreeMap<usize, FragmentOutcome>,
}

impl Rewritten {
    /// The document unchanged, every target marked [`FragmentOutcome::Unchanged`].
    pub fn untouched(document: &Document, mapping: &Mapping) -> Self {
        Self {
            bytes: document.bytes.clone(),
            outcomes: mapping
                .targets()
                .map(|e| (e.index, FragmentOutcome::Unchanged))
                .collect(),
        }
    }

    pub fn applied_count(&self) -> usize {
        self.outcomes.values().filter(|o| o.is_applied()).count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &FragmentError> {
        self.outcomes.values().filter_map(|o| match o {
            FragmentOutcome::Skipped(e) => Some(e),
            _ => None,
        })
    }
}

/// Applies a mapping to one document format.
///
/// Implementations receive the original document and must not assume the
/// mapping was built from it: anchors may be stale.
pub trait DocumentRewriter: Send + Sync {
    fn rewrite(&self, document: &Document, mapping: &Mapping) -> Result<Rewritten, DocPatchError>;
}

/// Pick the rewriter for `format`, configured from `config`.
pub fn rewriter_for(format: DocumentFormat, config: &RewriteConfig) -> Box<dyn DocumentRewriter> {
    match format {
        DocumentFormat::Pdf => Box::new(PdfRewriter::new(
            config.pdfium_lib_path.clone(),
            config.pdf_style,
        )),
        DocumentFormat::Docx => Box::new(DocxRewriter),
        DocumentFormat::Latex => Box::new(LatexRewriter),
    }
}

/// Rewrite `document` according to `mapping`.
///
/// Synchronous; async callers run it inside `spawn_blocking`. Only
/// unsupported or corrupt input fails the call; per-entry problems end up in
/// [`Rewritten::outcomes`].
pub fn rewrite(
    document: &Document,
    mapping: &Mapping,
    config: &RewriteConfig,
) -> Result<Rewritten, DocPatchError> {
    let rewritten = if mapping.change_count() == 0 {
        debug!("No entry changes the document, keeping original bytes");
        Rewritten::untouched(document, mapping)
    } else {
        rewriter_for(document.format, config).rewrite(document, mapping)?
    };

    for (index, outcome) in &rewritten.outcomes {
        match outcome {
            FragmentOutcome::Applied | FragmentOutcome::Resized { .. } => {
                if let Some(ref cb) = config.progress_callback {
                    cb.on_fragment_applied(*index);
                }
            }
            FragmentOutcome::Skipped(err) => {
                warn!("Skipping fragment: {}", err);
                if let Some(ref cb) = config.progress_callback {
                    cb.on_fragment_skipped(*index, &err.to_string());
                }
            }
            FragmentOutcome::Unchanged | FragmentOutcome::AlreadyApplied => {}
        }
    }

    info!(
        "Rewrote {} document: {} applied, {} skipped",
        document.format,
        rewritten.applied_count(),
        rewritten.skipped().count()
    );
    Ok(rewritten)
}
