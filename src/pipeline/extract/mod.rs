//! Fragment extraction: cut a document into addressable, anchored text units.
//!
//! One [`FragmentExtractor`] per format, chosen by [`extractor_for`]. Each
//! extractor only emits [`RawFragment`]s in traversal order; indices are
//! assigned afterwards by [`index_fragments`], once, for the whole document.
//!
//! | format | unit            | anchor                     | order                  |
//! |--------|-----------------|----------------------------|------------------------|
//! | PDF    | word            | `(page, bbox)`             | page → text-layer char |
//! | DOCX   | run             | `(paragraph, run)`         | paragraph → run        |
//! | LaTeX  | text span       | literal source substring   | line → left to right   |

pub mod docx;
pub mod latex;
pub mod pdf;

use crate::config::RewriteConfig;
use crate::error::DocPatchError;
use crate::fragment::{DocumentFormat, Fragment, RawFragment};
use crate::pipeline::index::index_fragments;
use crate::pipeline::input::Document;
use tracing::{debug, info};

pub use docx::DocxExtractor;
pub use latex::LatexExtractor;
pub use pdf::PdfExtractor;

/// Walks one document format and yields its fragments in traversal order.
///
/// Implementations must be deterministic: the same bytes always produce the
/// same sequence of `(text, anchor)` pairs.
pub trait FragmentExtractor: Send + Sync {
    fn extract(&self, document: &Document) -> Result<Vec<RawFragment>, DocPatchError>;
}

/// Pick the extractor for `format`, configured from `config`.
pub fn extractor_for(format: DocumentFormat, config: &RewriteConfig) -> Box<dyn FragmentExtractor> {
    match format {
        DocumentFormat::Pdf => Box::new(PdfExtractor::new(config.pdfium_lib_path.clone())),
        DocumentFormat::Docx => Box::new(DocxExtractor),
        DocumentFormat::Latex => Box::new(LatexExtractor::new(config.latex_granularity)),
    }
}

/// Extract and index every fragment of `document`.
///
/// This is synchronous and, for PDF, CPU-bound; async callers run it inside
/// `spawn_blocking`.
pub fn extract(document: &Document, config: &RewriteConfig) -> Result<Vec<Fragment>, DocPatchError> {
    let raw = extractor_for(document.format, config).extract(document)?;
    let fragments = index_fragments(raw);
    info!(
        "Extracted {} fragments from {} document {}",
        fragments.len(),
        document.format,
        document.path.display()
    );
    if let Some(last) = fragments.last() {
        debug!("Last fragment: #{} {:?}", last.index, last.anchor);
    }
    Ok(fragments)
}
