//! Fragment data model: addressable units of document text and their anchors.
//!
//! A [`Fragment`] pairs the literal text found in the source with an
//! [`Anchor`] that is sufficient to locate the same region again at rewrite
//! time. Its `index` is the only key used to correlate the extraction with
//! the rewriting service's answer; text is never used as a key because it may
//! repeat, be emptied, or be rewritten beyond recognition.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::error::DocPatchError;

/// The three document formats the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Pdf,
    Docx,
    Latex,
}

impl DocumentFormat {
    /// Select the format from the file extension (case-insensitive).
    ///
    /// There is no content sniffing: an unknown extension is a hard error.
    pub fn from_path(path: &Path) -> Result<Self, DocPatchError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();

        match extension.as_str() {
            "pdf" => Ok(DocumentFormat::Pdf),
            "docx" => Ok(DocumentFormat::Docx),
            "tex" => Ok(DocumentFormat::Latex),
            _ => Err(DocPatchError::UnsupportedFormat {
                path: path.to_path_buf(),
                extension,
            }),
        }
    }

    /// Canonical file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Latex => "tex",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DocumentFormat::Pdf => "PDF",
            DocumentFormat::Docx => "DOCX",
            DocumentFormat::Latex => "LaTeX",
        };
        f.write_str(name)
    }
}

/// Axis-aligned rectangle in PDF page space (points, origin bottom-left).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Smallest box covering both `self` and `other`.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// Format-specific locator for a fragment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Anchor {
    /// A word on a PDF page. `page` is 0-based.
    Pdf { page: usize, bbox: BoundingBox },
    /// A run inside a DOCX paragraph. Both indices are 0-based and count
    /// every `w:p` / `w:r` in document order, including empty ones.
    Docx { paragraph: usize, run: usize },
    /// LaTeX has no structural runs: the fragment text itself is the anchor.
    Literal,
}

/// One addressable unit of extracted text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    pub index: usize,
    pub text: String,
    pub anchor: Anchor,
}

/// A fragment as produced by an extractor, before indexing.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFragment {
    pub text: String,
    pub anchor: Anchor,
}

impl RawFragment {
    pub fn new(text: impl Into<String>, anchor: Anchor) -> Self {
        Self {
            text: text.into(),
            anchor,
        }
    }
}

/// One `{index, text}` entry returned by the rewriting service.
///
/// `text == None` means the service explicitly left the fragment unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFragment {
    pub index: usize,
    pub text: Option<String>,
}

impl GeneratedFragment {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: Some(text.into()),
        }
    }
}
