//! Error types for the edgequake-docpatch library.
//!
//! Three tiers reflect three distinct failure modes:
//!
//! * [`DocPatchError`] — **Fatal**: the rewrite cannot proceed at all
//!   (unsupported extension, corrupt document, unparseable service response).
//!   Returned as `Err(DocPatchError)` from the top-level entry points.
//!
//! * [`FragmentError`] — **Non-fatal**: one mapped fragment could not be
//!   located again (stale anchor, literal no longer present) but every other
//!   fragment is fine. Stored in [`crate::output::RewriteReport::unapplied`]
//!   so a multi-field document still gets the fields that did resolve.
//!
//! * [`CoverageWarning`] — **Informational**: the rewriting service returned
//!   a different index set than it was given. Never blocks rewriting of the
//!   covered subset.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-docpatch library.
#[derive(Debug, Error)]
pub enum DocPatchError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Document not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file extension is not one of pdf, docx, tex.
    #[error("Unsupported document format '{extension}' for '{path}'\nSupported extensions: .pdf, .docx, .tex")]
    UnsupportedFormat { path: PathBuf, extension: String },

    /// The document could not be opened or parsed.
    #[error("Document '{path}' is corrupt: {detail}")]
    CorruptDocument { path: PathBuf, detail: String },

    /// LaTeX sources must be UTF-8.
    #[error("LaTeX source '{path}' is not valid UTF-8 (byte offset {offset})")]
    InvalidUtf8 { path: PathBuf, offset: usize },

    // ── Rewriting-service errors ──────────────────────────────────────────
    /// The service answered with nothing but whitespace.
    #[error("Rewriting service returned an empty response")]
    EmptyResponse,

    /// The service answer could not be parsed into `{index, text}` entries.
    #[error("Rewriting service response is not a list of {{index, text}} entries: {detail}\nResponse starts with: {excerpt:?}")]
    MalformedResponse { detail: String, excerpt: String },

    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM API failed on every attempt.
    #[error("LLM API error after {retries} retries: {message}")]
    LlmApiError { retries: u32, message: String },

    /// A single LLM call exceeded the configured timeout.
    #[error("LLM call timed out after {secs}s\nIncrease --api-timeout.")]
    ApiTimeout { secs: u64 },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output document.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not persist an intermediate audit artifact.
    #[error("Failed to write artifact '{path}': {detail}")]
    ArtifactWriteFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF documents need the pdfium shared library. You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or containing directory).\n\
  • Place libpdfium next to the working directory.\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error for a single mapped fragment.
///
/// The fragment is skipped, the rest of the document is still rewritten.
#[derive(Debug, Clone, PartialEq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FragmentError {
    /// No word on the anchored page contains the original text (PDF).
    #[error("Fragment {index}: no word on page {page} contains {original:?}")]
    AnchorNotFound {
        index: usize,
        page: usize,
        original: String,
    },

    /// The anchor points at a paragraph or run that no longer exists (DOCX).
    #[error("Fragment {index}: anchor paragraph {paragraph} run {run} does not resolve")]
    StaleAnchor {
        index: usize,
        paragraph: usize,
        run: usize,
    },

    /// The anchored run exists but holds different text than at extraction.
    #[error("Fragment {index}: run text {found:?} no longer matches {original:?}")]
    TextMismatch {
        index: usize,
        original: String,
        found: String,
    },

    /// The original literal is absent from the LaTeX source.
    #[error("Fragment {index}: literal {original:?} not found in source")]
    LiteralNotFound { index: usize, original: String },

    /// The entry carries an anchor of a different document format.
    #[error("Fragment {index}: anchor does not belong to a {format} document")]
    WrongAnchorKind { index: usize, format: String },

    /// pdfium refused to paint or draw for this fragment.
    #[error("Fragment {index}: drawing replacement failed: {detail}")]
    DrawFailed { index: usize, detail: String },

    /// The replacement is too wide for the covered word box even at the
    /// smallest allowed font size (PDF).
    #[error("Fragment {index}: replacement {replacement:?} does not fit a {available:.1}pt wide box")]
    DoesNotFit {
        index: usize,
        replacement: String,
        available: f32,
    },
}

impl FragmentError {
    /// Index of the fragment this error refers to.
    pub fn index(&self) -> usize {
        match self {
            FragmentError::AnchorNotFound { index, .. }
            | FragmentError::StaleAnchor { index, .. }
            | FragmentError::TextMismatch { index, .. }
            | FragmentError::LiteralNotFound { index, .. }
            | FragmentError::WrongAnchorKind { index, .. }
            | FragmentError::DrawFailed { index, .. }
            | FragmentError::DoesNotFit { index, .. } => *index,
        }
    }
}

/// Index-set disagreement between the extraction and the service response.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoverageWarning {
    /// The service did not return this extracted index; fragment kept as is.
    #[error("Fragment {index} has no replacement; left unchanged")]
    MissingReplacement { index: usize },

    /// The service returned an index that was never extracted.
    #[error("Replacement {index} matches no extracted fragment; ignored")]
    Orphan { index: usize },

    /// The service returned the same index more than once; first one kept.
    #[error("Replacement {index} returned {count} times; first occurrence kept")]
    DuplicateIndex { index: usize, count: usize },
}
