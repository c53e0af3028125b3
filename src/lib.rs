//! # edgequake-docpatch
//!
//! Rewrite the text of PDF, DOCX and LaTeX documents through an LLM while
//! keeping their layout.
//!
//! The document is cut into addressable fragments, each numbered in
//! traversal order and tied to an anchor (a word box, a run, or a literal
//! span). The numbered fragments go to a rewriting service together with a
//! free-form goal; the answer is joined back on the number, never on the
//! text, and each replacement is written into the original document at its
//! anchor.
//!
//! ## Pipeline Overview
//!
//! ```text
//! document
//!  │
//!  ├─ 1. Input     load the file, format from the extension
//!  ├─ 2. Extract   words (PDF) · runs (DOCX) · text spans (LaTeX)
//!  ├─ 3. Index     0..n in traversal order
//!  ├─ 4. Service   {index, text} + goal → {index, text}
//!  ├─ 5. Map       equi-join on index; orphans and gaps reported
//!  ├─ 6. Rewrite   paint over (PDF) · swap run text (DOCX) · replace all (LaTeX)
//!  └─ 7. Output    <stem>_modified.<ext> + report of unapplied fragments
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_docpatch::{rewrite_document, RewriteConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = RewriteConfig::default();
//!     let output = rewrite_document("resume.docx", "Staff engineer, compilers team", &config).await?;
//!     println!("wrote {}", output.output_path.display());
//!     for skipped in &output.report.unapplied {
//!         eprintln!("not applied: {}", skipped.error);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Offline use
//!
//! [`extract_fragments`] and [`apply_replacements`] need no provider: dump
//! the fragments, edit them by any means, and apply the `{index, text}` list.
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docpatch` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-docpatch = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod fragment;
pub mod output;
pub mod patch;
pub mod pipeline;
pub mod progress;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{LatexGranularity, PdfStyle, RewriteConfig, RewriteConfigBuilder, Rgb};
pub use error::{CoverageWarning, DocPatchError, FragmentError};
pub use fragment::{Anchor, BoundingBox, DocumentFormat, Fragment, GeneratedFragment};
pub use output::{
    ExtractionOutput, ResizedFragment, RewriteOutput, RewriteReport, RewriteStats, UnappliedFragment,
};
pub use patch::{apply_replacements, extract_fragments, rewrite_document, rewrite_document_sync};
pub use pipeline::extract::{extract, FragmentExtractor};
pub use pipeline::input::Document;
pub use pipeline::mapping::{map, EntryStatus, Mapping, ReplacementEntry};
pub use pipeline::rewrite::{rewrite, DocumentRewriter, FragmentOutcome, Rewritten};
pub use progress::{NoopProgressCallback, ProgressCallback, RewriteProgressCallback};
