//! Pipeline stages for fragment rewriting.
//!
//! Each submodule implements one step. Extraction, indexing, mapping and
//! rewriting are synchronous; only the service call suspends.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ extract ──▶ index ──▶ llm ──▶ response ──▶ mapping ──▶ rewrite
//! (path)    (per fmt)   (0..n)   (call)  (parse)      (join)      (per fmt)
//! ```
//!
//! 1. [`input`]    — load the file, pick the format by extension
//! 2. [`extract`]  — cut the document into anchored fragments
//! 3. [`index`]    — number fragments in traversal order
//! 4. [`llm`]      — send `{index, text}` plus context to the rewriting
//!    service, with timeout and retry
//! 5. [`response`] — clean and parse the answer into `{index, text}` entries
//! 6. [`mapping`]  — join extraction and answer on `index`
//! 7. [`rewrite`]  — apply the mapping with the format's strategy
//!
//! [`ooxml`] and [`pdfium`] hold format plumbing shared by extraction and
//! rewriting; [`artifacts`] dumps the intermediate results as JSON.

pub mod artifacts;
pub mod extract;
pub mod index;
pub mod input;
pub mod llm;
pub mod mapping;
pub mod ooxml;
pub mod pdfium;
pub mod response;
pub mod rewrite;
