//! Result types returned by the patch entry points.

use crate::error::{CoverageWarning, FragmentError};
use crate::fragment::{DocumentFormat, Fragment};
use crate::pipeline::mapping::Mapping;
use crate::pipeline::rewrite::{FragmentOutcome, Rewritten};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Everything produced by one extract → rewrite → replace run.
#[derive(Debug, Clone, Serialize)]
pub struct RewriteOutput {
    /// Where the rewritten document was written.
    pub output_path: PathBuf,
    /// The rewritten document itself.
    #[serde(skip)]
    pub document: Vec<u8>,
    pub format: DocumentFormat,
    pub fragments: Vec<Fragment>,
    pub mapping: Mapping,
    pub report: RewriteReport,
    pub stats: RewriteStats,
}

impl RewriteOutput {
    /// True when every targeted fragment was applied or needed no change.
    pub fn is_complete(&self) -> bool {
        self.report.unapplied.is_empty()
    }
}

/// Fragment extraction only, no rewriting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionOutput {
    pub input_path: PathBuf,
    pub format: DocumentFormat,
    pub fragments: Vec<Fragment>,
}

/// An entry that could not be applied, and why.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnappliedFragment {
    pub index: usize,
    pub error: FragmentError,
}

/// A PDF replacement drawn smaller than requested to fit its box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResizedFragment {
    pub index: usize,
    pub font_size: f32,
}

/// Per-index account of a rewrite.
///
/// Every extracted index appears in exactly one of `applied`, `unchanged`,
/// `already_applied` or `unapplied`. Orphans are indices the service
/// returned that were never extracted. `resized` lists the applied PDF
/// entries drawn below the configured font size.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewriteReport {
    pub applied: Vec<usize>,
    #[serde(default)]
    pub resized: Vec<ResizedFragment>,
    pub unchanged: Vec<usize>,
    pub already_applied: Vec<usize>,
    pub unapplied: Vec<UnappliedFragment>,
    pub orphans: Vec<usize>,
    pub warnings: Vec<CoverageWarning>,
}

impl RewriteReport {
    /// Build the report from a mapping and the rewriter's outcomes.
    pub fn new(mapping: &Mapping, rewritten: &Rewritten) -> Self {
        let mut report = RewriteReport {
            orphans: mapping.orphans().map(|e| e.index).collect(),
            warnings: mapping.warnings().to_vec(),
            ..Default::default()
        };
        for (&index, outcome) in &rewritten.outcomes {
            match outcome {
                FragmentOutcome::Applied => report.applied.push(index),
                FragmentOutcome::Resized { font_size } => {
                    report.applied.push(index);
                    report.resized.push(ResizedFragment {
                        index,
                        font_size: *font_size,
                    });
                }
                FragmentOutcome::Unchanged => report.unchanged.push(index),
                FragmentOutcome::AlreadyApplied => report.already_applied.push(index),
                FragmentOutcome::Skipped(error) => report.unapplied.push(UnappliedFragment {
                    index,
                    error: error.clone(),
                }),
            }
        }
        report
    }

    pub fn unapplied_indices(&self) -> Vec<usize> {
        self.unapplied.iter().map(|u| u.index).collect()
    }
}

/// Counts, token usage and timings of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RewriteStats {
    pub total_fragments: usize,
    /// Fragments included in the service request.
    pub sent_fragments: usize,
    /// `{index, text}` entries in the service answer.
    pub returned_fragments: usize,
    pub applied_fragments: usize,
    pub unapplied_fragments: usize,
    pub total_input_tokens: u64,
    pub total_output_tokens: u64,
    pub service_retries: u32,
    pub extract_duration_ms: u64,
    pub service_duration_ms: u64,
    pub rewrite_duration_ms: u64,
    pub total_duration_ms: u64,
}
