//! Audit artifacts: the extraction, the mapping and the report as JSON.
//!
//! Written to `RewriteConfig::artifact_dir` when set:
//!
//! ```text
//! fragments.json  {"0": {"text": "…", "anchor": {…}}, …}
//! mapping.json    {"0": {"status": "matched", "original": "…", "replacement": "…", "anchor": {…}}, …}
//! report.json     RewriteReport
//! ```
//!
//! Both keyed files use the fragment index as the object key so a reader can
//! line them up without relying on array order.

use crate::error::DocPatchError;
use crate::fragment::{Anchor, Fragment};
use crate::output::RewriteReport;
use crate::pipeline::mapping::{EntryStatus, Mapping};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const FRAGMENTS_FILE: &str = "fragments.json";
pub const MAPPING_FILE: &str = "mapping.json";
pub const REPORT_FILE: &str = "report.json";

#[derive(Serialize)]
struct FragmentRecord<'a> {
    text: &'a str,
    anchor: &'a Anchor,
}

#[derive(Serialize)]
struct MappingRecord<'a> {
    status: EntryStatus,
    original: Option<&'a str>,
    replacement: Option<&'a str>,
    anchor: Option<&'a Anchor>,
}

/// `fragments.json` body.
pub fn fragments_json(fragments: &[Fragment]) -> Result<String, serde_json::Error> {
    let keyed: BTreeMap<usize, FragmentRecord<'_>> = fragments
        .iter()
        .map(|f| {
            (
                f.index,
                FragmentRecord {
                    text: &f.text,
                    anchor: &f.anchor,
                },
            )
        })
        .collect();
    serde_json::to_string_pretty(&keyed)
}

/// `mapping.json` body.
pub fn mapping_json(mapping: &Mapping) -> Result<String, serde_json::Error> {
    let keyed: BTreeMap<usize, MappingRecord<'_>> = mapping
        .entries()
        .map(|e| {
            (
                e.index,
                MappingRecord {
                    status: e.status(),
                    original: e.original.as_deref(),
                    replacement: e.replacement.as_deref(),
                    anchor: e.anchor.as_ref(),
                },
            )
        })
        .collect();
    serde_json::to_string_pretty(&keyed)
}

/// Write all three artifacts into `dir`, creating it if needed.
pub async fn write_artifacts(
    dir: &Path,
    fragments: &[Fragment],
    mapping: &Mapping,
    report: &RewriteReport,
) -> Result<Vec<PathBuf>, DocPatchError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| artifact_error(dir, e))?;

    let report_json = serde_json::to_string_pretty(report);
    let bodies = [
        (FRAGMENTS_FILE, fragments_json(fragments)),
        (MAPPING_FILE, mapping_json(mapping)),
        (REPORT_FILE, report_json),
    ];

    let mut written = Vec::with_capacity(bodies.len());
    for (name, body) in bodies {
        let path = dir.join(name);
        let body = body.map_err(|e| artifact_error(&path, e))?;
        tokio::fs::write(&path, body)
            .await
            .map_err(|e| artifact_error(&path, e))?;
        debug!("Wrote {}", path.display());
        written.push(path);
    }
    Ok(written)
}

fn artifact_error(path: &Path, e: impl std::fmt::Display) -> DocPatchError {
    DocPatchError::ArtifactWriteFailed {
        path: path.to_path_buf(),
        detail: e.to_string(),
    }
}
