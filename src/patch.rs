//! End-to-end entry points: extract, ask the rewriting service, apply.
//!
//! | function                | service call | writes output |
//! |-------------------------|--------------|---------------|
//! | [`extract_fragments`]   | no           | no            |
//! | [`rewrite_document`]    | yes          | yes           |
//! | [`apply_replacements`]  | no           | yes           |
//!
//! Extraction and rewriting run inside `spawn_blocking` for every format
//! (pdfium is CPU-bound and not async-aware). The service call is awaited to
//! completion before any rewriting starts.

use crate::config::RewriteConfig;
use crate::error::DocPatchError;
use crate::fragment::{Fragment, GeneratedFragment};
use crate::output::{ExtractionOutput, RewriteOutput, RewriteReport, RewriteStats};
use crate::pipeline::input::{derive_output_path, load_document, Document};
use crate::pipeline::llm::{request_rewrite, resolve_provider};
use crate::pipeline::mapping::{map, map_sent, select_for_service, Mapping};
use crate::pipeline::{artifacts, extract, response, rewrite};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cut a document into indexed fragments without rewriting anything.
///
/// Does not require an LLM provider or API key.
pub async fn extract_fragments(
    input: impl AsRef<Path>,
    config: &RewriteConfig,
) -> Result<ExtractionOutput, DocPatchError> {
    let document = load_document(input).await?;
    let fragments = extract_blocking(&document, config).await?;
    Ok(ExtractionOutput {
        input_path: document.path,
        format: document.format,
        fragments,
    })
}

/// Rewrite a document towards `context` through the rewriting service.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input`   — path to a `.pdf`, `.docx` or `.tex` file
/// * `context` — free-form description of what the rewrite should serve,
///   e.g. a job description
/// * `config`  — rewrite configuration
///
/// # Returns
/// `Ok(RewriteOutput)` once the rewritten document is on disk, even if some
/// fragments could not be applied (see `output.report.unapplied`).
///
/// # Errors
/// Returns `Err(DocPatchError)` only for fatal errors:
/// - unsupported extension, missing or corrupt document
/// - no usable LLM provider, or the service failing on every retry
/// - a service answer that is empty or not `{index, text}` shaped
/// - the output file cannot be written
pub async fn rewrite_document(
    input: impl AsRef<Path>,
    context: &str,
    config: &RewriteConfig,
) -> Result<RewriteOutput, DocPatchError> {
    let total_start = Instant::now();
    if context.trim().is_empty() {
        return Err(DocPatchError::InvalidConfig(
            "Rewriting context must not be empty".into(),
        ));
    }

    // ── Step 1: Load + extract ───────────────────────────────────────────
    let document = load_document(input).await?;
    info!("Starting rewrite: {} ({})", document.path.display(), document.format);
    let extract_start = Instant::now();
    let fragments = extract_blocking(&document, config).await?;
    let mut stats = RewriteStats {
        total_fragments: fragments.len(),
        extract_duration_ms: extract_start.elapsed().as_millis() as u64,
        ..Default::default()
    };
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(fragments.len());
    }

    // ── Step 2: Ask the rewriting service ────────────────────────────────
    let selected = select_for_service(&fragments, config.min_fragment_chars);
    stats.sent_fragments = selected.len();
    let generated = if selected.is_empty() {
        info!("No fragment carries text worth rewriting, skipping service call");
        Vec::new()
    } else {
        let provider = resolve_provider(config)?;
        if let Some(ref cb) = config.progress_callback {
            cb.on_service_request(selected.len());
        }
        let answer = request_rewrite(&provider, &selected, context, config).await?;
        stats.service_duration_ms = answer.duration_ms;
        stats.total_input_tokens = answer.input_tokens as u64;
        stats.total_output_tokens = answer.output_tokens as u64;
        stats.service_retries = answer.retries;

        let generated = response::parse_generated(&answer.content)?;
        info!(
            "Service returned {} of {} fragments in {}ms",
            generated.len(),
            selected.len(),
            stats.service_duration_ms
        );
        if let Some(ref cb) = config.progress_callback {
            cb.on_service_response(generated.len());
        }
        generated
    };
    stats.returned_fragments = generated.len();

    // ── Step 3: Map + rewrite + write ────────────────────────────────────
    let mapping = map_sent(&fragments, &generated, &selected);
    let output = finish(document, fragments, mapping, config, stats, total_start).await?;
    Ok(output)
}

/// Apply caller-supplied `{index, text}` entries to a document.
///
/// Indices refer to a fresh extraction of `input` with the same config, so
/// the entries typically come from an earlier [`extract_fragments`] call.
pub async fn apply_replacements(
    input: impl AsRef<Path>,
    generated: &[GeneratedFragment],
    config: &RewriteConfig,
) -> Result<RewriteOutput, DocPatchError> {
    let total_start = Instant::now();
    let document = load_document(input).await?;
    info!(
        "Applying {} replacements to {} ({})",
        generated.len(),
        document.path.display(),
        document.format
    );
    let extract_start = Instant::now();
    let fragments = extract_blocking(&document, config).await?;
    if let Some(ref cb) = config.progress_callback {
        cb.on_extraction_complete(fragments.len());
    }
    let stats = RewriteStats {
        total_fragments: fragments.len(),
        returned_fragments: generated.len(),
        extract_duration_ms: extract_start.elapsed().as_millis() as u64,
        ..Default::default()
    };
    let mapping = map(&fragments, generated);
    finish(document, fragments, mapping, config, stats, total_start).await
}

/// Synchronous wrapper around [`rewrite_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn rewrite_document_sync(
    input: impl AsRef<Path>,
    context: &str,
    config: &RewriteConfig,
) -> Result<RewriteOutput, DocPatchError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocPatchError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(rewrite_document(input, context, config))
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn extract_blocking(
    document: &Document,
    config: &RewriteConfig,
) -> Result<Vec<Fragment>, DocPatchError> {
    let document = document.clone();
    let config = config.clone();
    tokio::task::spawn_blocking(move || extract::extract(&document, &config))
        .await
        .map_err(|e| DocPatchError::Internal(format!("Extraction task panicked: {}", e)))?
}

/// Rewrite, write the output file and the artifacts.
async fn finish(
    document: Document,
    fragments: Vec<Fragment>,
    mapping: Mapping,
    config: &RewriteConfig,
    mut stats: RewriteStats,
    total_start: Instant,
) -> Result<RewriteOutput, DocPatchError> {
    for warning in mapping.warnings() {
        debug!("Coverage: {}", warning);
    }

    let rewrite_start = Instant::now();
    let rewritten = {
        let document = document.clone();
        let mapping = mapping.clone();
        let config = config.clone();
        tokio::task::spawn_blocking(move || rewrite::rewrite(&document, &mapping, &config))
            .await
            .map_err(|e| DocPatchError::Internal(format!("Rewrite task panicked: {}", e)))??
    };
    stats.rewrite_duration_ms = rewrite_start.elapsed().as_millis() as u64;

    let report = RewriteReport::new(&mapping, &rewritten);
    stats.applied_fragments = report.applied.len();
    stats.unapplied_fragments = report.unapplied.len();
    if !report.unapplied.is_empty() {
        warn!(
            "{} fragment(s) not applied: {:?}",
            report.unapplied.len(),
            report.unapplied_indices()
        );
    }

    let output_path = derive_output_path(&document.path, &config.output_suffix);
    write_atomic(&output_path, &rewritten.bytes).await?;
    info!("Wrote {}", output_path.display());

    if let Some(ref dir) = config.artifact_dir {
        if let Err(e) = artifacts::write_artifacts(dir, &fragments, &mapping, &report).await {
            warn!("{}", e);
        }
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_rewrite_complete(report.applied.len(), report.unapplied.len());
    }
    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Rewrite complete: {}/{} fragments applied, {}ms total",
        stats.applied_fragments, stats.total_fragments, stats.total_duration_ms
    );

    Ok(RewriteOutput {
        output_path,
        document: rewritten.bytes,
        format: document.format,
        fragments,
        mapping,
        report,
        stats,
    })
}

/// Write to `<path>.tmp`, then rename over `path`.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DocPatchError> {
    let write_err = |e: std::io::Error| DocPatchError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
    }

    let tmp_path = tmp_path_for(path);
    tokio::fs::write(&tmp_path, bytes).await.map_err(write_err)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(write_err)?;
    Ok(())
}

fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
