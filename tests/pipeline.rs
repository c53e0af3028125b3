//! Integration tests for the extract → map → rewrite pipeline.
//!
//! Everything here runs offline: [`apply_replacements`] needs no service,
//! and [`rewrite_document`] is driven by in-process providers, so no API key
//! is needed. DOCX and LaTeX fixtures are built in a temp directory. The PDF
//! test needs libpdfium and prints SKIP without it.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use async_trait::async_trait;
use edgequake_docpatch::pipeline::pdfium::bind_pdfium;
use edgequake_docpatch::{
    apply_replacements, extract_fragments, rewrite_document, Anchor, DocPatchError,
    DocumentFormat, EntryStatus, GeneratedFragment, RewriteConfig,
};
use edgequake_llm::{
    ChatMessage, CompletionOptions, LLMProvider, LLMResponse, LlmError, MockProvider,
};
use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

// ── Test helpers ─────────────────────────────────────────────────────────────

const RESUME_BODY: &str = r#"<w:p><w:pPr><w:pStyle w:val="Heading1"/></w:pPr><w:r><w:rPr><w:b/><w:color w:val="1F4E79"/></w:rPr><w:t>Senior Engineer</w:t></w:r></w:p><w:p><w:r><w:t xml:space="preserve">Built </w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>compilers</w:t></w:r></w:p><w:p><w:r><w:t>Rust, C++</w:t></w:r></w:p>"#;

fn document_xml(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
    )
}

fn write_docx(dir: &Path, name: &str, body: &str) -> PathBuf {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    writer.start_file("[Content_Types].xml", options).unwrap();
    writer
        .write_all(br#"<?xml version="1.0"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
        .unwrap();
    writer.start_file("word/document.xml", options).unwrap();
    writer.write_all(document_xml(body).as_bytes()).unwrap();
    writer.start_file("word/styles.xml", options).unwrap();
    writer.write_all(b"<w:styles/>").unwrap();
    let bytes = writer.finish().unwrap().into_inner();

    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn read_document_xml(bytes: &[u8]) -> String {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut part = archive.by_name("word/document.xml").unwrap();
    let mut xml = String::new();
    part.read_to_string(&mut xml).unwrap();
    xml
}

fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn fragment_texts(fragments: &[edgequake_docpatch::Fragment]) -> Vec<(usize, &str)> {
    fragments.iter().map(|f| (f.index, f.text.as_str())).collect()
}

// ── Extraction ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn docx_extraction_is_indexed_in_reading_order() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_docx(dir.path(), "resume.docx", RESUME_BODY);

    let out = extract_fragments(&input, &RewriteConfig::default())
        .await
        .unwrap();

    assert_eq!(out.format, DocumentFormat::Docx);
    assert_eq!(
        fragment_texts(&out.fragments),
        vec![
            (0, "Senior Engineer"),
            (1, "Built "),
            (2, "compilers"),
            (3, "Rust, C++"),
        ]
    );
    assert_eq!(out.fragments[2].anchor, Anchor::Docx { paragraph: 1, run: 1 });
}

#[tokio::test]
async fn extraction_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(
        dir.path(),
        "cv.tex",
        "\\documentclass{article}\n\\begin{document}\nSenior Engineer\n\n\\textbf{Built} compilers.\n\\end{document}\n",
    );
    let config = RewriteConfig::default();

    let first = extract_fragments(&input, &config).await.unwrap();
    let second = extract_fragments(&input, &config).await.unwrap();
    assert_eq!(first.fragments, second.fragments);
    assert_eq!(
        fragment_texts(&first.fragments),
        vec![(0, "Senior Engineer"), (1, "Built"), (2, "compilers.")]
    );
}

#[test]
fn extraction_works_outside_an_async_context() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "note.tex", "One line\n");
    let out = tokio_test::block_on(extract_fragments(&input, &RewriteConfig::default())).unwrap();
    assert_eq!(fragment_texts(&out.fragments), vec![(0, "One line")]);
}

// ── DOCX rewriting ───────────────────────────────────────────────────────────

#[tokio::test]
async fn docx_replacement_keeps_run_formatting_and_neighbours() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_docx(dir.path(), "resume.docx", RESUME_BODY);

    let out = apply_replacements(
        &input,
        &[GeneratedFragment::new(0, "Lead Engineer")],
        &RewriteConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(out.output_path, dir.path().join("resume_modified.docx"));
    assert_eq!(out.report.applied, vec![0]);
    assert!(out.report.unapplied.is_empty());

    let on_disk = std::fs::read(&out.output_path).unwrap();
    assert_eq!(on_disk, out.document);
    let xml = read_document_xml(&on_disk);
    assert!(xml.contains(r#"<w:rPr><w:b/><w:color w:val="1F4E79"/></w:rPr>"#));
    assert!(xml.contains("Lead Engineer"));
    assert!(!xml.contains("Senior Engineer"));
    // Paragraph 2 is byte-for-byte the same.
    assert!(xml.contains(r#"<w:p><w:r><w:t xml:space="preserve">Built </w:t></w:r><w:r><w:rPr><w:i/></w:rPr><w:t>compilers</w:t></w:r></w:p>"#));

    // The input is never touched.
    assert!(read_document_xml(&std::fs::read(&input).unwrap()).contains("Senior Engineer"));
}

#[tokio::test]
async fn second_pass_on_rewritten_docx_is_a_no_op() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_docx(dir.path(), "resume.docx", RESUME_BODY);
    let entries = [GeneratedFragment::new(0, "Lead Engineer")];

    let first = apply_replacements(&input, &entries, &RewriteConfig::default())
        .await
        .unwrap();
    let config = RewriteConfig::builder()
        .output_suffix("_again")
        .build()
        .unwrap();
    let second = apply_replacements(&first.output_path, &entries, &config)
        .await
        .unwrap();

    // Index 0 now reads "Lead Engineer", so the entry is a no-op.
    assert_eq!(second.report.unchanged, vec![0]);
    assert!(second.report.unapplied.is_empty());
    assert_eq!(second.document, first.document);
}

#[tokio::test]
async fn orphans_and_gaps_are_reported_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_docx(dir.path(), "resume.docx", RESUME_BODY);

    let out = apply_replacements(
        &input,
        &[
            GeneratedFragment::new(3, "Rust, Go"),
            GeneratedFragment::new(42, "nowhere"),
        ],
        &RewriteConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(out.report.applied, vec![3]);
    assert_eq!(out.report.orphans, vec![42]);
    assert_eq!(out.mapping.get(42).unwrap().status(), EntryStatus::Orphan);
    assert_eq!(
        out.mapping.get(0).unwrap().status(),
        EntryStatus::MissingReplacement
    );
    assert!(out.is_complete());
    assert_eq!(out.stats.total_fragments, 4);
    assert_eq!(out.stats.returned_fragments, 2);
}

#[tokio::test]
async fn no_changes_returns_the_input_bytes() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_docx(dir.path(), "resume.docx", RESUME_BODY);

    let out = apply_replacements(
        &input,
        &[GeneratedFragment::new(1, "Built ")],
        &RewriteConfig::default(),
    )
    .await
    .unwrap();

    assert_eq!(out.document, std::fs::read(&input).unwrap());
    assert_eq!(out.report.unchanged, vec![1]);
}

// ── LaTeX rewriting ──────────────────────────────────────────────────────────

#[tokio::test]
async fn latex_replaces_every_occurrence() {
    let dir = tempfile::tempdir().unwrap();
    let source = "\\begin{document}\nSenior Engineer\n\\section{Senior Engineer}\n% Senior Engineer\n\\end{document}\n";
    let input = write_file(dir.path(), "cv.tex", source);

    let out = apply_replacements(
        &input,
        &[GeneratedFragment::new(0, "Lead Engineer")],
        &RewriteConfig::default(),
    )
    .await
    .unwrap();

    let written = std::fs::read_to_string(&out.output_path).unwrap();
    assert_eq!(written.matches("Lead Engineer").count(), 3);
    assert!(!written.contains("Senior Engineer"));
    assert_eq!(out.report.applied, vec![0]);
}

#[tokio::test]
async fn latex_lines_are_replaced_independently() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "cv.tex", "Alpha\nBeta\n");

    let out = apply_replacements(
        &input,
        &[
            GeneratedFragment::new(0, "Gamma"),
            GeneratedFragment::new(1, "Delta"),
        ],
        &RewriteConfig::default(),
    )
    .await
    .unwrap();
    assert_eq!(out.report.applied, vec![0, 1]);
    assert_eq!(
        std::fs::read_to_string(&out.output_path).unwrap(),
        "Gamma\nDelta\n"
    );
}

// ── Rewriting service ────────────────────────────────────────────────────────

const SERVICE_CV: &str = "Senior Engineer\nGo\nBuilt compilers.\n";

/// Fails every call, counting them.
struct FailingProvider {
    calls: AtomicUsize,
}

/// Answers every call with `answer`, after `delay`.
struct SlowProvider {
    delay: Duration,
    answer: &'static str,
}

#[async_trait]
impl LLMProvider for FailingProvider {
    fn name(&self) -> &str {
        "failing"
    }

    fn model(&self) -> &str {
        "none"
    }

    fn max_context_length(&self) -> usize {
        8192
    }

    async fn complete(&self, _prompt: &str) -> edgequake_llm::Result<LLMResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(LlmError::ApiError("503 Service Unavailable".into()))
    }

    async fn complete_with_options(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> edgequake_llm::Result<LLMResponse> {
        self.complete(prompt).await
    }

    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _options: Option<&CompletionOptions>,
    ) -> edgequake_llm::Result<LLMResponse> {
        self.complete("").await
    }
}

#[async_trait]
impl LLMProvider for SlowProvider {
    fn name(&self) -> &str {
        "slow"
    }

    fn model(&self) -> &str {
        "none"
    }

    fn max_context_length(&self) -> usize {
        8192
    }

    async fn complete(&self, _prompt: &str) -> edgequake_llm::Result<LLMResponse> {
        tokio::time::sleep(self.delay).await;
        Ok(LLMResponse::new(self.answer, "none"))
    }

    async fn complete_with_options(
        &self,
        prompt: &str,
        _options: &CompletionOptions,
    ) -> edgequake_llm::Result<LLMResponse> {
        self.complete(prompt).await
    }

    async fn chat(
        &self,
        _messages: &[ChatMessage],
        _options: Option<&CompletionOptions>,
    ) -> edgequake_llm::Result<LLMResponse> {
        self.complete("").await
    }
}

async fn mock_answering(answer: &str) -> Arc<dyn LLMProvider> {
    let mock = MockProvider::new();
    mock.add_response(answer).await;
    Arc::new(mock)
}

#[tokio::test]
async fn fenced_service_answer_is_applied() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "cv.tex", SERVICE_CV);
    let answer = "Here you go:\n```json\n[{\"index\": 0, \"text\": \"Lead Engineer\"}, {\"index\": 2, \"text\": \"Built compilers.\"}]\n```";
    let config = RewriteConfig::builder()
        .provider(mock_answering(answer).await)
        .min_fragment_chars(3)
        .build()
        .unwrap();

    let out = rewrite_document(&input, "Staff role, compiler team", &config)
        .await
        .unwrap();

    assert_eq!(out.report.applied, vec![0]);
    assert_eq!(out.report.unchanged, vec![1, 2]);
    assert_eq!(out.stats.total_fragments, 3);
    assert_eq!(out.stats.sent_fragments, 2, "\"Go\" is below min_fragment_chars");
    assert_eq!(out.stats.returned_fragments, 2);
    assert_eq!(out.stats.service_retries, 0);
    assert!(
        out.report.warnings.is_empty(),
        "a fragment never sent is not missing from the answer: {:?}",
        out.report.warnings
    );
    assert_eq!(
        std::fs::read_to_string(&out.output_path).unwrap(),
        "Lead Engineer\nGo\nBuilt compilers.\n"
    );
}

#[tokio::test]
async fn prose_service_answer_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "cv.tex", SERVICE_CV);
    let config = RewriteConfig::builder()
        .provider(mock_answering("Sorry, I can only rewrite one line at a time.").await)
        .build()
        .unwrap();

    let err = rewrite_document(&input, "Staff role", &config)
        .await
        .unwrap_err();
    assert!(matches!(err, DocPatchError::MalformedResponse { .. }), "{err:?}");
    assert!(!dir.path().join("cv_modified.tex").exists());
}

#[tokio::test]
async fn failing_service_is_retried_then_reported() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "cv.tex", SERVICE_CV);
    let provider = Arc::new(FailingProvider {
        calls: AtomicUsize::new(0),
    });
    let config = RewriteConfig::builder()
        .provider(provider.clone())
        .max_retries(2)
        .retry_backoff_ms(1)
        .build()
        .unwrap();

    let err = rewrite_document(&input, "Staff role", &config)
        .await
        .unwrap_err();
    match err {
        DocPatchError::LlmApiError { retries, message } => {
            assert_eq!(retries, 2);
            assert!(message.contains("503"), "{message}");
        }
        other => panic!("expected LlmApiError, got {other:?}"),
    }
    assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
    assert!(!dir.path().join("cv_modified.tex").exists());
}

#[tokio::test]
async fn stalled_service_times_out() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "cv.tex", SERVICE_CV);
    let config = RewriteConfig::builder()
        .provider(Arc::new(SlowProvider {
            delay: Duration::from_secs(30),
            answer: "[]",
        }))
        .max_retries(0)
        .api_timeout_secs(1)
        .build()
        .unwrap();

    let err = rewrite_document(&input, "Staff role", &config)
        .await
        .unwrap_err();
    assert!(matches!(err, DocPatchError::ApiTimeout { secs: 1 }), "{err:?}");
}

#[tokio::test]
async fn service_time_is_reported_in_stats() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "cv.tex", SERVICE_CV);
    let config = RewriteConfig::builder()
        .provider(Arc::new(SlowProvider {
            delay: Duration::from_millis(60),
            answer: r#"[{"index": 0, "text": "Lead Engineer"}]"#,
        }))
        .build()
        .unwrap();

    let out = rewrite_document(&input, "Staff role", &config).await.unwrap();
    assert_eq!(out.report.applied, vec![0]);
    assert!(out.stats.service_duration_ms >= 60, "{:?}", out.stats);
    assert!(out.stats.service_duration_ms <= out.stats.total_duration_ms);
}

#[tokio::test]
async fn empty_context_is_rejected_before_any_call() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "cv.tex", SERVICE_CV);
    let provider = Arc::new(FailingProvider {
        calls: AtomicUsize::new(0),
    });
    let config = RewriteConfig::builder()
        .provider(provider.clone())
        .build()
        .unwrap();

    let err = rewrite_document(&input, "  ", &config).await.unwrap_err();
    assert!(matches!(err, DocPatchError::InvalidConfig(_)));
    assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
}

// ── Artifacts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn artifacts_are_written_when_requested() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "cv.tex", "Senior Engineer\n");
    let audit = dir.path().join("audit");
    let config = RewriteConfig::builder()
        .artifact_dir(&audit)
        .build()
        .unwrap();

    apply_replacements(&input, &[GeneratedFragment::new(0, "Lead Engineer")], &config)
        .await
        .unwrap();

    let mapping: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(audit.join("mapping.json")).unwrap())
            .unwrap();
    assert_eq!(mapping["0"]["original"], "Senior Engineer");
    assert_eq!(mapping["0"]["replacement"], "Lead Engineer");
    assert!(audit.join("fragments.json").exists());
    assert!(audit.join("report.json").exists());
}

// ── Fatal errors ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn unsupported_extension_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "notes.odt", "x");
    let err = extract_fragments(&input, &RewriteConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DocPatchError::UnsupportedFormat { .. }));
}

#[tokio::test]
async fn missing_file_is_reported() {
    let err = extract_fragments("/no/such/dir/resume.docx", &RewriteConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DocPatchError::FileNotFound { .. }));
}

#[tokio::test]
async fn corrupt_docx_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_file(dir.path(), "resume.docx", "this is not a zip file");
    let err = extract_fragments(&input, &RewriteConfig::default())
        .await
        .unwrap_err();
    assert!(matches!(err, DocPatchError::CorruptDocument { .. }));
}

// ── PDF (needs libpdfium) ────────────────────────────────────────────────────

#[tokio::test]
async fn pdf_words_are_painted_over() {
    use pdfium_render::prelude::*;

    let pdfium = match bind_pdfium(None) {
        Ok(p) => p,
        Err(e) => {
            println!("SKIP — pdfium not available: {e}");
            return;
        }
    };

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("resume.pdf");
    {
        let mut doc = pdfium.create_new_pdf().unwrap();
        let font = doc.fonts_mut().helvetica();
        {
            let mut page = doc
                .pages_mut()
                .create_page_at_end(PdfPagePaperSize::a4())
                .unwrap();
            page.objects_mut()
                .create_text_object(
                    PdfPoints::new(72.0),
                    PdfPoints::new(720.0),
                    "Senior Engineer",
                    font,
                    PdfPoints::new(14.0),
                )
                .unwrap();
        }
        std::fs::write(&input, doc.save_to_bytes().unwrap()).unwrap();
    }
    drop(pdfium);

    let config = RewriteConfig::default();
    let extracted = extract_fragments(&input, &config).await.unwrap();
    let words: Vec<&str> = extracted.fragments.iter().map(|f| f.text.as_str()).collect();
    assert_eq!(words, vec!["Senior", "Engineer"]);
    assert!(matches!(extracted.fragments[0].anchor, Anchor::Pdf { page: 0, .. }));

    let out = apply_replacements(&input, &[GeneratedFragment::new(0, "Lead")], &config)
        .await
        .unwrap();
    assert_eq!(out.report.applied, vec![0]);
    assert!(out.report.resized.is_empty());
    assert!(out.document.starts_with(b"%PDF"));
    assert!(out.output_path.ends_with("resume_modified.pdf"));

    let wide = GeneratedFragment::new(1, "Principal Staff Engineer");
    let out = apply_replacements(&input, &[wide], &config).await.unwrap();
    assert_eq!(out.report.applied, vec![1]);
    assert_eq!(out.report.resized.len(), 1);
    assert!(out.report.resized[0].font_size < config.pdf_style.font_size);
}
