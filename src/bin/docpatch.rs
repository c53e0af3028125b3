//! CLI binary for edgequake-docpatch.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `RewriteConfig` and prints results.

use anyhow::{bail, Context, Result};
use clap::Parser;
use edgequake_docpatch::pipeline::response::parse_generated;
use edgequake_docpatch::{
    apply_replacements, extract_fragments, rewrite_document, LatexGranularity, PdfStyle,
    ProgressCallback, RewriteConfig, RewriteOutput, RewriteProgressCallback, Rgb,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: a spinner for the extract / wait / apply
/// phases plus one log line per skipped fragment.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Extracting");
        bar.set_message("Opening document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl RewriteProgressCallback for CliProgressCallback {
    fn on_extraction_complete(&self, fragment_count: usize) {
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("{fragment_count} fragments extracted"))
        ));
        self.bar.set_prefix("Applying");
        self.bar.set_message("");
    }

    fn on_service_request(&self, sent: usize) {
        self.bar.set_prefix("Rewriting");
        self.bar.set_message(format!("waiting for {sent} fragments…"));
    }

    fn on_service_response(&self, returned: usize) {
        self.bar
            .println(format!("  {} {} fragments returned", green("✓"), returned));
        self.bar.set_prefix("Applying");
        self.bar.set_message("");
    }

    fn on_fragment_applied(&self, index: usize) {
        self.bar.set_message(format!("fragment #{index}"));
    }

    fn on_fragment_skipped(&self, _index: usize, reason: &str) {
        let msg = if reason.chars().count() > 100 {
            format!("{}\u{2026}", reason.chars().take(99).collect::<String>())
        } else {
            reason.to_string()
        };
        self.bar.println(format!("  {} {}", red("✗"), red(&msg)));
    }

    fn on_rewrite_complete(&self, applied: usize, unapplied: usize) {
        self.bar.finish_and_clear();
        if unapplied == 0 {
            eprintln!("{} {} fragments rewritten", green("✔"), bold(&applied.to_string()));
        } else {
            eprintln!(
                "{} {} fragments rewritten  ({} not applied)",
                cyan("⚠"),
                bold(&applied.to_string()),
                red(&unapplied.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Tailor a resume to a job description
  docpatch resume.docx --context-file job.txt

  # Inline goal, LaTeX paragraphs instead of lines
  docpatch cv.tex --context "Staff engineer, compilers" --latex-granularity block

  # Dump fragments (no API key needed), edit them, apply offline
  docpatch resume.pdf --extract-only > fragments.json
  docpatch resume.pdf --replacements edited.json

  # Keep an audit trail of the run
  docpatch resume.docx --context-file job.txt --artifact-dir audit/ --json

OUTPUT:
  The rewritten document is written next to the input as <stem>_modified.<ext>
  (change the suffix with --suffix). Fragments that could not be applied are
  listed on stderr and in the JSON report.

REPLACEMENTS FILE:
  Any of these shapes:
    [{"index": 0, "text": "Lead Engineer"}, ...]
    {"fragments": [{"index": 0, "text": "Lead Engineer"}]}
    {"0": "Lead Engineer", "3": null}

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory), PDF only
"#;

/// Rewrite the text of PDF, DOCX and LaTeX documents with an LLM.
#[derive(Parser, Debug)]
#[command(
    name = "docpatch",
    version,
    about = "Rewrite the text of PDF, DOCX and LaTeX documents with an LLM, keeping their layout",
    long_about = "Cut a document into indexed fragments, let an LLM rewrite them towards a goal \
(e.g. a job description), and write the answers back in place: word boxes for PDF, runs for \
DOCX, markup-free text spans for LaTeX. Supports OpenAI, Anthropic, Google Gemini, Azure OpenAI, and \
any OpenAI-compatible endpoint (Ollama, vLLM, LiteLLM, etc.).",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Document to rewrite: .pdf, .docx or .tex.
    input: PathBuf,

    /// Goal the rewrite should serve (e.g. the target job description).
    #[arg(long, env = "DOCPATCH_CONTEXT", conflicts_with = "context_file")]
    context: Option<String>,

    /// Read the goal from a text file.
    #[arg(long, env = "DOCPATCH_CONTEXT_FILE")]
    context_file: Option<PathBuf>,

    /// Apply {index, text} entries from a JSON file instead of calling the LLM.
    #[arg(long, conflicts_with_all = ["context", "context_file"])]
    replacements: Option<PathBuf>,

    /// Print the extracted fragments as JSON and exit.
    #[arg(long)]
    extract_only: bool,

    /// Print the full result (fragments, mapping, report, stats) as JSON.
    #[arg(long, env = "DOCPATCH_JSON")]
    json: bool,

    /// LLM model ID (e.g. gpt-4.1-mini, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Suffix inserted before the extension of the output file.
    #[arg(long, env = "DOCPATCH_SUFFIX", default_value = "_modified")]
    suffix: String,

    /// Write fragments.json, mapping.json and report.json into this directory.
    #[arg(long, env = "DOCPATCH_ARTIFACT_DIR")]
    artifact_dir: Option<PathBuf>,

    /// LaTeX fragment granularity.
    #[arg(long, env = "DOCPATCH_LATEX_GRANULARITY", value_enum, default_value = "line")]
    latex_granularity: GranularityArg,

    /// Fragments with fewer alphanumeric characters are not sent to the LLM.
    #[arg(long, env = "DOCPATCH_MIN_CHARS", default_value_t = 1)]
    min_chars: usize,

    /// Font size of PDF replacement text, in points. Text wider than the
    /// replaced word is drawn smaller.
    #[arg(long, env = "DOCPATCH_FONT_SIZE", default_value_t = 12.0)]
    font_size: f32,

    /// Colour painted over replaced PDF words (#rrggbb).
    #[arg(long, env = "DOCPATCH_BACKGROUND", default_value = "#ffffff")]
    background: String,

    /// Colour of PDF replacement text (#rrggbb).
    #[arg(long, env = "DOCPATCH_TEXT_COLOR", default_value = "#000000")]
    text_color: String,

    /// Path to libpdfium (file or directory).
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "DOCPATCH_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Max LLM output tokens.
    #[arg(long, env = "DOCPATCH_MAX_TOKENS", default_value_t = 4096)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCPATCH_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Retries on LLM failure.
    #[arg(long, env = "DOCPATCH_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// LLM call timeout in seconds.
    #[arg(long, env = "DOCPATCH_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Disable progress spinner.
    #[arg(long, env = "DOCPATCH_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCPATCH_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCPATCH_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum GranularityArg {
    Line,
    Block,
}

impl From<GranularityArg> for LatexGranularity {
    fn from(v: GranularityArg) -> Self {
        match v {
            GranularityArg::Line => LatexGranularity::Line,
            GranularityArg::Block => LatexGranularity::Block,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries the feedback that matters; keep INFO logs from
    // tearing through it unless asked for.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json && !cli.extract_only;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Extract-only mode ────────────────────────────────────────────────
    if cli.extract_only {
        let config = build_config(&cli, None).await?;
        let extraction = extract_fragments(&cli.input, &config)
            .await
            .context("Extraction failed")?;
        println!(
            "{}",
            serde_json::to_string_pretty(&extraction).context("Failed to serialise fragments")?
        );
        return Ok(());
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn RewriteProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let output = if let Some(ref path) = cli.replacements {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read replacements from {:?}", path))?;
        let generated = parse_generated(&raw)
            .with_context(|| format!("Invalid replacements file {:?}", path))?;
        apply_replacements(&cli.input, &generated, &config)
            .await
            .context("Applying replacements failed")?
    } else {
        let context = read_context(&cli).await?;
        rewrite_document(&cli.input, &context, &config)
            .await
            .context("Rewrite failed")?
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if !cli.quiet {
        print_summary(&output, show_progress);
    }

    Ok(())
}

async fn read_context(cli: &Cli) -> Result<String> {
    if let Some(ref text) = cli.context {
        return Ok(text.clone());
    }
    if let Some(ref path) = cli.context_file {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read context from {:?}", path));
    }
    bail!("Nothing to do: pass --context, --context-file, --replacements or --extract-only")
}

fn print_summary(output: &RewriteOutput, show_progress: bool) {
    let report = &output.report;
    if !show_progress {
        eprintln!(
            "Rewrote {}/{} fragments",
            report.applied.len(),
            output.stats.total_fragments
        );
        for skipped in &report.unapplied {
            eprintln!("  {} {}", red("✗"), skipped.error);
        }
    }
    for resized in &report.resized {
        eprintln!(
            "   {} fragment {} drawn at {:.1}pt",
            dim("shrunk to fit:"),
            resized.index,
            resized.font_size
        );
    }
    if !report.orphans.is_empty() {
        eprintln!(
            "   {} {:?}",
            dim("ignored indices not in the document:"),
            report.orphans
        );
    }
    eprintln!(
        "{}  {}  {}ms  →  {}",
        if report.unapplied.is_empty() {
            green("✔")
        } else {
            cyan("⚠")
        },
        output.format,
        output.stats.total_duration_ms,
        bold(&output.output_path.display().to_string()),
    );
    if output.stats.sent_fragments > 0 {
        eprintln!(
            "   {} tokens in  /  {} tokens out",
            dim(&output.stats.total_input_tokens.to_string()),
            dim(&output.stats.total_output_tokens.to_string()),
        );
    }
}

/// Map CLI args to `RewriteConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<RewriteConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let style = PdfStyle {
        font_size: cli.font_size,
        background: parse_color(&cli.background, "--background")?,
        text_color: parse_color(&cli.text_color, "--text-color")?,
    };

    let mut builder = RewriteConfig::builder()
        .output_suffix(cli.suffix.clone())
        .latex_granularity(cli.latex_granularity.clone().into())
        .min_fragment_chars(cli.min_chars)
        .pdf_style(style)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .api_timeout_secs(cli.api_timeout);

    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    if let Some(ref m) = cli.model {
        builder = builder.model(m.clone());
    }
    if let Some(ref p) = cli.provider {
        builder = builder.provider_name(p.clone());
    }
    if let Some(ref dir) = cli.artifact_dir {
        builder = builder.artifact_dir(dir.clone());
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_lib_path(lib.clone());
    }
    if let Some(sp) = system_prompt {
        builder = builder.system_prompt(sp);
    }

    builder.build().map_err(|e| anyhow::anyhow!("{}", e))
}

fn parse_color(s: &str, flag: &str) -> Result<Rgb> {
    Rgb::from_hex(s).with_context(|| format!("{flag} expects #rrggbb, got {s:?}"))
}
