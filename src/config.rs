//! Configuration types for document rewriting.
//!
//! All rewrite behaviour is controlled through [`RewriteConfig`], built via
//! its [`RewriteConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to move a config into a blocking task, log it, and diff two runs.

use crate::error::DocPatchError;
use crate::progress::ProgressCallback;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one extract → rewrite → replace run.
///
/// Built via [`RewriteConfig::builder()`] or using
/// [`RewriteConfig::default()`].
///
/// # Example
/// ```rust
/// use edgequake_docpatch::{LatexGranularity, RewriteConfig};
///
/// let config = RewriteConfig::builder()
///     .model("gpt-4.1-mini")
///     .output_suffix("_tailored")
///     .latex_granularity(LatexGranularity::Block)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct RewriteConfig {
    /// LLM model identifier, e.g. "gpt-4.1-mini". If None, uses provider default.
    pub model: Option<String>,

    /// LLM provider name (e.g. "openai", "anthropic", "ollama").
    /// If None along with `provider`, uses `ProviderFactory::from_env()`.
    pub provider_name: Option<String>,

    /// Pre-constructed LLM provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the rewriting call. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens the service may generate. Default: 4096.
    ///
    /// The answer echoes every fragment it was given, so this must cover
    /// roughly the size of the extracted text plus JSON overhead.
    pub max_tokens: usize,

    /// Maximum retry attempts on a transient API failure. Default: 3.
    pub max_retries: u32,

    /// Initial retry delay in milliseconds, doubled per attempt. Default: 500.
    pub retry_backoff_ms: u64,

    /// Per-call timeout in seconds. Default: 60.
    pub api_timeout_secs: u64,

    /// Custom system prompt. If None, uses the built-in default.
    pub system_prompt: Option<String>,

    /// Suffix inserted before the extension of the output file. Default: "_modified".
    pub output_suffix: String,

    /// Directory receiving `fragments.json`, `mapping.json` and `report.json`.
    pub artifact_dir: Option<PathBuf>,

    /// LaTeX fragment granularity. Default: [`LatexGranularity::Line`].
    pub latex_granularity: LatexGranularity,

    /// Fragments with fewer alphanumeric characters are not sent to the
    /// rewriting service and stay unchanged. Default: 1.
    pub min_fragment_chars: usize,

    /// Paint and font settings for PDF replacement boxes.
    pub pdf_style: PdfStyle,

    /// Explicit pdfium library (file or directory). Falls back to
    /// `PDFIUM_LIB_PATH`, the working directory, then the system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Receives extraction / rewrite events. Default: None.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 4096,
            max_retries: 3,
            retry_backoff_ms: 500,
            api_timeout_secs: 60,
            system_prompt: None,
            output_suffix: "_modified".to_string(),
            artifact_dir: None,
            latex_granularity: LatexGranularity::default(),
            min_fragment_chars: 1,
            pdf_style: PdfStyle::default(),
            pdfium_lib_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for RewriteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RewriteConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("output_suffix", &self.output_suffix)
            .field("artifact_dir", &self.artifact_dir)
            .field("latex_granularity", &self.latex_granularity)
            .field("min_fragment_chars", &self.min_fragment_chars)
            .field("pdf_style", &self.pdf_style)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .finish()
    }
}

impl RewriteConfig {
    /// Create a new builder for `RewriteConfig`.
    pub fn builder() -> RewriteConfigBuilder {
        RewriteConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`RewriteConfig`].
#[derive(Debug)]
pub struct RewriteConfigBuilder {
    config: RewriteConfig,
}

impl RewriteConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn max_retries(mut self, n: u32) -> Self {
        self.config.max_retries = n;
        self
    }

    pub fn retry_backoff_ms(mut self, ms: u64) -> Self {
        self.config.retry_backoff_ms = ms;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    pub fn output_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.config.output_suffix = suffix.into();
        self
    }

    pub fn artifact_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.artifact_dir = Some(dir.into());
        self
    }

    pub fn latex_granularity(mut self, granularity: LatexGranularity) -> Self {
        self.config.latex_granularity = granularity;
        self
    }

    pub fn min_fragment_chars(mut self, n: usize) -> Self {
        self.config.min_fragment_chars = n;
        self
    }

    pub fn pdf_style(mut self, style: PdfStyle) -> Self {
        self.config.pdf_style = style;
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RewriteConfig, DocPatchError> {
        let c = &self.config;
        if c.output_suffix.is_empty() {
            return Err(DocPatchError::InvalidConfig(
                "Output suffix must not be empty (the input would be overwritten)".into(),
            ));
        }
        if c.output_suffix.contains(['/', '\\']) {
            return Err(DocPatchError::InvalidConfig(format!(
                "Output suffix must not contain path separators, got {:?}",
                c.output_suffix
            )));
        }
        if !(c.pdf_style.font_size > 0.0 && c.pdf_style.font_size <= 144.0) {
            return Err(DocPatchError::InvalidConfig(format!(
                "PDF font size must be in (0, 144], got {}",
                c.pdf_style.font_size
            )));
        }
        if c.api_timeout_secs == 0 {
            return Err(DocPatchError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Format-specific settings ─────────────────────────────────────────────

/// How LaTeX sources are cut into fragments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LatexGranularity {
    /// One fragment per run of visible text between markup. (default)
    #[default]
    Line,
    /// Like `Line`, joining runs across a bare line break. Markup, comments
    /// and blank lines end a block.
    Block,
}

/// 8-bit RGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const WHITE: Rgb = Rgb {
        r: 255,
        g: 255,
        b: 255,
    };
    pub const BLACK: Rgb = Rgb { r: 0, g: 0, b: 0 };

    /// Parse `#rrggbb` or `rrggbb`.
    pub fn from_hex(s: &str) -> Option<Rgb> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
        Some(Rgb {
            r: channel(0)?,
            g: channel(2)?,
            b: channel(4)?,
        })
    }
}

/// Paint settings for PDF replacements.
///
/// The original glyphs are covered with an opaque `background` box and the
/// replacement is drawn in Helvetica at `font_size`, or smaller when it would
/// overflow the covered box; the original font is not reproduced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PdfStyle {
    /// Largest replacement font size in points. Default: 12.
    pub font_size: f32,
    /// Colour painted over the original word. Default: white.
    pub background: Rgb,
    /// Replacement text colour. Default: black.
    pub text_color: Rgb,
}

impl Default for PdfStyle {
    fn default() -> Self {
        Self {
            font_size: 12.0,
            background: Rgb::WHITE,
            text_color: Rgb::BLACK,
        }
    }
}
