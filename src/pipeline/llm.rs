//! Rewriting-service client: send the fragment list, wait for the full answer.
//!
//! Prompt text lives in [`crate::prompts`] and answer parsing in
//! [`super::response`]. The call is the pipeline's only suspend point;
//! nothing is applied to the document until the complete answer has arrived.
//!
//! ## Retry Strategy
//!
//! Exponential backoff (`retry_backoff_ms * 2^(retry - 1)`): with 500 ms base
//! and 3 retries the wait sequence is 500 ms → 1 s → 2 s. Each attempt is
//! bounded by `api_timeout_secs`.

use crate::config::RewriteConfig;
use crate::error::DocPatchError;
use crate::fragment::Fragment;
use crate::prompts::{rewrite_request, DEFAULT_SYSTEM_PROMPT};
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, warn};

/// Raw answer of the rewriting service plus usage accounting.
///
/// `duration_ms` spans every attempt, backoff included.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub content: String,
    pub input_tokens: usize,
    pub output_tokens: usize,
    pub duration_ms: u64,
    pub retries: u32,
}

/// Ask the service to rewrite `fragments` towards `context`.
///
/// Errors only after every retry is exhausted; a timeout on the last attempt
/// surfaces as [`DocPatchError::ApiTimeout`].
pub async fn request_rewrite(
    provider: &Arc<dyn LLMProvider>,
    fragments: &[&Fragment],
    context: &str,
    config: &RewriteConfig,
) -> Result<ServiceResponse, DocPatchError> {
    let start = Instant::now();
    let system_prompt = config
        .system_prompt
        .as_deref()
        .unwrap_or(DEFAULT_SYSTEM_PROMPT);

    let messages = vec![
        ChatMessage::system(system_prompt),
        ChatMessage::user(rewrite_request(context, fragments)),
    ];
    let options = build_options(config);
    let call_timeout = Duration::from_secs(config.api_timeout_secs);

    let mut last_err = DocPatchError::Internal("no attempt made".into());

    for attempt in 0..=config.max_retries {
        if attempt > 0 {
            let backoff = config.retry_backoff_ms * 2u64.pow(attempt - 1);
            warn!(
                "Rewrite request: retry {}/{} after {}ms",
                attempt, config.max_retries, backoff
            );
            sleep(Duration::from_millis(backoff)).await;
        }

        match timeout(call_timeout, provider.chat(&messages, Some(&options))).await {
            Ok(Ok(response)) => {
                let duration = start.elapsed();
                debug!(
                    "Rewrite request: {} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens, response.completion_tokens, duration
                );
                return Ok(ServiceResponse {
                    content: response.content,
                    input_tokens: response.prompt_tokens,
                    output_tokens: response.completion_tokens,
                    duration_ms: duration.as_millis() as u64,
                    retries: attempt,
                });
            }
            Ok(Err(e)) => {
                warn!("Rewrite request: attempt {} failed: {}", attempt + 1, e);
                last_err = DocPatchError::LlmApiError {
                    retries: attempt,
                    message: e.to_string(),
                };
            }
            Err(_) => {
                warn!(
                    "Rewrite request: attempt {} timed out after {}s",
                    attempt + 1,
                    config.api_timeout_secs
                );
                last_err = DocPatchError::ApiTimeout {
                    secs: config.api_timeout_secs,
                };
            }
        }
    }

    Err(last_err)
}

/// Build `CompletionOptions` from the rewrite config.
fn build_options(config: &RewriteConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

fn create_provider(provider_name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, DocPatchError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocPatchError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`).
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`).
/// 4. **OpenAI** when `OPENAI_API_KEY` is set.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
pub fn resolve_provider(config: &RewriteConfig) -> Result<Arc<dyn LLMProvider>, DocPatchError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
            return create_provider("openai", model);
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocPatchError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

/// Model used when a provider is named without a model.
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
