//! Provider selection from a `provider/model` spec.

use std::sync::Arc;

use crate::config::ExtractionSettings;

use super::anthropic::AnthropicProvider;
use super::openai::OpenAiProvider;
use super::LlmProvider;

/// Provider assumed when the model spec carries no `provider/` prefix.
pub const DEFAULT_PROVIDER: &str = "openai";

/// Provider routing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouterError {
    /// Model spec is empty or has an empty half around the `/`.
    #[error("invalid model spec '{spec}', expected '<provider>/<model>' or '<model>'")]
    InvalidModelSpec {
        /// Invalid raw spec.
        spec: String,
    },
    /// Unsupported provider type in spec prefix.
    #[error("unsupported provider '{provider}'")]
    UnsupportedProvider {
        /// Unsupported provider prefix.
        provider: String,
    },
}

/// A model spec split into provider and model name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedModelSpec {
    /// Provider prefix, e.g. `openai`.
    pub provider: String,
    /// Provider-side model name, e.g. `gpt-4o-mini`.
    pub model: String,
}

/// Split `"anthropic/claude-haiku"` into its parts; a bare name maps to
/// [`DEFAULT_PROVIDER`].
///
/// # Errors
///
/// Returns [`RouterError::InvalidModelSpec`] when either part is empty.
pub fn parse_model_spec(spec: &str) -> Result<ParsedModelSpec, RouterError> {
    let spec = spec.trim();
    let (provider, model) = spec.split_once('/').unwrap_or((DEFAULT_PROVIDER, spec));
    if provider.is_empty() || model.is_empty() {
        return Err(RouterError::InvalidModelSpec {
            spec: spec.to_owned(),
        });
    }
    Ok(ParsedModelSpec {
        provider: provider.to_ascii_lowercase(),
        model: model.to_owned(),
    })
}

/// Instantiate the provider named by the settings' model spec.
///
/// # Errors
///
/// Returns [`RouterError`] for malformed specs or unknown providers.
pub fn build_provider(settings: &ExtractionSettings) -> Result<Arc<dyn LlmProvider>, RouterError> {
    let parsed = parse_model_spec(settings.model())?;
    let spec = settings.model().trim().to_owned();
    let api_key = settings.api_key().clone();
    let base_url = settings.base_url().map(str::to_owned);

    match parsed.provider.as_str() {
        "openai" => Ok(Arc::new(match base_url {
            Some(url) => OpenAiProvider::with_base_url(spec, parsed.model, api_key, url),
            None => OpenAiProvider::new(spec, parsed.model, api_key),
        })),
        "anthropic" => Ok(Arc::new(match base_url {
            Some(url) => AnthropicProvider::with_base_url(spec, parsed.model, api_key, url),
            None => AnthropicProvider::new(spec, parsed.model, api_key),
        })),
        _ => Err(RouterError::UnsupportedProvider {
            provider: parsed.provider,
        }),
    }
}
