//! Configuration loading and the immutable extraction settings snapshot.
//!
//! `config.toml` lives at `$TEXTCAL_CONFIG_PATH` or `~/.textcal/config.toml`.
//! Precedence: env vars > config file > defaults. A missing file is not an
//! error. API keys never live in the TOML; they come from the environment or
//! `~/.textcal/.env` (see [`crate::credentials`]).

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::credentials::{ApiKey, Credentials};
use crate::extraction::{ExtractionError, ExtractionMode};
use crate::providers::router::parse_model_spec;

/// Default model spec.
pub const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";
/// Accepted range for `max_retries`.
pub const MAX_RETRIES_RANGE: std::ops::RangeInclusive<u32> = 0..=10;
/// Accepted range for `timeout_seconds`.
pub const TIMEOUT_SECONDS_RANGE: std::ops::RangeInclusive<u64> = 5..=300;

// ── Top-level config ────────────────────────────────────────────

/// Top-level configuration loaded from TOML.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Model and transport settings.
    pub llm: LlmConfig,
    /// Sampling and batch behaviour.
    pub extraction: ExtractionConfig,
    /// Reference clock settings.
    pub clock: ClockConfig,
    /// Log level and optional file output.
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration with precedence: env vars > TOML file > defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path()?;
        let mut config = Self::load_from(&path)?;
        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Load from a TOML file only, no env overrides. Missing file ⇒ defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                tracing::debug!(path = %path.display(), "loading config from file");
                Self::from_toml(&contents)
                    .with_context(|| format!("failed to parse config at {}", path.display()))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                Ok(Self::default())
            }
            Err(e) => {
                Err(e).with_context(|| format!("failed to read config at {}", path.display()))
            }
        }
    }

    /// Parse a TOML string into config.
    ///
    /// # Errors
    ///
    /// Returns an error on malformed TOML or mistyped fields.
    pub fn from_toml(toml_str: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(toml_str).context("failed to parse config TOML")?;
        Ok(config)
    }

    /// Apply environment variable overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability.
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("TEXTCAL_MODEL") {
            self.llm.model = v;
        }
        if let Some(v) = env("TEXTCAL_MAX_RETRIES") {
            match v.parse() {
                Ok(n) => self.llm.max_retries = n,
                Err(_) => tracing::warn!(
                    var = "TEXTCAL_MAX_RETRIES",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("TEXTCAL_TIMEOUT_SECS") {
            match v.parse() {
                Ok(n) => self.llm.timeout_seconds = n,
                Err(_) => tracing::warn!(
                    var = "TEXTCAL_TIMEOUT_SECS",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
        if let Some(v) = env("TEXTCAL_TIMEZONE") {
            self.clock.timezone = Some(v);
        }
        if let Some(v) = env("TEXTCAL_LOG_LEVEL") {
            self.logging.level = v;
        }
    }

    /// Build the immutable settings snapshot for the extraction pipeline.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Configuration`] when no API key is available
    /// for the configured provider or a value is out of range.
    pub fn settings(&self, credentials: &Credentials) -> Result<ExtractionSettings, ExtractionError> {
        self.settings_with(credentials, |key| std::env::var(key).ok())
    }

    /// Build the settings snapshot using a custom env resolver (for testing).
    ///
    /// # Errors
    ///
    /// Same as [`Config::settings`].
    pub fn settings_with(
        &self,
        credentials: &Credentials,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<ExtractionSettings, ExtractionError> {
        let parsed = parse_model_spec(&self.llm.model)
            .map_err(|e| ExtractionError::Configuration(e.to_string()))?;
        let api_key = credentials
            .api_key_with(&parsed.provider, env)
            .unwrap_or_else(|| ApiKey::new(""));

        let mut settings = ExtractionSettings::new(
            api_key,
            &self.llm.model,
            self.llm.max_retries,
            self.llm.timeout_seconds,
        )?
        .with_batch_policy(self.extraction.batch_policy)
        .with_call_parameters(
            ExtractionMode::Single,
            CallParameters {
                temperature: self.extraction.single_temperature,
                max_output_tokens: self.extraction.single_max_output_tokens,
            },
        )
        .with_call_parameters(
            ExtractionMode::Multiple,
            CallParameters {
                temperature: self.extraction.multiple_temperature,
                max_output_tokens: self.extraction.multiple_max_output_tokens,
            },
        );
        if let Some(url) = &self.llm.base_url {
            settings = settings.with_base_url(url.clone());
        }
        Ok(settings)
    }
}

// ── Sections ────────────────────────────────────────────────────

/// Model and transport settings (`[llm]`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LlmConfig {
    /// `provider/model`, or a bare model name for OpenAI.
    pub model: String,
    /// Endpoint override for OpenAI-compatible servers.
    pub base_url: Option<String>,
    /// Retries after the first attempt (0–10).
    pub max_retries: u32,
    /// Per-attempt timeout in seconds (5–300).
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_owned(),
            base_url: None,
            max_retries: 3,
            timeout_seconds: 30,
        }
    }
}

/// Sampling and batch behaviour (`[extraction]`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Temperature for single-event calls.
    pub single_temperature: f32,
    /// Temperature for multi-event calls.
    pub multiple_temperature: f32,
    /// Output token cap for single-event calls.
    pub single_max_output_tokens: u32,
    /// Output token cap for multi-event calls.
    pub multiple_max_output_tokens: u32,
    /// How invalid records affect their siblings.
    pub batch_policy: BatchPolicy,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let single = CallParameters::default_for(ExtractionMode::Single);
        let multiple = CallParameters::default_for(ExtractionMode::Multiple);
        Self {
            single_temperature: single.temperature,
            multiple_temperature: multiple.temperature,
            single_max_output_tokens: single.max_output_tokens,
            multiple_max_output_tokens: multiple.max_output_tokens,
            batch_policy: BatchPolicy::default(),
        }
    }
}

/// Reference clock settings (`[clock]`).
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ClockConfig {
    /// IANA timezone name; host local time when unset.
    pub timezone: Option<String>,
}

/// Logging settings (`[logging]`).
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub level: String,
    /// Directory for daily-rotated JSON logs.
    pub file_dir: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            file_dir: None,
        }
    }
}

// ── Settings snapshot ───────────────────────────────────────────

/// Whether one invalid record blocks the rest of a multi-event batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Keep valid records, report invalid ones separately.
    #[default]
    Partial,
    /// Withhold every record if any candidate is invalid.
    AllOrNothing,
}

/// Sampling parameters for one extraction mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallParameters {
    /// Sampling temperature.
    pub temperature: f32,
    /// Output token cap.
    pub max_output_tokens: u32,
}

impl CallParameters {
    /// Defaults: low temperature for single-event precision, higher for
    /// multi-event recall.
    pub fn default_for(mode: ExtractionMode) -> Self {
        match mode {
            ExtractionMode::Single => Self {
                temperature: 0.1,
                max_output_tokens: 500,
            },
            ExtractionMode::Multiple => Self {
                temperature: 0.3,
                max_output_tokens: 2000,
            },
        }
    }
}

/// Immutable per-call settings for the extraction pipeline.
///
/// Cloned into each extractor; changes to the source config after
/// construction never reach an in-flight call.
#[derive(Debug, Clone)]
pub struct ExtractionSettings {
    api_key: ApiKey,
    model: String,
    max_retries: u32,
    timeout_seconds: u64,
    base_url: Option<String>,
    single: CallParameters,
    multiple: CallParameters,
    batch_policy: BatchPolicy,
}

impl ExtractionSettings {
    /// Validate and capture the settings.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Configuration`] if the API key or model is
    /// blank, `max_retries` is outside 0–10 or `timeout_seconds` outside 5–300.
    pub fn new(
        api_key: ApiKey,
        model: &str,
        max_retries: u32,
        timeout_seconds: u64,
    ) -> Result<Self, ExtractionError> {
        if api_key.is_blank() {
            return Err(ExtractionError::Configuration(
                "API key is missing".to_owned(),
            ));
        }
        if model.trim().is_empty() {
            return Err(ExtractionError::Configuration(
                "model name is missing".to_owned(),
            ));
        }
        if !MAX_RETRIES_RANGE.contains(&max_retries) {
            return Err(ExtractionError::Configuration(format!(
                "max_retries must be between {} and {}, got {max_retries}",
                MAX_RETRIES_RANGE.start(),
                MAX_RETRIES_RANGE.end()
            )));
        }
        if !TIMEOUT_SECONDS_RANGE.contains(&timeout_seconds) {
            return Err(ExtractionError::Configuration(format!(
                "timeout_seconds must be between {} and {}, got {timeout_seconds}",
                TIMEOUT_SECONDS_RANGE.start(),
                TIMEOUT_SECONDS_RANGE.end()
            )));
        }
        Ok(Self {
            api_key,
            model: model.trim().to_owned(),
            max_retries,
            timeout_seconds,
            base_url: None,
            single: CallParameters::default_for(ExtractionMode::Single),
            multiple: CallParameters::default_for(ExtractionMode::Multiple),
            batch_policy: BatchPolicy::default(),
        })
    }

    /// Point the provider at a different endpoint.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set the batch policy for multi-event calls.
    pub fn with_batch_policy(mut self, policy: BatchPolicy) -> Self {
        self.batch_policy = policy;
        self
    }

    /// Override sampling parameters for one mode.
    pub fn with_call_parameters(mut self, mode: ExtractionMode, params: CallParameters) -> Self {
        match mode {
            ExtractionMode::Single => self.single = params,
            ExtractionMode::Multiple => self.multiple = params,
        }
        self
    }

    /// Provider API key.
    pub fn api_key(&self) -> &ApiKey {
        &self.api_key
    }

    /// Model spec as configured.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Retries after the first attempt.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Per-attempt timeout in seconds.
    pub fn timeout_seconds(&self) -> u64 {
        self.timeout_seconds
    }

    /// Endpoint override, if any.
    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    /// Batch policy for multi-event calls.
    pub fn batch_policy(&self) -> BatchPolicy {
        self.batch_policy
    }

    /// Sampling parameters for a mode.
    pub fn call_parameters(&self, mode: ExtractionMode) -> CallParameters {
        match mode {
            ExtractionMode::Single => self.single,
            ExtractionMode::Multiple => self.multiple,
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────

/// Resolve the config directory (`~/.textcal/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".textcal"))
}

/// Resolve the config file path: `$TEXTCAL_CONFIG_PATH` or `~/.textcal/config.toml`.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_path() -> anyhow::Result<PathBuf> {
    config_path_with(|key| std::env::var(key).ok())
}

/// Resolve the config path using a custom env resolver (for testing).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_path_with(env: impl Fn(&str) -> Option<String>) -> anyhow::Result<PathBuf> {
    if let Some(p) = env("TEXTCAL_CONFIG_PATH") {
        return Ok(PathBuf::from(p));
    }
    Ok(config_dir()?.join("config.toml"))
}

/// Path of the credentials `.env` file (`~/.textcal/.env`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn env_file_path() -> anyhow::Result<PathBuf> {
    Ok(config_dir()?.join(".env"))
}

// ── Tests ───────────────────────────────────────────────────────
