// crates/pce-config/src/config.rs
// ============================================================================
// Module: PCE Configuration
// Description: Engine configuration with layered resolution and validation.
// Purpose: Resolve every field as environment > JSON config file > default.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Configuration is resolved per field: a `PCE_*` environment variable wins
//! over the JSON config file, which wins over the built-in default. The
//! resolved configuration is validated before the engine boots; validation
//! failures name the offending field.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Environment variable naming an explicit config file path.
pub const CONFIG_ENV_VAR: &str = "PCE_CONFIG";
/// Default config file name probed in the working directory.
const DEFAULT_CONFIG_NAME: &str = "pce.json";

/// Default API port.
pub(crate) const DEFAULT_API_PORT: u16 = 8900;
/// Default state database path.
pub(crate) const DEFAULT_STATE_DB_PATH: &str = "pce_state.db";
/// Default OpenRouter model.
pub(crate) const DEFAULT_OPENROUTER_MODEL: &str = "openrouter/auto";
/// Default OpenRouter base URL.
pub(crate) const DEFAULT_OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";
/// Default LLM reply deadline in seconds.
pub(crate) const DEFAULT_OPENROUTER_TIMEOUT_S: u64 = 12;
/// Default coherence window.
pub(crate) const DEFAULT_CCI_WINDOW: usize = 50;
/// Default approval TTL in seconds (24 hours).
pub(crate) const DEFAULT_APPROVAL_TTL_SECONDS: u64 = 24 * 60 * 60;
/// Default sweeper interval in seconds.
pub(crate) const DEFAULT_SWEEP_INTERVAL_S: u64 = 60;
/// Default assistant value floor.
pub(crate) const DEFAULT_VALUE_FLOOR: f64 = 0.4;
/// Default assistant coherence floor.
pub(crate) const DEFAULT_CCI_FLOOR: f64 = 0.55;
/// Default starting exploration rate.
pub(crate) const DEFAULT_EPSILON_START: f64 = 1.0;
/// Default exploration floor.
pub(crate) const DEFAULT_EPSILON_MIN: f64 = 0.05;
/// Default multiplicative epsilon decay.
pub(crate) const DEFAULT_EPSILON_DECAY: f64 = 0.9995;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Resolved engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PceConfig {
    /// HTTP listen port.
    #[serde(default = "default_api_port")]
    pub api_port: u16,
    /// Path to the embedded state database.
    #[serde(default = "default_state_db_path")]
    pub state_db_path: PathBuf,
    /// LLM reply provider settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
    /// Coherence engine settings.
    #[serde(default)]
    pub cci: CciConfig,
    /// Approval gate settings.
    #[serde(default)]
    pub approvals: ApprovalsConfig,
    /// Assistant decision plugin settings.
    #[serde(default)]
    pub assistant: AssistantConfig,
}

impl Default for PceConfig {
    fn default() -> Self {
        Self {
            api_port: DEFAULT_API_PORT,
            state_db_path: PathBuf::from(DEFAULT_STATE_DB_PATH),
            openrouter: OpenRouterConfig::default(),
            cci: CciConfig::default(),
            approvals: ApprovalsConfig::default(),
            assistant: AssistantConfig::default(),
        }
    }
}

/// OpenRouter provider settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// API key; the reply provider is disabled when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model identifier.
    #[serde(default = "default_openrouter_model")]
    pub model: String,
    /// Chat completions base URL.
    #[serde(default = "default_openrouter_base_url")]
    pub base_url: String,
    /// Hard reply deadline in seconds.
    #[serde(default = "default_openrouter_timeout_s")]
    pub timeout_s: u64,
    /// Optional HTTP referer header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http_referer: Option<String>,
    /// Optional X-Title header.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x_title: Option<String>,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_OPENROUTER_MODEL.to_string(),
            base_url: DEFAULT_OPENROUTER_BASE_URL.to_string(),
            timeout_s: DEFAULT_OPENROUTER_TIMEOUT_S,
            http_referer: None,
            x_title: None,
        }
    }
}

/// Coherence engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CciConfig {
    /// Sliding window over completed actions.
    #[serde(default = "default_cci_window")]
    pub window: usize,
    /// Fixed component weights.
    #[serde(default)]
    pub weights: CciWeightsConfig,
}

impl Default for CciConfig {
    fn default() -> Self {
        Self { window: DEFAULT_CCI_WINDOW, weights: CciWeightsConfig::default() }
    }
}

/// Coherence component weights.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CciWeightsConfig {
    /// Weight of the consistency component.
    pub consistency: f64,
    /// Weight of the stability component.
    pub stability: f64,
    /// Weight of the inverted contradiction rate.
    pub contradiction: f64,
    /// Weight of the predictive accuracy component.
    pub predictive: f64,
}

impl Default for CciWeightsConfig {
    fn default() -> Self {
        Self { consistency: 0.35, stability: 0.25, contradiction: 0.25, predictive: 0.15 }
    }
}

/// Approval gate settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalsConfig {
    /// Pending approval TTL in seconds.
    #[serde(default = "default_approval_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Sweeper interval in seconds.
    #[serde(default = "default_sweep_interval_s")]
    pub sweep_interval_s: u64,
}

impl Default for ApprovalsConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_APPROVAL_TTL_SECONDS,
            sweep_interval_s: DEFAULT_SWEEP_INTERVAL_S,
        }
    }
}

/// Assistant decision plugin settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AssistantConfig {
    /// Value score below which the safest profile is forced.
    #[serde(default = "default_value_floor")]
    pub value_floor: f64,
    /// Coherence index below which the safest profile is forced.
    #[serde(default = "default_cci_floor")]
    pub cci_floor: f64,
    /// Starting exploration rate.
    #[serde(default = "default_epsilon_start")]
    pub epsilon_start: f64,
    /// Exploration floor.
    #[serde(default = "default_epsilon_min")]
    pub epsilon_min: f64,
    /// Multiplicative epsilon decay per decision.
    #[serde(default = "default_epsilon_decay")]
    pub epsilon_decay: f64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            value_floor: DEFAULT_VALUE_FLOOR,
            cci_floor: DEFAULT_CCI_FLOOR,
            epsilon_start: DEFAULT_EPSILON_START,
            epsilon_min: DEFAULT_EPSILON_MIN,
            epsilon_decay: DEFAULT_EPSILON_DECAY,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("config read failed: {0}")]
    Read(String),
    /// Config file is not valid JSON for the expected shape.
    #[error("config parse failed: {0}")]
    Parse(String),
    /// An environment override could not be parsed.
    #[error("config env override invalid: {0}")]
    EnvOverride(String),
    /// A resolved field failed validation.
    #[error("config invalid: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Resolution
// ============================================================================

impl PceConfig {
    /// Loads configuration with per-field layered resolution.
    ///
    /// An explicit `path` must exist; otherwise the `PCE_CONFIG` environment
    /// variable is consulted, then the default file name, and finally the
    /// built-in defaults. Environment overrides are applied last and win.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read or parsed, an
    /// environment override is malformed, or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match resolve_file(path)? {
            Some(file_path) => {
                let raw = fs::read_to_string(&file_path)
                    .map_err(|err| ConfigError::Read(format!("{}: {err}", file_path.display())))?;
                serde_json::from_str(&raw)
                    .map_err(|err| ConfigError::Parse(format!("{}: {err}", file_path.display())))?
            }
            None => Self::default(),
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `PCE_*` environment overrides onto the resolved fields.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::EnvOverride`] when a variable fails to parse.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(port) = env_parsed::<u16>("PCE_API_PORT")? {
            self.api_port = port;
        }
        if let Some(path) = env_string("PCE_STATE_DB_PATH") {
            self.state_db_path = PathBuf::from(path);
        }
        if let Some(key) = env_string("PCE_OPENROUTER_API_KEY") {
            self.openrouter.api_key = Some(key);
        }
        if let Some(model) = env_string("PCE_OPENROUTER_MODEL") {
            self.openrouter.model = model;
        }
        if let Some(base_url) = env_string("PCE_OPENROUTER_BASE_URL") {
            self.openrouter.base_url = base_url;
        }
        if let Some(timeout) = env_parsed::<u64>("PCE_OPENROUTER_TIMEOUT_S")? {
            self.openrouter.timeout_s = timeout;
        }
        if let Some(referer) = env_string("PCE_OPENROUTER_HTTP_REFERER") {
            self.openrouter.http_referer = Some(referer);
        }
        if let Some(title) = env_string("PCE_OPENROUTER_X_TITLE") {
            self.openrouter.x_title = Some(title);
        }
        if let Some(window) = env_parsed::<usize>("PCE_CCI_WINDOW")? {
            self.cci.window = window;
        }
        if let Some(weights) = env_string("PCE_CCI_WEIGHTS") {
            self.cci.weights = parse_weights(&weights)?;
        }
        if let Some(ttl) = env_parsed::<u64>("PCE_APPROVALS_TTL_SECONDS")? {
            self.approvals.ttl_seconds = ttl;
        }
        if let Some(interval) = env_parsed::<u64>("PCE_APPROVALS_SWEEP_INTERVAL_S")? {
            self.approvals.sweep_interval_s = interval;
        }
        if let Some(floor) = env_parsed::<f64>("PCE_ASSISTANT_VALUE_FLOOR")? {
            self.assistant.value_floor = floor;
        }
        if let Some(floor) = env_parsed::<f64>("PCE_ASSISTANT_CCI_FLOOR")? {
            self.assistant.cci_floor = floor;
        }
        if let Some(start) = env_parsed::<f64>("PCE_ASSISTANT_EPSILON_START")? {
            self.assistant.epsilon_start = start;
        }
        if let Some(min) = env_parsed::<f64>("PCE_ASSISTANT_EPSILON_MIN")? {
            self.assistant.epsilon_min = min;
        }
        if let Some(decay) = env_parsed::<f64>("PCE_ASSISTANT_EPSILON_DECAY")? {
            self.assistant.epsilon_decay = decay;
        }
        Ok(())
    }

    /// Validates the resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_port == 0 {
            return Err(ConfigError::Invalid("api_port must be nonzero".to_string()));
        }
        if self.cci.window < 3 {
            return Err(ConfigError::Invalid("cci.window must be at least 3".to_string()));
        }
        let weights = self.cci.weights;
        let sum =
            weights.consistency + weights.stability + weights.contradiction + weights.predictive;
        if (sum - 1.0).abs() > 1e-6 {
            return Err(ConfigError::Invalid("cci.weights must sum to 1.0".to_string()));
        }
        if self.approvals.ttl_seconds == 0 {
            return Err(ConfigError::Invalid("approvals.ttl_seconds must be nonzero".to_string()));
        }
        if self.approvals.sweep_interval_s == 0 {
            return Err(ConfigError::Invalid(
                "approvals.sweep_interval_s must be nonzero".to_string(),
            ));
        }
        if self.openrouter.timeout_s == 0 {
            return Err(ConfigError::Invalid("openrouter.timeout_s must be nonzero".to_string()));
        }
        for (name, value) in [
            ("assistant.value_floor", self.assistant.value_floor),
            ("assistant.cci_floor", self.assistant.cci_floor),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Invalid(format!("{name} must be within [0, 1]")));
            }
        }
        if !(0.0..=1.0).contains(&self.assistant.epsilon_min)
            || !(0.0..=1.0).contains(&self.assistant.epsilon_start)
            || self.assistant.epsilon_min > self.assistant.epsilon_start
        {
            return Err(ConfigError::Invalid(
                "assistant epsilon bounds must satisfy 0 <= min <= start <= 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.assistant.epsilon_decay) {
            return Err(ConfigError::Invalid(
                "assistant.epsilon_decay must be within [0, 1]".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns the default API port.
const fn default_api_port() -> u16 {
    DEFAULT_API_PORT
}

/// Returns the default state database path.
fn default_state_db_path() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_DB_PATH)
}

/// Returns the default OpenRouter model.
fn default_openrouter_model() -> String {
    DEFAULT_OPENROUTER_MODEL.to_string()
}

/// Returns the default OpenRouter base URL.
fn default_openrouter_base_url() -> String {
    DEFAULT_OPENROUTER_BASE_URL.to_string()
}

/// Returns the default LLM reply deadline in seconds.
const fn default_openrouter_timeout_s() -> u64 {
    DEFAULT_OPENROUTER_TIMEOUT_S
}

/// Returns the default coherence window.
const fn default_cci_window() -> usize {
    DEFAULT_CCI_WINDOW
}

/// Returns the default approval TTL in seconds.
const fn default_approval_ttl_seconds() -> u64 {
    DEFAULT_APPROVAL_TTL_SECONDS
}

/// Returns the default sweeper interval in seconds.
const fn default_sweep_interval_s() -> u64 {
    DEFAULT_SWEEP_INTERVAL_S
}

/// Returns the default assistant value floor.
const fn default_value_floor() -> f64 {
    DEFAULT_VALUE_FLOOR
}

/// Returns the default assistant coherence floor.
const fn default_cci_floor() -> f64 {
    DEFAULT_CCI_FLOOR
}

/// Returns the default starting exploration rate.
const fn default_epsilon_start() -> f64 {
    DEFAULT_EPSILON_START
}

/// Returns the default exploration floor.
const fn default_epsilon_min() -> f64 {
    DEFAULT_EPSILON_MIN
}

/// Returns the default multiplicative epsilon decay.
const fn default_epsilon_decay() -> f64 {
    DEFAULT_EPSILON_DECAY
}

/// Resolves the config file path: explicit > `PCE_CONFIG` > default name.
fn resolve_file(path: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(explicit) = path {
        if !explicit.exists() {
            return Err(ConfigError::Read(format!(
                "config file not found: {}",
                explicit.display()
            )));
        }
        return Ok(Some(explicit.to_path_buf()));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(env_path);
        if !candidate.exists() {
            return Err(ConfigError::Read(format!(
                "config file not found: {}",
                candidate.display()
            )));
        }
        return Ok(Some(candidate));
    }
    let default = PathBuf::from(DEFAULT_CONFIG_NAME);
    if default.exists() { Ok(Some(default)) } else { Ok(None) }
}

/// Reads a non-empty environment string.
fn env_string(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}

/// Reads and parses an environment value.
fn env_parsed<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match env_string(name) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::EnvOverride(format!("{name}={raw}"))),
        None => Ok(None),
    }
}

/// Parses `consistency,stability,contradiction,predictive` weights.
fn parse_weights(raw: &str) -> Result<CciWeightsConfig, ConfigError> {
    let parts: Vec<f64> =
        raw.split(',').map(|part| part.trim().parse::<f64>()).collect::<Result<_, _>>().map_err(
            |_| ConfigError::EnvOverride(format!("PCE_CCI_WEIGHTS={raw}")),
        )?;
    if parts.len() != 4 {
        return Err(ConfigError::EnvOverride(format!("PCE_CCI_WEIGHTS={raw}")));
    }
    Ok(CciWeightsConfig {
        consistency: parts[0],
        stability: parts[1],
        contradiction: parts[2],
        predictive: parts[3],
    })
}
