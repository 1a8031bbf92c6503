//! Directory flow configuration
//!
//! Loads from `~/.config/prospect/directory_flow.toml` (or the path in
//! `PROSPECT_FLOW_CONFIG`). A missing file means defaults.

use crate::errors::{FlowError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Deserialize, Clone)]
pub struct FlowConfig {
    /// Quiet window before a form edit is acted on
    #[serde(default = "default_form_debounce_ms")]
    pub form_debounce_ms: u64,

    /// Quiet window before an assembled payload is published
    #[serde(default = "default_assembly_debounce_ms")]
    pub assembly_debounce_ms: u64,

    /// Buffered final payloads per subscriber before it starts lagging
    #[serde(default = "default_payload_channel_capacity")]
    pub payload_channel_capacity: usize,

    #[serde(default)]
    pub lookup: LookupConfig,
}

fn default_form_debounce_ms() -> u64 {
    500
}

fn default_assembly_debounce_ms() -> u64 {
    300
}

fn default_payload_channel_capacity() -> usize {
    16
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            form_debounce_ms: default_form_debounce_ms(),
            assembly_debounce_ms: default_assembly_debounce_ms(),
            payload_channel_capacity: default_payload_channel_capacity(),
            lookup: LookupConfig::default(),
        }
    }
}

/// Additional-details lookup service settings
#[derive(Debug, Deserialize, Clone)]
pub struct LookupConfig {
    /// Service base URL; the HTTP lookup is unavailable without it
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_lookup_path")]
    pub path: String,

    /// Bearer token sent with each lookup
    #[serde(default)]
    pub api_token: Option<String>,
}

fn default_lookup_path() -> String {
    "additional-details".to_string()
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            path: default_lookup_path(),
            api_token: None,
        }
    }
}

impl FlowConfig {
    pub const ENV_CONFIG_PATH: &'static str = "PROSPECT_FLOW_CONFIG";
    pub const ENV_LOOKUP_TOKEN: &'static str = "PROSPECT_LOOKUP_TOKEN";
    pub const DEFAULT_CONFIG_FILENAME: &'static str = "directory_flow.toml";

    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let path = Self::resolve_config_path();

        let cfg = if path.exists() {
            Self::load_from_path(&path)?
        } else {
            tracing::info!(
                path = %path.display(),
                "directory flow config not found, using defaults"
            );
            Self::default()
        };

        Ok(cfg.with_env_token(std::env::var(Self::ENV_LOOKUP_TOKEN).ok()))
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            FlowError::config_with_source(
                format!("failed to read config at {}", path.display()),
                e,
            )
        })?;

        Self::parse(&contents)
    }

    /// Parse configuration from TOML string
    pub fn parse(contents: &str) -> Result<Self> {
        let cfg: FlowConfig = toml::from_str(contents)
            .map_err(|e| FlowError::config_with_source("failed to parse config", e))?;

        cfg.validate()?;
        Ok(cfg)
    }

    /// Fill in the lookup token from the environment unless the file set one.
    pub fn with_env_token(mut self, token: Option<String>) -> Self {
        if self.lookup.api_token.is_none() {
            self.lookup.api_token = token.filter(|t| !t.is_empty());
        }
        self
    }

    fn resolve_config_path() -> PathBuf {
        if let Ok(path) = std::env::var(Self::ENV_CONFIG_PATH) {
            return PathBuf::from(path);
        }

        dirs::home_dir()
            .map(|h| {
                h.join(".config")
                    .join("prospect")
                    .join(Self::DEFAULT_CONFIG_FILENAME)
            })
            .unwrap_or_else(|| PathBuf::from(Self::DEFAULT_CONFIG_FILENAME))
    }

    fn validate(&self) -> Result<()> {
        if self.payload_channel_capacity == 0 {
            return Err(FlowError::config(
                "payload_channel_capacity must be greater than zero",
            ));
        }

        if let Some(base_url) = &self.lookup.base_url
            && !(base_url.starts_with("http://") || base_url.starts_with("https://"))
        {
            return Err(FlowError::config(format!(
                "lookup.base_url must be an http(s) URL, got {base_url}"
            )));
        }

        if self.form_debounce_ms == 0 {
            tracing::warn!("form_debounce_ms is 0, every edit will trigger a lookup");
        }

        Ok(())
    }

    pub fn form_debounce(&self) -> Duration {
        Duration::from_millis(self.form_debounce_ms)
    }

    pub fn assembly_debounce(&self) -> Duration {
        Duration::from_millis(self.assembly_debounce_ms)
    }
}
