use crate::error::{GatewayError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_ENDPOINT: &str = "https://api.together.xyz/v1/completions";
pub const DEFAULT_MODEL: &str = "meta-llama/Llama-3-8b-chat-hf";
pub const DEFAULT_MAX_TOKENS: i64 = 512;
pub const DEFAULT_TEMPERATURE: f64 = 0.1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub defaults: GenerationDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Values substituted for empty or zero fields of an inbound request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationDefaults {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_port() -> u16 {
    8080
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_api_key_env() -> String {
    "TOGETHER_API_KEY".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_max_tokens() -> i64 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            upstream: UpstreamConfig::default(),
            defaults: GenerationDefaults::default(),
        }
    }
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key_env: default_api_key_env(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for GenerationDefaults {
    fn default() -> Self {
        Self {
            model: default_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

impl GatewayConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file, falling back to built-in defaults.
    /// Priority: CLI arg > CWD > XDG config > home dir
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::debug!("No config file found, using built-in defaults");
        Ok(Self::default())
    }

    /// Apply a `PORT`-style override. Unparseable values are ignored with a warning.
    pub fn apply_port_override(&mut self, value: Option<&str>) {
        let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
            return;
        };
        match raw.parse::<u16>() {
            Ok(port) => self.port = port,
            Err(_) => tracing::warn!(value = raw, "Ignoring invalid PORT value"),
        }
    }

    /// Read the provider credential from the configured environment variable.
    /// Empty values count as unset.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.upstream.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    paths.push(PathBuf::from("completion-gateway.toml"));

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(
            PathBuf::from(xdg)
                .join("completion-gateway")
                .join("config.toml"),
        );
    }
    if let Some(home) = home_dir() {
        paths.push(
            home.join(".config")
                .join("completion-gateway")
                .join("config.toml"),
        );
        paths.push(home.join(".completion-gateway.toml"));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
