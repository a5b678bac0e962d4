//! Configuration management for gridopsd.
//!
//! Loads settings from a TOML file or uses defaults, then applies a small set
//! of environment overrides. The result is immutable for the process lifetime.

use anyhow::{Context, Result};
use gridops_shared::BackendTarget;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// System-wide config file path
pub const CONFIG_PATH: &str = "/etc/gridops/config.toml";

/// Working-directory fallback
pub const LOCAL_CONFIG_PATH: &str = "gridops.toml";

/// Environment variable naming an explicit config file
pub const CONFIG_ENV: &str = "GRIDOPS_CONFIG";

/// Environment variable carrying the remote API credential
pub const REMOTE_API_KEY_ENV: &str = "GRIDOPS_REMOTE_API_KEY";

pub const BIND_ENV: &str = "GRIDOPS_BIND";
pub const DB_PATH_ENV: &str = "GRIDOPS_DB_PATH";

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Outer deadline for one chat request. Covers three backend calls
    /// plus storage on the slowest target.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_request_timeout() -> u64 {
    960
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Language-model backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Same-host generate endpoint (Ollama)
    #[serde(default = "default_local_url")]
    pub local_url: String,

    #[serde(default = "default_local_model")]
    pub local_model: String,

    /// Long: first-load inference on a cold local model is slow
    #[serde(default = "default_local_timeout")]
    pub local_timeout_secs: u64,

    /// Hosted OpenAI-compatible chat completions endpoint
    #[serde(default = "default_remote_url")]
    pub remote_url: String,

    #[serde(default = "default_remote_model")]
    pub remote_model: String,

    /// Bearer credential. Prefer the environment override over the file.
    #[serde(default)]
    pub remote_api_key: String,

    #[serde(default = "default_remote_timeout")]
    pub remote_timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Completion cap for the remote provider
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_local_url() -> String {
    "http://127.0.0.1:11434/api/generate".to_string()
}

fn default_local_model() -> String {
    "gemma3:12b".to_string()
}

fn default_local_timeout() -> u64 {
    300
}

fn default_remote_url() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_remote_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_remote_timeout() -> u64 {
    30
}

fn default_temperature() -> f32 {
    0.1
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            local_url: default_local_url(),
            local_model: default_local_model(),
            local_timeout_secs: default_local_timeout(),
            remote_url: default_remote_url(),
            remote_model: default_remote_model(),
            remote_api_key: String::new(),
            remote_timeout_secs: default_remote_timeout(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl BackendConfig {
    pub fn timeout_for(&self, target: BackendTarget) -> Duration {
        match target {
            BackendTarget::Local => Duration::from_secs(self.local_timeout_secs),
            BackendTarget::Remote => Duration::from_secs(self.remote_timeout_secs),
        }
    }

    pub fn has_remote_credential(&self) -> bool {
        !self.remote_api_key.trim().is_empty()
    }
}

/// Relational storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    #[serde(default = "default_storage_timeout")]
    pub timeout_secs: u64,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("data/data.db")
}

fn default_storage_timeout() -> u64 {
    10
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            timeout_secs: default_storage_timeout(),
        }
    }
}

impl StorageConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Trained forecasting artifacts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    #[serde(default = "default_model_path")]
    pub model_path: PathBuf,

    #[serde(default = "default_scaler_path")]
    pub scaler_path: PathBuf,
}

fn default_model_path() -> PathBuf {
    PathBuf::from("models/revenue_model.json")
}

fn default_scaler_path() -> PathBuf {
    PathBuf::from("models/scaler.json")
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            model_path: default_model_path(),
            scaler_path: default_scaler_path(),
        }
    }
}

/// Insight analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Rows of the result table shown to the backend (capped at 5)
    #[serde(default = "default_sample_rows")]
    pub sample_rows: usize,
}

fn default_sample_rows() -> usize {
    5
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sample_rows: default_sample_rows(),
        }
    }
}

impl AnalysisConfig {
    pub fn effective_sample_rows(&self) -> usize {
        self.sample_rows.clamp(1, 5)
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub backend: BackendConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub forecast: ForecastConfig,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

impl Config {
    /// Load config from file, or return defaults, then apply env overrides
    pub fn load() -> Self {
        let mut config = Self::load_file().unwrap_or_else(|e| {
            warn!("Config not found, using defaults: {}", e);
            Config::default()
        });
        config.apply_overrides(|key| std::env::var(key).ok());
        config
    }

    fn load_file() -> Result<Self> {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            return Self::load_from_path(&path);
        }
        Self::load_from_path(CONFIG_PATH).or_else(|_| Self::load_from_path(LOCAL_CONFIG_PATH))
    }

    /// Load config from specific path
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        let config: Config =
            toml::from_str(&content).with_context(|| format!("parsing {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply overrides from a key lookup (the process environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = lookup(REMOTE_API_KEY_ENV).filter(|k| !k.trim().is_empty()) {
            self.backend.remote_api_key = key;
        }
        if let Some(bind) = lookup(BIND_ENV).filter(|b| !b.trim().is_empty()) {
            self.server.bind = bind;
        }
        if let Some(path) = lookup(DB_PATH_ENV).filter(|p| !p.trim().is_empty()) {
            self.storage.db_path = PathBuf::from(path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.backend.local_model, "gemma3:12b");
        assert_eq!(config.backend.local_timeout_secs, 300);
        assert_eq!(config.backend.remote_timeout_secs, 30);
        assert_eq!(config.analysis.sample_rows, 5);
        assert!(!config.backend.has_remote_credential());
    }

    #[test]
    fn test_timeout_for_target() {
        let backend = BackendConfig::default();
        assert_eq!(
            backend.timeout_for(BackendTarget::Local),
            Duration::from_secs(300)
        );
        assert_eq!(
            backend.timeout_for(BackendTarget::Remote),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_parse_toml_partial() {
        let toml_str = r#"
[backend]
local_model = "qwen2.5-coder"
remote_timeout_secs = 12

[storage]
db_path = "/tmp/grid.db"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.local_model, "qwen2.5-coder");
        assert_eq!(config.backend.remote_timeout_secs, 12);
        assert_eq!(config.storage.db_path, PathBuf::from("/tmp/grid.db"));
        // Defaults for missing fields
        assert_eq!(config.backend.local_timeout_secs, 300);
        assert_eq!(config.forecast.model_path, PathBuf::from("models/revenue_model.json"));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            (REMOTE_API_KEY_ENV, "gsk_test"),
            (BIND_ENV, "0.0.0.0:9000"),
            (DB_PATH_ENV, ""),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.backend.remote_api_key, "gsk_test");
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        // Blank override is ignored
        assert_eq!(config.storage.db_path, PathBuf::from("data/data.db"));
    }

    #[test]
    fn test_sample_rows_capped() {
        let analysis = AnalysisConfig { sample_rows: 50 };
        assert_eq!(analysis.effective_sample_rows(), 5);
        let analysis = AnalysisConfig { sample_rows: 0 };
        assert_eq!(analysis.effective_sample_rows(), 1);
    }

    #[test]
    fn test_load_from_missing_path_fails() {
        assert!(Config::load_from_path("/nonexistent/gridops.toml").is_err());
    }
}
