//! Application configuration for orderpack.
//!
//! User config lives at `~/.orderpack/orderpack.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{OrderpackError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "orderpack.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".orderpack";

// ---------------------------------------------------------------------------
// Config structs (matching orderpack.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Document store settings.
    #[serde(default)]
    pub store: StoreConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Front-end origin encoded into scan codes.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Default output directory for merged artifacts.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            origin: default_origin(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}
fn default_output_dir() -> String {
    ".".into()
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Base URL of the document store API.
    #[serde(default = "default_store_url")]
    pub base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            base_url: default_store_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_store_url() -> String {
    "http://localhost:8080/api".into()
}
fn default_timeout_secs() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Front-end origin for the scan code URL.
    pub origin: String,
    /// Document store base URL.
    pub store_url: Url,
    /// Per-request timeout in seconds for document fetches.
    pub timeout_secs: u64,
    /// Tool version string, recorded in logs.
    pub tool_version: String,
}

impl PipelineConfig {
    /// Build a runtime config from the loaded app config.
    pub fn from_app_config(config: &AppConfig, tool_version: &str) -> Result<Self> {
        let store_url = Url::parse(&config.store.base_url).map_err(|e| {
            OrderpackError::config(format!(
                "invalid store base URL '{}': {e}",
                config.store.base_url
            ))
        })?;

        Ok(Self {
            origin: config.defaults.origin.clone(),
            store_url,
            timeout_secs: config.store.timeout_secs,
            tool_version: tool_version.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.orderpack/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| OrderpackError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.orderpack/orderpack.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| OrderpackError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| OrderpackError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| OrderpackError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| OrderpackError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| OrderpackError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("origin"));
        assert!(toml_str.contains("base_url"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.origin, "http://localhost:8080");
        assert_eq!(parsed.store.timeout_secs, 30);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[store]
base_url = "https://werkstatt.example.com/api"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.store.base_url, "https://werkstatt.example.com/api");
        assert_eq!(config.store.timeout_secs, 30);
        assert_eq!(config.defaults.origin, "http://localhost:8080");
    }

    #[test]
    fn pipeline_config_from_app_config() {
        let app = AppConfig::default();
        let pipeline = PipelineConfig::from_app_config(&app, "0.1.0-test").expect("build");
        assert_eq!(pipeline.store_url.as_str(), "http://localhost:8080/api");
        assert_eq!(pipeline.tool_version, "0.1.0-test");
    }

    #[test]
    fn pipeline_config_rejects_bad_store_url() {
        let mut app = AppConfig::default();
        app.store.base_url = "not a url".into();
        let result = PipelineConfig::from_app_config(&app, "0.1.0");
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("store base URL"));
    }
}
