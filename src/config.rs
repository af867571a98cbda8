//! Config file loading
//!
//! Settings live in `{CONVTREE_HOME}/config.toml`, defaulting to
//! `~/.convtree/config.toml`. Every key is optional; missing keys keep the
//! built-in defaults and command-line flags are applied on top.
//!
//! ```toml
//! window_size = 5
//! provider = "openai"
//! model = "gpt-4o-mini"
//! base_url = "https://api.openai.com/v1"
//! api_key_env = "OPENAI_API_KEY"
//! max_tokens = 1024
//! temperature = 0.7
//! ```

use crate::{ConvTreeConfig, ConvTreeError, Provider, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Environment variable overriding the config directory
pub const HOME_ENV: &str = "CONVTREE_HOME";

/// Raw shape of config.toml
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigToml {
    window_size: Option<usize>,
    provider: Option<Provider>,
    model: Option<String>,
    base_url: Option<String>,
    api_key_env: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

/// Resolve the config directory: `$CONVTREE_HOME`, else `~/.convtree`
pub fn convtree_home() -> Result<PathBuf> {
    if let Ok(home) = std::env::var(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }

    let home = dirs::home_dir()
        .ok_or_else(|| ConvTreeError::Config("could not find home directory".to_string()))?;
    Ok(home.join(".convtree"))
}

/// Path of the config file inside a config directory
pub fn config_path(home: &Path) -> PathBuf {
    home.join("config.toml")
}

/// Parse config.toml content on top of the defaults
pub fn parse_config(content: &str) -> Result<ConvTreeConfig> {
    let raw: ConfigToml = toml::from_str(content)?;
    let mut config = ConvTreeConfig::default();

    if let Some(window_size) = raw.window_size {
        config.window_size = window_size;
    }
    if let Some(provider) = raw.provider {
        config.provider = provider;
    }
    if let Some(model) = raw.model {
        config.model = model;
    }
    if let Some(base_url) = raw.base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }
    if let Some(api_key_env) = raw.api_key_env {
        config.api_key_env = api_key_env;
    }
    if let Some(max_tokens) = raw.max_tokens {
        config.max_tokens = max_tokens;
    }
    if let Some(temperature) = raw.temperature {
        config.temperature = temperature;
    }

    config.validate()?;
    Ok(config)
}

/// Load the config file at `path`, or the defaults when it does not exist
pub async fn load_config(path: &Path) -> Result<ConvTreeConfig> {
    if !path.exists() {
        debug!("No config file at {:?}, using defaults", path);
        return Ok(ConvTreeConfig::default());
    }
    read_config(path).await
}

/// Load a config file the user named explicitly; a missing file is an error
pub async fn load_config_file(path: &Path) -> Result<ConvTreeConfig> {
    if !path.exists() {
        return Err(ConvTreeError::Config(format!(
            "config file not found: {}",
            path.display()
        )));
    }
    read_config(path).await
}

async fn read_config(path: &Path) -> Result<ConvTreeConfig> {
    let content = tokio::fs::read_to_string(path).await?;
    let config = parse_config(&content)?;
    debug!("Loaded config from {:?}", path);
    Ok(config)
}
