//! Convtree - conversation context for AI tutoring sessions
//!
//! Keeps a bounded record of a multi-turn dialogue between a learner and
//! an AI assistant:
//! - A binary context tree that caps how much history is retained
//! - Context reconstruction to prepend to each follow-up prompt
//! - A chat session that drives a pluggable text generator

pub mod commands;
pub mod config;
pub mod context;
pub mod generator;
pub mod session;

pub use context::{ContextTree, Node, NodeContent, NodeId, NodeKind, WindowUsage};
pub use generator::{EchoGenerator, Generator, OpenAiGenerator};
pub use session::ChatSession;

use context::DEFAULT_WINDOW_SIZE;
use std::fmt;
use std::str::FromStr;

/// Default model for the OpenAI-compatible generator
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Default base URL for the OpenAI-compatible generator
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Default environment variable holding the API key
pub const DEFAULT_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Which text generator answers prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Offline generator that echoes the question back
    #[default]
    Echo,
    /// OpenAI-compatible Chat Completions endpoint
    OpenAi,
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Echo => write!(f, "echo"),
            Provider::OpenAi => write!(f, "openai"),
        }
    }
}

impl FromStr for Provider {
    type Err = ConvTreeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "echo" => Ok(Provider::Echo),
            "openai" => Ok(Provider::OpenAi),
            other => Err(ConvTreeError::Config(format!("unknown provider: {other}"))),
        }
    }
}

/// Configuration for Convtree
#[derive(Debug, Clone, PartialEq)]
pub struct ConvTreeConfig {
    /// Capacity of the history window
    pub window_size: usize,

    /// Text generator to use
    pub provider: Provider,

    /// Model name sent to the generator
    pub model: String,

    /// Base URL of the Chat Completions API
    pub base_url: String,

    /// Environment variable the API key is read from
    pub api_key_env: String,

    /// Response length cap per request
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,
}

impl Default for ConvTreeConfig {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_WINDOW_SIZE,
            provider: Provider::default(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            max_tokens: 1024,
            temperature: 0.7,
        }
    }
}

impl ConvTreeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_provider(mut self, provider: Provider) -> Self {
        self.provider = provider;
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Reject values the session cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.window_size == 0 {
            return Err(ConvTreeError::Config(
                "window_size must be at least 1".to_string(),
            ));
        }
        if self.provider == Provider::OpenAi && self.model.trim().is_empty() {
            return Err(ConvTreeError::Config("model must not be empty".to_string()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConvTreeError::Config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        Ok(())
    }
}

/// Result type for Convtree operations
pub type Result<T> = std::result::Result<T, ConvTreeError>;

/// Errors that can occur in Convtree
#[derive(Debug, thiserror::Error)]
pub enum ConvTreeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
}
