//! Text generation backends
//!
//! The context tree only ever sees the generator's output string. Anything
//! that turns a prompt into a response can sit behind [`Generator`].

mod openai;

pub use openai::OpenAiGenerator;

use crate::{ConvTreeConfig, Provider, Result};
use std::future::Future;

/// Opaque prompt-in, response-out text generation service
pub trait Generator {
    /// Produce a response for a fully composed prompt
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;

    /// Short name for logs and status lines
    fn name(&self) -> &str;
}

/// Offline generator that answers with the last line of the prompt
#[derive(Debug, Clone, Default)]
pub struct EchoGenerator;

impl EchoGenerator {
    pub fn new() -> Self {
        Self
    }
}

impl Generator for EchoGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let question = prompt
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .unwrap_or("");
        Ok(format!("Echo: {question}"))
    }

    fn name(&self) -> &str {
        "echo"
    }
}

/// Generator selected at runtime from configuration
#[derive(Debug)]
pub enum AnyGenerator {
    Echo(EchoGenerator),
    OpenAi(OpenAiGenerator),
}

impl AnyGenerator {
    pub fn from_config(config: &ConvTreeConfig) -> Result<Self> {
        match config.provider {
            Provider::Echo => Ok(Self::Echo(EchoGenerator::new())),
            Provider::OpenAi => Ok(Self::OpenAi(OpenAiGenerator::new(config)?)),
        }
    }
}

impl Generator for AnyGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        match self {
            Self::Echo(generator) => generator.generate(prompt).await,
            Self::OpenAi(generator) => generator.generate(prompt).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Self::Echo(generator) => generator.name(),
            Self::OpenAi(generator) => generator.name(),
        }
    }
}
