//! Chat session - one context tree per conversation
//!
//! The session is the only writer of its tree. A server handling several
//! learners keeps one session per connection rather than sharing a tree.

use crate::context::{ContextTree, Node, WindowUsage};
use crate::generator::Generator;
use crate::Result;
use tracing::{debug, info};

const CONTEXT_HEADER: &str = "Previous conversation:";
const QUESTION_HEADER: &str = "Current question:";

/// Build the outbound prompt from a context block and the new input
pub fn compose_prompt(context: &str, input: &str) -> String {
    if context.is_empty() {
        return input.to_string();
    }
    format!("{CONTEXT_HEADER}\n{context}\n\n{QUESTION_HEADER}\n{input}")
}

/// A conversation between a learner and a text generator
#[derive(Debug)]
pub struct ChatSession<G> {
    tree: ContextTree,
    generator: G,
}

impl<G: Generator> ChatSession<G> {
    pub fn new(generator: G, window_size: usize) -> Self {
        info!(
            "Starting chat session with {} generator, window size {}",
            generator.name(),
            window_size
        );
        Self {
            tree: ContextTree::new(window_size),
            generator,
        }
    }

    /// Send `input` with the current context and record the turn.
    ///
    /// The tree is only touched once the generator has answered, so a
    /// failed call leaves the conversation as it was.
    pub async fn ask(&mut self, input: &str) -> Result<String> {
        let prompt = compose_prompt(&self.tree.get_context(), input);
        debug!("Outbound prompt length: {}", prompt.len());

        let response = self.generator.generate(&prompt).await?;
        self.tree.insert(input, Some(response.clone()));
        Ok(response)
    }

    /// Record a turn produced elsewhere without calling the generator
    pub fn record(&mut self, prompt: &str, response: Option<String>) -> &Node {
        self.tree.insert(prompt, response)
    }

    pub fn reset(&mut self) {
        info!("Resetting conversation ({} turns dropped)", self.tree.current_depth());
        self.tree.reset();
    }

    pub fn tree(&self) -> &ContextTree {
        &self.tree
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn usage(&self) -> WindowUsage {
        self.tree.usage()
    }
}
