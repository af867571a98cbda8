//! Slash commands for the interactive shell
//!
//! Lines starting with `/` are handled locally against the context tree;
//! everything else is sent to the generator.

use crate::context::{ContextTree, Node};
use crate::Result;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// List commands
    Help,
    /// Print the context block sent with the next prompt
    Context,
    /// Print the history window
    History,
    /// Print the root-to-current path
    Path,
    /// Print window occupancy and tree height
    Depth,
    /// Dump the history window as JSON
    Export,
    /// Forget the conversation
    Reset,
    /// Leave the shell
    Quit,
}

impl Command {
    pub fn all() -> &'static [Command] {
        &[
            Command::Help,
            Command::Context,
            Command::History,
            Command::Path,
            Command::Depth,
            Command::Export,
            Command::Reset,
            Command::Quit,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::Help => "help",
            Command::Context => "context",
            Command::History => "history",
            Command::Path => "path",
            Command::Depth => "depth",
            Command::Export => "export",
            Command::Reset => "reset",
            Command::Quit => "quit",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Command::Help => "show available commands",
            Command::Context => "show the context sent with the next question",
            Command::History => "list the turns in the history window",
            Command::Path => "show the turns from the first question to the latest",
            Command::Depth => "show window usage and tree height",
            Command::Export => "print the history window as JSON",
            Command::Reset => "start a new conversation",
            Command::Quit => "exit",
        }
    }

    pub fn matches(prefix: &str) -> Vec<Command> {
        let prefix = prefix.to_lowercase();
        Self::all()
            .iter()
            .filter(|cmd| cmd.name().starts_with(&prefix))
            .copied()
            .collect()
    }

    pub fn parse(name: &str) -> Option<Command> {
        let name = name.to_lowercase();
        match name.as_str() {
            "exit" | "q" => Some(Command::Quit),
            _ => Self::all().iter().find(|cmd| cmd.name() == name).copied(),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.name())
    }
}

/// Parsed input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedInput {
    Command(Command),
    Unknown(String),
    Message(String),
    Empty,
}

pub fn parse_input(input: &str) -> ParsedInput {
    let input = input.trim();
    if input.is_empty() {
        return ParsedInput::Empty;
    }

    if let Some(rest) = input.strip_prefix('/') {
        let name = rest.split_whitespace().next().unwrap_or("");
        return match Command::parse(name) {
            Some(cmd) => ParsedInput::Command(cmd),
            None => ParsedInput::Unknown(name.to_string()),
        };
    }

    ParsedInput::Message(input.to_string())
}

/// Render the output of a read-only command. `Reset` and `Quit` change
/// session state and are handled by the caller.
pub fn render(command: Command, tree: &ContextTree) -> Result<String> {
    let output = match command {
        Command::Help => Command::all()
            .iter()
            .map(|cmd| format!("{:<10} {}", cmd.to_string(), cmd.description()))
            .collect::<Vec<_>>()
            .join("\n"),
        Command::Context => {
            let context = tree.get_context();
            if context.is_empty() {
                "(no context yet)".to_string()
            } else {
                context
            }
        }
        Command::History => render_turns(&tree.get_history()),
        Command::Path => render_turns(&tree.get_path()),
        Command::Depth => format!(
            "{} | tree height {} | {} reachable",
            tree.usage(),
            tree.tree_height(),
            tree.reachable_count()
        ),
        Command::Export => serde_json::to_string_pretty(&tree.get_history())?,
        Command::Reset => "Conversation reset.".to_string(),
        Command::Quit => String::new(),
    };
    Ok(output)
}

fn render_turns(nodes: &[&Node]) -> String {
    if nodes.is_empty() {
        return "(no turns yet)".to_string();
    }
    nodes
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let prompt = node.prompt().unwrap_or("");
            match node.response() {
                Some(response) => format!("{}. [depth {}] {} -> {}", i + 1, node.depth(), prompt, response),
                None => format!("{}. [depth {}] {}", i + 1, node.depth(), prompt),
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}
