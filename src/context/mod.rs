//! Conversation context module
//!
//! Records the turns of one conversation in a bounded binary tree and
//! rebuilds a short context block to prime the next request.

mod node;
mod tree;
mod usage;

pub use node::{Node, NodeContent, NodeId, NodeKind};
pub use tree::{ContextTree, CONTEXT_LEVELS, DEFAULT_WINDOW_SIZE, MAX_TREE_LEVELS, MAX_TREE_NODES};
pub use usage::WindowUsage;
