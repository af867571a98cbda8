//! Turn nodes stored in the context tree

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Handle to a node in a [`ContextTree`](super::ContextTree) arena.
///
/// Handles are never reused within one tree, so a handle to a released
/// node simply stops resolving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Origin of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    User,
    System,
    Content,
    Summary,
}

impl NodeKind {
    /// Get role name for display
    pub fn role_name(&self) -> &'static str {
        match self {
            Self::User => "User",
            Self::System => "System",
            Self::Content => "Content",
            Self::Summary => "Summary",
        }
    }
}

/// Raw payload of a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum NodeContent {
    Text(String),
    Parts(Vec<String>),
}

impl NodeContent {
    /// Flatten the payload into one string, parts separated by newlines
    pub fn as_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Parts(parts) => parts.join("\n"),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Parts(parts) => parts.iter().all(|p| p.is_empty()),
        }
    }
}

impl From<String> for NodeContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for NodeContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<Vec<String>> for NodeContent {
    fn from(parts: Vec<String>) -> Self {
        Self::Parts(parts)
    }
}

/// One recorded turn.
///
/// Fields are fixed once the tree has attached the node; only the tree
/// itself rewires `left`/`right` when it overwrites a slot.
#[derive(Debug, Clone, Serialize)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
    content: NodeContent,
    prompt: Option<String>,
    response: Option<String>,
    context: Option<String>,
    depth: usize,
    #[serde(skip)]
    parent: Option<NodeId>,
    #[serde(skip)]
    left: Option<NodeId>,
    #[serde(skip)]
    right: Option<NodeId>,
    created_at: DateTime<Utc>,
    #[serde(skip)]
    seq: u64,
}

impl Node {
    /// Create a detached node at depth 0
    pub fn new(kind: NodeKind, content: impl Into<NodeContent>) -> Self {
        Self {
            id: NodeId(0),
            kind,
            content: content.into(),
            prompt: None,
            response: None,
            context: None,
            depth: 0,
            parent: None,
            left: None,
            right: None,
            created_at: Utc::now(),
            seq: 0,
        }
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_response(mut self, response: Option<String>) -> Self {
        self.response = response;
        self
    }

    /// Replace the derived turn context with a fixed string
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn content(&self) -> &NodeContent {
        &self.content
    }

    pub fn prompt(&self) -> Option<&str> {
        self.prompt.as_deref()
    }

    pub fn response(&self) -> Option<&str> {
        self.response.as_deref()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Parent handle. Traversal metadata only; the parent owns the child.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn left(&self) -> Option<NodeId> {
        self.left
    }

    pub fn right(&self) -> Option<NodeId> {
        self.right
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Insertion number within the owning tree
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Whether a child slot is still free
    pub fn has_open_slot(&self) -> bool {
        self.left.is_none() || self.right.is_none()
    }

    pub fn children(&self) -> impl Iterator<Item = NodeId> {
        self.left.into_iter().chain(self.right)
    }

    /// Context string for this turn.
    ///
    /// An explicit context wins. Otherwise `User:` and `AI:` lines are
    /// emitted for whichever of prompt/response is present and non-empty.
    pub fn turn_context(&self) -> String {
        if let Some(context) = &self.context {
            return context.clone();
        }

        let mut lines = Vec::with_capacity(2);
        if let Some(prompt) = self.prompt.as_deref().filter(|p| !p.is_empty()) {
            lines.push(format!("User: {prompt}"));
        }
        if let Some(response) = self.response.as_deref().filter(|r| !r.is_empty()) {
            lines.push(format!("AI: {response}"));
        }
        lines.join("\n")
    }

    /// Give the node a fresh identity and drop any links it carried in,
    /// so a cloned node never arrives owning another node's children.
    pub(super) fn assign(&mut self, id: NodeId, seq: u64) {
        self.id = id;
        self.seq = seq;
        self.depth = 0;
        self.parent = None;
        self.left = None;
        self.right = None;
    }

    pub(super) fn attach_under(&mut self, parent: NodeId, parent_depth: usize) {
        self.parent = Some(parent);
        self.depth = parent_depth + 1;
    }

    pub(super) fn detach(&mut self) {
        self.parent = None;
    }

    pub(super) fn set_left(&mut self, child: Option<NodeId>) {
        self.left = child;
    }

    pub(super) fn set_right(&mut self, child: Option<NodeId>) {
        self.right = child;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_context_full() {
        let node = Node::new(NodeKind::User, "q")
            .with_prompt("What is 2+2?")
            .with_response(Some("4".to_string()));
        assert_eq!(node.turn_context(), "User: What is 2+2?\nAI: 4");
    }

    #[test]
    fn test_turn_context_omits_missing_lines() {
        let prompt_only = Node::new(NodeKind::User, "q").with_prompt("hello");
        assert_eq!(prompt_only.turn_context(), "User: hello");

        let response_only = Node::new(NodeKind::Content, "c").with_response(Some("hi".into()));
        assert_eq!(response_only.turn_context(), "AI: hi");

        let empty = Node::new(NodeKind::System, "sys");
        assert_eq!(empty.turn_context(), "");

        let blank_prompt = Node::new(NodeKind::User, "").with_prompt("");
        assert_eq!(blank_prompt.turn_context(), "");
    }

    #[test]
    fn test_context_override() {
        let node = Node::new(NodeKind::Summary, "s")
            .with_prompt("ignored")
            .with_context("Summary of chapter 3");
        assert_eq!(node.turn_context(), "Summary of chapter 3");
    }

    #[test]
    fn test_content_parts() {
        let content = NodeContent::from(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(content.as_text(), "a\nb");
        assert!(!content.is_empty());
        assert!(NodeContent::Parts(vec![String::new()]).is_empty());
    }

    #[test]
    fn test_new_node_is_detached() {
        let node = Node::new(NodeKind::User, "x");
        assert_eq!(node.depth(), 0);
        assert!(node.parent().is_none());
        assert!(node.has_open_slot());
        assert_eq!(node.children().count(), 0);
    }
}
