//! Context tree - bounded record of a multi-turn conversation
//!
//! Two views share one node arena:
//! - the binary tree rooted at the first turn, used for context
//!   reconstruction and structural queries
//! - the insertion-ordered history window, capped at `window_size`
//!
//! The views can diverge. When every eligible slot is taken, a new turn
//! overwrites the older child of the root and that child's subtree drops
//! out of the tree, while any of its turns still inside the history
//! window stay visible through [`ContextTree::get_history`].

use super::node::{Node, NodeId, NodeKind};
use super::usage::WindowUsage;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::{debug, warn};

/// Number of levels (current node included) folded into the prompt context
pub const CONTEXT_LEVELS: usize = 3;

/// Structural ceiling: nodes only live at depths `0..MAX_TREE_LEVELS`
pub const MAX_TREE_LEVELS: usize = 3;

/// Most nodes reachable from the root at any time
pub const MAX_TREE_NODES: usize = (1 << MAX_TREE_LEVELS) - 1;

/// Default history window
pub const DEFAULT_WINDOW_SIZE: usize = 5;

/// Conversation-context tree for one session.
///
/// Every mutation takes `&mut self`, so one owner drives the tree. Wrap
/// the whole tree in a lock or an actor if more than one task needs to
/// write to it.
#[derive(Debug, Clone)]
pub struct ContextTree {
    nodes: HashMap<NodeId, Node>,
    root: Option<NodeId>,
    current: Option<NodeId>,
    /// Oldest first
    history: VecDeque<NodeId>,
    window_size: usize,
    next_seq: u64,
}

impl ContextTree {
    /// Create an empty tree whose history keeps at most `window_size` turns.
    ///
    /// A window of 0 is treated as 1.
    pub fn new(window_size: usize) -> Self {
        if window_size == 0 {
            warn!("Context window size 0 is invalid, using 1");
        }
        Self {
            nodes: HashMap::new(),
            root: None,
            current: None,
            history: VecDeque::new(),
            window_size: window_size.max(1),
            next_seq: 0,
        }
    }

    /// Record a user turn and return the stored node
    pub fn insert(&mut self, prompt: impl Into<String>, response: Option<String>) -> &Node {
        let prompt = prompt.into();
        let node = Node::new(NodeKind::User, prompt.as_str())
            .with_prompt(prompt)
            .with_response(response);
        self.insert_node(node)
    }

    /// Record an arbitrary node as the next turn.
    ///
    /// Placement ignores the node kind. Links and depth carried in by the
    /// caller (for example from a cloned node) are discarded.
    pub fn insert_node(&mut self, mut node: Node) -> &Node {
        self.next_seq += 1;
        let id = NodeId(self.next_seq);
        node.assign(id, self.next_seq);

        let mut dropped_any = false;
        match self.root {
            None => {
                debug!("Inserted {} as root", id);
                self.nodes.insert(id, node);
                self.root = Some(id);
            }
            Some(root) => {
                let parent = self.find_insertion_point(root);
                dropped_any = self.attach(parent, id, node);
            }
        }

        self.current = Some(id);
        self.history.push_back(id);
        if self.history.len() > self.window_size {
            if let Some(evicted) = self.history.pop_front() {
                debug!("History window full, evicted {}", evicted);
            }
            dropped_any = true;
        }

        if dropped_any {
            self.release_unreferenced();
        }

        // Stored by both branches above and held by the history window,
        // so the release pass keeps it.
        &self.nodes[&id]
    }

    /// Breadth-first search for the shallowest, leftmost node that can take
    /// another child without exceeding the structural ceiling. Falls back
    /// to the root when none can.
    fn find_insertion_point(&self, root: NodeId) -> NodeId {
        let mut queue = VecDeque::from([root]);
        while let Some(id) = queue.pop_front() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            if node.depth() + 1 < MAX_TREE_LEVELS && node.has_open_slot() {
                return id;
            }
            queue.extend(node.children());
        }
        root
    }

    /// Attach `node` under `parent_id`. Returns true if a subtree was
    /// overwritten.
    ///
    /// The node is always stored, even if `parent_id` no longer resolves.
    fn attach(&mut self, parent_id: NodeId, id: NodeId, mut node: Node) -> bool {
        let Some((parent_depth, left, right)) = self
            .nodes
            .get(&parent_id)
            .map(|parent| (parent.depth(), parent.left(), parent.right()))
        else {
            warn!("Parent {} missing, storing {} detached", parent_id, id);
            self.nodes.insert(id, node);
            return false;
        };
        node.attach_under(parent_id, parent_depth);

        let overwritten = match (left, right) {
            (None, _) => {
                self.set_child(parent_id, Slot::Left, id);
                None
            }
            (Some(_), None) => {
                self.set_child(parent_id, Slot::Right, id);
                None
            }
            (Some(left), Some(right)) => {
                if self.seq_of(left) <= self.seq_of(right) {
                    self.set_child(parent_id, Slot::Left, id);
                    Some(left)
                } else {
                    self.set_child(parent_id, Slot::Right, id);
                    Some(right)
                }
            }
        };
        debug!("Inserted {} under {} at depth {}", id, parent_id, node.depth());
        self.nodes.insert(id, node);

        match overwritten {
            Some(victim) => {
                let orphaned = self.subtree_ids(victim).len();
                if let Some(detached) = self.nodes.get_mut(&victim) {
                    detached.detach();
                }
                warn!(
                    "Tree full: {} replaced {} under {}, {} node(s) no longer reachable",
                    id, victim, parent_id, orphaned
                );
                true
            }
            None => false,
        }
    }

    fn set_child(&mut self, parent: NodeId, slot: Slot, child: NodeId) {
        if let Some(node) = self.nodes.get_mut(&parent) {
            match slot {
                Slot::Left => node.set_left(Some(child)),
                Slot::Right => node.set_right(Some(child)),
            }
        }
    }

    fn seq_of(&self, id: NodeId) -> u64 {
        self.nodes.get(&id).map(Node::seq).unwrap_or(0)
    }

    /// Ids of `start` and every stored descendant, breadth-first
    fn subtree_ids(&self, start: NodeId) -> Vec<NodeId> {
        let mut ids = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(id) = queue.pop_front() {
            if let Some(node) = self.nodes.get(&id) {
                ids.push(id);
                queue.extend(node.children());
            }
        }
        ids
    }

    /// Drop nodes that neither the tree nor the history window can reach
    fn release_unreferenced(&mut self) {
        let mut keep: HashSet<NodeId> = match self.root {
            Some(root) => self.subtree_ids(root).into_iter().collect(),
            None => HashSet::new(),
        };
        keep.extend(self.history.iter().copied());

        let before = self.nodes.len();
        self.nodes.retain(|id, _| keep.contains(id));
        let released = before - self.nodes.len();
        if released > 0 {
            debug!("Released {} unreferenced node(s)", released);
        }
    }

    /// Walk from `start` toward the root, `start` first
    fn ancestors(&self, start: Option<NodeId>) -> impl Iterator<Item = &Node> + '_ {
        std::iter::successors(start.and_then(|id| self.nodes.get(&id)), move |node| {
            node.parent().and_then(|parent| self.nodes.get(&parent))
        })
    }

    /// Context block for the next outbound prompt.
    ///
    /// Covers the current turn and up to two ancestors, root-most first,
    /// blocks separated by a blank line. Empty turn contexts are skipped.
    pub fn get_context(&self) -> String {
        let mut blocks: Vec<String> = self
            .ancestors(self.current)
            .take(CONTEXT_LEVELS)
            .map(Node::turn_context)
            .filter(|context| !context.is_empty())
            .collect();
        blocks.reverse();
        blocks.join("\n\n")
    }

    /// History window, oldest first
    pub fn get_history(&self) -> Vec<&Node> {
        self.history
            .iter()
            .filter_map(|id| self.nodes.get(id))
            .collect()
    }

    /// Response of the most recently recorded turn
    pub fn get_last_response(&self) -> Option<&str> {
        self.history
            .back()
            .and_then(|id| self.nodes.get(id))
            .and_then(Node::response)
    }

    pub fn can_insert_more(&self) -> bool {
        self.history.len() < self.window_size
    }

    /// Occupancy of the history window (not the tree height)
    pub fn current_depth(&self) -> usize {
        self.history.len()
    }

    /// Height of the structure reachable from the root, 0 when empty
    pub fn tree_height(&self) -> usize {
        self.height_of(self.root)
    }

    fn height_of(&self, id: Option<NodeId>) -> usize {
        match id.and_then(|id| self.nodes.get(&id)) {
            Some(node) => 1 + self.height_of(node.left()).max(self.height_of(node.right())),
            None => 0,
        }
    }

    /// Full ancestor chain, root first, ending at the current turn
    pub fn get_path(&self) -> Vec<&Node> {
        let mut path: Vec<&Node> = self.ancestors(self.current).collect();
        path.reverse();
        path
    }

    /// Forget every turn. Handles issued before the reset stop resolving.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.current = None;
        self.history.clear();
    }

    pub fn root(&self) -> Option<&Node> {
        self.root.and_then(|id| self.nodes.get(&id))
    }

    pub fn current(&self) -> Option<&Node> {
        self.current.and_then(|id| self.nodes.get(&id))
    }

    /// Look up a stored node. Released nodes resolve to `None`.
    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(&id)
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }

    /// Whether `id` can still be reached by descending from the root
    pub fn is_reachable(&self, id: NodeId) -> bool {
        match (self.root, self.ancestors(Some(id)).last()) {
            (Some(root), Some(top)) => top.id() == root,
            _ => false,
        }
    }

    /// Number of nodes reachable from the root
    pub fn reachable_count(&self) -> usize {
        self.root.map(|root| self.subtree_ids(root).len()).unwrap_or(0)
    }

    /// Number of nodes held in the arena (tree plus orphaned history)
    pub fn stored_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn usage(&self) -> WindowUsage {
        WindowUsage {
            used: self.history.len(),
            capacity: self.window_size,
        }
    }
}

impl Default for ContextTree {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_SIZE)
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Left,
    Right,
}
