//! Integration tests for the conversation-context tree

use convtree::context::{ContextTree, Node, NodeId, CONTEXT_LEVELS, MAX_TREE_NODES};
use pretty_assertions::assert_eq;

fn prompts(nodes: &[&Node]) -> Vec<String> {
    nodes
        .iter()
        .map(|n| n.prompt().unwrap_or_default().to_string())
        .collect()
}

fn fill(tree: &mut ContextTree, count: usize) -> Vec<NodeId> {
    (1..=count)
        .map(|i| tree.insert(format!("P{i}"), Some(format!("R{i}"))).id())
        .collect()
}

/// Window occupancy tracks min(N, W) after every insert
#[test]
fn test_current_depth_is_capped_by_window() {
    for window in 1..=6 {
        let mut tree = ContextTree::new(window);
        for n in 1..=15 {
            tree.insert(format!("turn {n}"), None);
            assert_eq!(tree.current_depth(), n.min(window));
            assert_eq!(tree.can_insert_more(), n < window);
        }
    }
}

/// The first node stays the root for the life of the tree
#[test]
fn test_root_identity_is_stable() {
    let mut tree = ContextTree::new(3);
    let root = tree.insert("first", None).id();
    for i in 0..20 {
        tree.insert(format!("more {i}"), None);
        assert_eq!(tree.root().map(Node::id), Some(root));
    }
}

#[test]
fn test_reset_restores_empty_state() {
    let mut tree = ContextTree::new(5);
    fill(&mut tree, 9);
    tree.reset();

    assert_eq!(tree.current_depth(), 0);
    assert_eq!(tree.tree_height(), 0);
    assert_eq!(tree.get_context(), "");
    assert!(tree.get_history().is_empty());
    assert!(tree.get_path().is_empty());
    assert!(tree.get_last_response().is_none());
    assert!(tree.root().is_none());
    assert!(tree.can_insert_more());

    // Behaves like a fresh tree afterwards
    tree.insert("again", None);
    assert_eq!(tree.tree_height(), 1);
    assert_eq!(tree.current_depth(), 1);
}

#[test]
fn test_empty_tree_queries() {
    let tree = ContextTree::new(5);
    assert_eq!(tree.get_context(), "");
    assert!(tree.get_history().is_empty());
    assert!(tree.get_path().is_empty());
    assert_eq!(tree.tree_height(), 0);
    assert!(tree.current().is_none());
    assert!(tree.is_empty());
}

/// Context holds at most three blocks, ordered root to current
#[test]
fn test_context_is_bounded_and_ordered() {
    let mut tree = ContextTree::new(10);

    tree.insert("P1", Some("R1".into()));
    assert_eq!(tree.get_context(), "User: P1\nAI: R1");

    tree.insert("P2", Some("R2".into()));
    assert_eq!(tree.get_context(), "User: P1\nAI: R1\n\nUser: P2\nAI: R2");

    for i in 3..=7 {
        tree.insert(format!("P{i}"), Some(format!("R{i}")));
        let context = tree.get_context();
        assert!(context.split("\n\n").count() <= CONTEXT_LEVELS);
    }

    // P7 sits under P3, which sits under P1
    assert_eq!(
        tree.get_context(),
        "User: P1\nAI: R1\n\nUser: P3\nAI: R3\n\nUser: P7\nAI: R7"
    );
}

#[test]
fn test_context_skips_empty_turns() {
    let mut tree = ContextTree::new(5);
    tree.insert("", None);
    tree.insert("P2", None);
    assert_eq!(tree.get_context(), "User: P2");
}

/// Complete levels give heights 1, 2, 3
#[test]
fn test_complete_levels_heights() {
    let mut tree = ContextTree::new(10);
    let mut inserted = 0;
    for (total, height) in [(1, 1), (3, 2), (7, 3)] {
        while inserted < total {
            inserted += 1;
            tree.insert(format!("P{inserted}"), None);
        }
        assert_eq!(tree.tree_height(), height);
    }
}

/// Window 5, seven turns: history keeps the newest five
#[test]
fn test_window_keeps_newest_turns() {
    let mut tree = ContextTree::new(5);
    fill(&mut tree, 7);

    let history = tree.get_history();
    assert_eq!(history.len(), 5);
    assert_eq!(prompts(&history), vec!["P3", "P4", "P5", "P6", "P7"]);
    assert!(tree.reachable_count() <= MAX_TREE_NODES);
    assert_eq!(tree.root().and_then(Node::prompt), Some("P1"));
    assert_eq!(tree.tree_height(), 3);
}

/// A fourth turn finds the open slot under the left child
#[test]
fn test_fourth_turn_attaches_without_replacement() {
    let mut tree = ContextTree::new(10);
    let ids = fill(&mut tree, 3);

    let fourth = tree.insert("P4", None).id();
    let node = tree.get(fourth).unwrap();
    assert_eq!(node.parent(), Some(ids[1]));
    assert_eq!(node.depth(), 2);

    let root = tree.root().unwrap();
    assert_eq!(root.left(), Some(ids[1]));
    assert_eq!(root.right(), Some(ids[2]));
    assert_eq!(tree.reachable_count(), 4);
    assert!(ids.iter().all(|id| tree.is_reachable(*id)));
}

/// An eighth turn on a full three-level tree overwrites the root's older child
#[test]
fn test_full_tree_replaces_older_root_child() {
    let mut tree = ContextTree::new(10);
    let ids = fill(&mut tree, 7);
    let (p1, p2, p3) = (ids[0], ids[1], ids[2]);
    let (p4, p5) = (ids[3], ids[4]);

    let eighth = tree.insert("P8", Some("R8".into())).id();

    let root = tree.root().unwrap();
    assert_eq!(root.id(), p1);
    assert_eq!(root.left(), Some(eighth));
    assert_eq!(root.right(), Some(p3));
    assert_eq!(tree.get(eighth).unwrap().depth(), 1);

    // P2 and its children are gone from the tree
    let path: Vec<NodeId> = tree.get_path().iter().map(|n| n.id()).collect();
    assert_eq!(path, vec![p1, eighth]);
    for orphan in [p2, p4, p5] {
        assert!(!path.contains(&orphan));
        assert!(!tree.is_reachable(orphan));
    }
    assert_eq!(tree.reachable_count(), 5);

    // ...but still listed in the history window
    assert_eq!(tree.get_history().len(), 8);
    assert_eq!(tree.get_history()[1].id(), p2);
}

#[test]
fn test_path_runs_root_to_current() {
    let mut tree = ContextTree::new(10);
    fill(&mut tree, 6);

    // P6 sits under P3
    assert_eq!(prompts(&tree.get_path()), vec!["P1", "P3", "P6"]);
    assert_eq!(tree.current().and_then(Node::prompt), Some("P6"));
}

#[test]
fn test_last_response() {
    let mut tree = ContextTree::new(3);
    assert!(tree.get_last_response().is_none());

    tree.insert("p", Some("r".into()));
    assert_eq!(tree.get_last_response(), Some("r"));

    tree.insert("no answer yet", None);
    assert!(tree.get_last_response().is_none());
}

#[test]
fn test_storage_bounded_by_window_and_tree() {
    let mut tree = ContextTree::new(4);
    for i in 0..200 {
        tree.insert(format!("turn {i}"), Some("ok".into()));
        assert!(tree.stored_count() <= MAX_TREE_NODES + 4);
    }
    assert_eq!(tree.usage().to_string(), "4/4 turns used");
}

#[test]
fn test_prompts_stored_verbatim() {
    let mut tree = ContextTree::new(2);
    let raw = "  Line one\n\tLine two  ";
    tree.insert(raw, Some(String::new()));
    let node = tree.current().unwrap();
    assert_eq!(node.prompt(), Some(raw));
    assert_eq!(node.response(), Some(""));
}
