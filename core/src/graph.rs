//! Pure cycle-detection for the task and spec dependency graphs.
//!
//! Both graphs share the same edge shape (`child -> parent` meaning
//! "child waits on parent") and therefore the same cycle check: adding
//! edge `child -> parent` is safe exactly when `parent` cannot already
//! reach `child` by following existing parent edges.

use crate::error::{CoordError, Result};
use async_trait::async_trait;
use std::collections::{HashSet, VecDeque};

/// Which dependency graph an operation targets. The two graphs are
/// stored in separate tables but share every algorithm in this module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphKind {
    Task,
    Spec,
}

/// Lookup of a node's direct parents, abstracting over the backing store
/// so the cycle check can be unit-tested against a plain map and run in
/// production against SQL.
#[async_trait]
pub trait ParentLookup: Send + Sync {
    async fn parents(&self, node: &str) -> Result<Vec<String>>;
}

/// Breadth-first search from `parent_id`, following parent edges, to see
/// whether `child_id` is reachable. If it is, inserting `child_id ->
/// parent_id` would close a cycle.
///
/// Returns the path from `parent_id` to `child_id`, closed back to
/// `parent_id`, when a cycle would be formed — the complete cycle the
/// new edge would close, not just the reachability witness.
pub async fn would_create_cycle(
    lookup: &dyn ParentLookup,
    child_id: &str,
    parent_id: &str,
) -> Result<Option<Vec<String>>> {
    if child_id == parent_id {
        return Ok(Some(vec![child_id.to_string(), parent_id.to_string()]));
    }

    let mut visited: HashSet<String> = HashSet::new();
    let mut queue: VecDeque<Vec<String>> = VecDeque::new();
    queue.push_back(vec![parent_id.to_string()]);
    visited.insert(parent_id.to_string());

    while let Some(path) = queue.pop_front() {
        let current = path.last().expect("path is never empty");
        if current == child_id {
            let mut closed = path;
            closed.push(parent_id.to_string());
            return Ok(Some(closed));
        }
        for next in lookup.parents(current).await? {
            if visited.insert(next.clone()) {
                let mut next_path = path.clone();
                next_path.push(next);
                queue.push_back(next_path);
            }
        }
    }

    Ok(None)
}

/// Runs [`would_create_cycle`] and turns a hit into a [`CoordError`].
pub async fn check_no_cycle(
    lookup: &dyn ParentLookup,
    child_id: &str,
    parent_id: &str,
) -> Result<()> {
    match would_create_cycle(lookup, child_id, parent_id).await? {
        Some(path) => Err(CoordError::CycleDetected {
            child_id: child_id.to_string(),
            parent_id: parent_id.to_string(),
            path,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// `child -> parents` adjacency, exactly mirroring how the SQL
    /// implementation is keyed.
    struct InMemoryGraph(Mutex<HashMap<String, Vec<String>>>);

    impl InMemoryGraph {
        fn new(edges: &[(&str, &str)]) -> Self {
            let mut map: HashMap<String, Vec<String>> = HashMap::new();
            for (child, parent) in edges {
                map.entry(child.to_string())
                    .or_default()
                    .push(parent.to_string());
            }
            Self(Mutex::new(map))
        }
    }

    #[async_trait]
    impl ParentLookup for InMemoryGraph {
        async fn parents(&self, node: &str) -> Result<Vec<String>> {
            Ok(self.0.lock().unwrap().get(node).cloned().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn no_edges_means_no_cycle() {
        let graph = InMemoryGraph::new(&[]);
        assert!(would_create_cycle(&graph, "a", "b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn self_edge_is_always_a_cycle() {
        let graph = InMemoryGraph::new(&[]);
        assert!(would_create_cycle(&graph, "a", "a").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn direct_reverse_edge_is_a_cycle() {
        // a depends on b (a -> b). Adding b -> a would close a 2-cycle.
        let graph = InMemoryGraph::new(&[("a", "b")]);
        let cycle = would_create_cycle(&graph, "b", "a").await.unwrap();
        assert!(cycle.is_some());
    }

    #[tokio::test]
    async fn transitive_cycle_is_detected_through_a_chain() {
        // a -> b -> c (a depends on b, b depends on c).
        // Adding c -> a would close the loop a -> b -> c -> a.
        let graph = InMemoryGraph::new(&[("a", "b"), ("b", "c")]);
        let cycle = would_create_cycle(&graph, "c", "a").await.unwrap();
        assert_eq!(cycle, Some(vec!["a".to_string(), "b".to_string(), "c".to_string(), "a".to_string()]));
    }

    #[tokio::test]
    async fn unrelated_edge_is_not_a_cycle() {
        let graph = InMemoryGraph::new(&[("a", "b"), ("x", "y")]);
        assert!(would_create_cycle(&graph, "x", "b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn check_no_cycle_returns_cycle_detected_error() {
        let graph = InMemoryGraph::new(&[]);
        let err = check_no_cycle(&graph, "a", "a").await.unwrap_err();
        assert_eq!(err.code(), "CYCLE_DETECTED");
    }
}
