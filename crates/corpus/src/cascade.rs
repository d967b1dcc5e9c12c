// ABOUTME: Cascade delete over a flat, corpus-ordered node population.
// ABOUTME: Removing a node removes exactly that node and all of its descendants.

use std::collections::{HashMap, HashSet};

use crate::models::Node;

/// Parent id → child indices, in corpus order.
pub fn children_index(nodes: &[Node]) -> HashMap<&str, Vec<usize>> {
    let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        if let Some(parent) = node.parent_id.as_deref() {
            children.entry(parent).or_default().push(idx);
        }
    }
    children
}

/// Indices of `seed` and every descendant of it.
pub fn subtree_indices(nodes: &[Node], children: &HashMap<&str, Vec<usize>>, seed: usize) -> Vec<usize> {
    let mut out = Vec::new();
    let mut stack = vec![seed];
    while let Some(idx) = stack.pop() {
        out.push(idx);
        if let Some(kids) = children.get(nodes[idx].id.as_str()) {
            stack.extend(kids.iter().rev().copied());
        }
    }
    out
}

/// Marks `seed` and its descendants in `removed`. Returns how many were newly marked.
pub fn mark_subtree(
    nodes: &[Node],
    children: &HashMap<&str, Vec<usize>>,
    seed: usize,
    removed: &mut [bool],
) -> usize {
    let mut newly = 0;
    for idx in subtree_indices(nodes, children, seed) {
        if !removed[idx] {
            removed[idx] = true;
            newly += 1;
        }
    }
    newly
}

/// Drops every node whose flag is set, keeping the order of the rest.
pub fn retain_unmarked(nodes: Vec<Node>, removed: &[bool]) -> Vec<Node> {
    nodes
        .into_iter()
        .zip(removed.iter())
        .filter_map(|(node, &gone)| if gone { None } else { Some(node) })
        .collect()
}

/// Removes the nodes with the given ids together with their subtrees.
///
/// Returns the survivors (corpus order preserved) and the ids that were removed.
pub fn cascade_remove(nodes: Vec<Node>, seeds: &HashSet<String>) -> (Vec<Node>, Vec<String>) {
    let mut removed = vec![false; nodes.len()];
    {
        let children = children_index(&nodes);
        for (idx, node) in nodes.iter().enumerate() {
            if seeds.contains(&node.id) {
                mark_subtree(&nodes, &children, idx, &mut removed);
            }
        }
    }
    let removed_ids = nodes
        .iter()
        .zip(removed.iter())
        .filter(|(_, &gone)| gone)
        .map(|(node, _)| node.id.clone())
        .collect();
    (retain_unmarked(nodes, &removed), removed_ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeDefaults;

    fn forest() -> Vec<Node> {
        let d = NodeDefaults::default();
        vec![
            d.node("r".into(), None, "t", 0, 0, "root".into()),
            d.node("a".into(), Some("r".into()), "t", 1, 0, "a".into()),
            d.node("a1".into(), Some("a".into()), "t", 2, 0, "a1".into()),
            d.node("b".into(), Some("r".into()), "t", 1, 1, "b".into()),
            d.node("a2".into(), Some("a".into()), "t", 2, 1, "a2".into()),
        ]
    }

    #[test]
    fn removes_node_and_all_descendants() {
        let seeds = HashSet::from(["a".to_string()]);
        let (kept, removed) = cascade_remove(forest(), &seeds);
        let kept_ids: Vec<_> = kept.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(kept_ids, vec!["r", "b"]);
        assert_eq!(removed, vec!["a", "a1", "a2"]);
    }

    #[test]
    fn removing_root_empties_tree() {
        let seeds = HashSet::from(["r".to_string()]);
        let (kept, removed) = cascade_remove(forest(), &seeds);
        assert!(kept.is_empty());
        assert_eq!(removed.len(), 5);
    }

    #[test]
    fn unknown_seed_is_noop() {
        let seeds = HashSet::from(["zzz".to_string()]);
        let (kept, removed) = cascade_remove(forest(), &seeds);
        assert_eq!(kept.len(), 5);
        assert!(removed.is_empty());
    }
}
