// ABOUTME: Corpus-wide deduplication of prompter turns by normalised text.
// ABOUTME: Later duplicates are cascade-deleted with their subtrees; first occurrence wins.

use std::collections::HashSet;

use crate::cascade::{children_index, mark_subtree, retain_unmarked};
use crate::models::{Node, Role};
use crate::stage::StageReport;

/// Lower-cased text with whitespace runs collapsed.
pub fn dedup_key(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Removes repeated prompter turns across the whole corpus.
///
/// Rows are visited in corpus order. A prompter row whose key was already seen is
/// removed together with its subtree; rows swept away by an earlier removal are
/// skipped and do not register their key.
pub fn remove_duplicate_prompters(nodes: Vec<Node>) -> (Vec<Node>, StageReport) {
    let rows_before = nodes.len();
    let mut removed = vec![false; nodes.len()];
    let mut seeds = 0;
    {
        let children = children_index(&nodes);
        let mut seen: HashSet<String> = HashSet::new();
        for (idx, node) in nodes.iter().enumerate() {
            if removed[idx] || node.role != Role::Prompter {
                continue;
            }
            let key = dedup_key(&node.text);
            if !seen.insert(key) {
                tracing::debug!(id = %node.id, tree = %node.tree_id, "duplicate prompter turn");
                mark_subtree(&nodes, &children, idx, &mut removed);
                seeds += 1;
            }
        }
    }
    let kept = retain_unmarked(nodes, &removed);
    let report = StageReport {
        stage: "deduplicate",
        rows_before,
        rows_after: kept.len(),
        seeds,
    };
    report.log();
    (kept, report)
}
