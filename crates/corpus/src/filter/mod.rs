// ABOUTME: Parallel denylist filter over statically partitioned, order-preserving shards.
// ABOUTME: Workers only read shared data; flags are merged in shard order and cascade-deleted.

//! Denylist filtering.
//!
//! Rows are cut into `workers` contiguous shards. Each shard is evaluated on a
//! dedicated rayon pool with no shared mutable state: the denylist is borrowed
//! read-only, and the only other shared value is the cancellation flag, which
//! is read at every shard boundary. Per-shard flag vectors are concatenated in
//! shard order, so the outcome does not depend on worker count or scheduling.

pub mod denylist;

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::cascade::{children_index, mark_subtree, retain_unmarked};
use crate::error::{CorpusError, Result};
use crate::models::Node;
use crate::stage::{ensure_non_empty, StageReport};

pub use denylist::Denylist;

/// Cooperative cancellation signal shared with the filter workers.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Splits `len` items into at most `workers` contiguous ranges of near-equal size.
pub fn shard_bounds(len: usize, workers: usize) -> Vec<std::ops::Range<usize>> {
    let workers = workers.max(1).min(len.max(1));
    let base = len / workers;
    let extra = len % workers;
    let mut bounds = Vec::with_capacity(workers);
    let mut start = 0;
    for i in 0..workers {
        let size = base + usize::from(i < extra);
        bounds.push(start..start + size);
        start += size;
    }
    bounds
}

/// Denylist filter running on a fixed-size worker pool.
#[derive(Debug, Clone)]
pub struct ParallelFilter {
    denylist: Arc<Denylist>,
    workers: usize,
    cancel: CancelFlag,
}

impl ParallelFilter {
    pub fn new(denylist: Denylist, workers: usize) -> Self {
        Self {
            denylist: Arc::new(denylist),
            workers: workers.max(1),
            cancel: CancelFlag::new(),
        }
    }

    /// Uses the machine's available parallelism as the worker count.
    pub fn with_available_workers(denylist: Denylist) -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self::new(denylist, workers)
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// True if any text field of `node` contains a denylisted term.
    pub fn is_denied(&self, node: &Node) -> bool {
        self.denylist.matches(&node.text)
            || node.title.as_deref().is_some_and(|t| self.denylist.matches(t))
            || node.author_ref.as_deref().is_some_and(|a| self.denylist.matches(a))
    }

    /// Flags for every row, in corpus order.
    pub fn flag_rows(&self, nodes: &[Node]) -> Result<Vec<bool>> {
        let bounds = shard_bounds(nodes.len(), self.workers);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .build()
            .map_err(|e| CorpusError::config(format!("failed to build worker pool: {e}")))?;

        let shards: Vec<Result<Vec<bool>>> = pool.install(|| {
            bounds
                .par_iter()
                .map(|range| {
                    if self.cancel.is_cancelled() {
                        return Err(CorpusError::Cancelled);
                    }
                    let flags: Vec<bool> = nodes[range.clone()].iter().map(|n| self.is_denied(n)).collect();
                    debug!(start = range.start, end = range.end, flagged = flags.iter().filter(|f| **f).count(), "shard evaluated");
                    Ok(flags)
                })
                .collect()
        });

        let mut flags = Vec::with_capacity(nodes.len());
        for shard in shards {
            flags.extend(shard?);
        }
        if self.cancel.is_cancelled() {
            return Err(CorpusError::Cancelled);
        }
        Ok(flags)
    }

    /// Removes flagged rows with their subtrees. Fails if nothing survives.
    pub fn apply(&self, nodes: Vec<Node>) -> Result<(Vec<Node>, StageReport)> {
        let rows_before = nodes.len();
        let flags = self.flag_rows(&nodes)?;

        let mut removed = vec![false; nodes.len()];
        let seeds = flags.iter().filter(|f| **f).count();
        {
            let children = children_index(&nodes);
            for (idx, flagged) in flags.iter().enumerate() {
                if *flagged {
                    mark_subtree(&nodes, &children, idx, &mut removed);
                }
            }
        }
        let kept = retain_unmarked(nodes, &removed);
        let report = StageReport {
            stage: "filter",
            rows_before,
            rows_after: kept.len(),
            seeds,
        };
        report.log();
        info!(workers = self.workers, terms = self.denylist.len(), "denylist filter applied");
        ensure_non_empty("filter", &kept)?;
        Ok((kept, report))
    }

    /// Ids that `apply` would remove, without removing them.
    pub fn denied_ids(&self, nodes: &[Node]) -> Result<HashSet<String>> {
        let flags = self.flag_rows(nodes)?;
        Ok(nodes
            .iter()
            .zip(flags)
            .filter(|(_, f)| *f)
            .map(|(n, _)| n.id.clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeDefaults;
    use pretty_assertions::assert_eq;

    fn n(id: &str, parent: Option<&str>, tree: &str, depth: u32, text: &str) -> Node {
        NodeDefaults::default().node(id.into(), parent.map(Into::into), tree, depth, 0, text.into())
    }

    fn corpus() -> Vec<Node> {
        vec![
            n("a0", None, "a", 0, "Deposit dispute"),
            n("a1", Some("a0"), "a", 1, "Our Seoul office can help"),
            n("a2", Some("a1"), "a", 2, "thanks"),
            n("a3", Some("a0"), "a", 1, "general answer"),
            n("b0", None, "b", 0, "Divorce question"),
            n("b1", Some("b0"), "b", 1, "answer"),
        ]
    }

    fn filter(workers: usize) -> ParallelFilter {
        ParallelFilter::new(Denylist::new(["seoul"]).unwrap(), workers)
    }

    #[test]
    fn shard_bounds_cover_all_rows_in_order() {
        let bounds = shard_bounds(10, 3);
        assert_eq!(bounds, vec![0..4, 4..7, 7..10]);
        assert_eq!(shard_bounds(2, 8), vec![0..1, 1..2]);
        assert_eq!(shard_bounds(0, 4), vec![0..0]);
    }

    #[test]
    fn matching_row_and_subtree_are_removed() {
        let (kept, report) = filter(2).apply(corpus()).unwrap();
        let ids: Vec<_> = kept.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["a0", "a3", "b0", "b1"]);
        assert_eq!(report.seeds, 1);
        assert_eq!(report.removed(), 2);
    }

    #[test]
    fn title_field_is_checked() {
        let mut nodes = corpus();
        nodes[4].title = Some("Moving to SEOUL".into());
        let (kept, _) = filter(1).apply(nodes).unwrap();
        assert!(kept.iter().all(|n| n.tree_id == "a"));
    }

    #[test]
    fn result_is_independent_of_worker_count() {
        let (one, _) = filter(1).apply(corpus()).unwrap();
        for workers in [2, 3, 4, 16] {
            let (many, _) = filter(workers).apply(corpus()).unwrap();
            assert_eq!(one, many);
        }
    }

    #[test]
    fn empty_result_is_an_error() {
        let f = ParallelFilter::new(Denylist::new(["question", "dispute"]).unwrap(), 2);
        let err = f.apply(corpus()).unwrap_err();
        assert!(err.is_empty_result());
    }

    #[test]
    fn cancelled_filter_stops() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let f = filter(2).with_cancel_flag(cancel);
        assert!(matches!(f.apply(corpus()), Err(CorpusError::Cancelled)));
    }

    #[test]
    fn denied_ids_lists_direct_matches_only() {
        let ids = filter(3).denied_ids(&corpus()).unwrap();
        assert_eq!(ids, HashSet::from(["a1".to_string()]));
    }
}
