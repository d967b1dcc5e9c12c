// ABOUTME: Per-stage bookkeeping shared by the curation stages.
// ABOUTME: StageReport summarises row counts; ensure_non_empty enforces the empty-result rule.

use crate::error::{CorpusError, Result};
use crate::models::Node;

/// Row counts before and after one curation stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub rows_before: usize,
    pub rows_after: usize,
    /// Rows selected for removal directly, before their subtrees were added.
    /// For `qa_split` this counts the answers split out instead.
    pub seeds: usize,
}

impl StageReport {
    /// Zero for stages that only add rows.
    pub fn removed(&self) -> usize {
        self.rows_before.saturating_sub(self.rows_after)
    }

    pub fn added(&self) -> usize {
        self.rows_after.saturating_sub(self.rows_before)
    }

    pub(crate) fn log(&self) {
        tracing::info!(
            stage = self.stage,
            before = self.rows_before,
            after = self.rows_after,
            seeds = self.seeds,
            removed = self.removed(),
            added = self.added(),
            "stage complete"
        );
    }
}

/// Fails with `EmptyResult` when a stage left nothing behind.
pub fn ensure_non_empty(stage: &'static str, nodes: &[Node]) -> Result<()> {
    if nodes.is_empty() {
        tracing::error!(stage, "stage produced an empty corpus");
        return Err(CorpusError::EmptyResult { stage });
    }
    Ok(())
}
