// ABOUTME: Curation pipeline wiring QA split, dedup, under-sampling and filtering in fixed order.
// ABOUTME: A caller-supplied checkpoint hook sees the corpus after every stage.

use tracing::info;

use crate::dedup::remove_duplicate_prompters;
use crate::error::Result;
use crate::filter::ParallelFilter;
use crate::models::{advance_tree_states, validate_forest, Node, TreeState};
use crate::qa::{QaGate, QaSplitter};
use crate::sample::UnderSampler;
use crate::stage::{ensure_non_empty, StageReport};

/// Immutable configuration for one `curate` run.
#[derive(Debug, Clone)]
pub struct Curation {
    pub qa: Option<(QaSplitter, QaGate)>,
    pub sampler: UnderSampler,
    pub filter: ParallelFilter,
}

/// Result of a full curation run.
#[derive(Debug, Clone)]
pub struct CurationOutcome {
    pub nodes: Vec<Node>,
    pub reports: Vec<StageReport>,
}

impl Curation {
    /// Runs every stage in order. `checkpoint` is called with the stage name and surviving rows.
    pub fn run<F>(&self, nodes: Vec<Node>, mut checkpoint: F) -> Result<CurationOutcome>
    where
        F: FnMut(&'static str, &[Node]) -> Result<()>,
    {
        validate_forest(&nodes)?;
        ensure_non_empty("input", &nodes)?;
        let mut reports = Vec::with_capacity(4);

        let nodes = match &self.qa {
            Some((splitter, gate)) => {
                let before = nodes.len();
                let split = splitter.split_corpus(nodes, *gate);
                let report = StageReport {
                    stage: "qa_split",
                    rows_before: before,
                    rows_after: split.len(),
                    seeds: split.len().saturating_sub(before),
                };
                report.log();
                reports.push(report);
                checkpoint("qa_split", &split)?;
                split
            }
            None => nodes,
        };

        let (nodes, report) = remove_duplicate_prompters(nodes);
        reports.push(report);
        ensure_non_empty("deduplicate", &nodes)?;
        checkpoint("deduplicate", &nodes)?;

        let (nodes, report) = self.sampler.sample(nodes);
        reports.push(report);
        ensure_non_empty("undersample", &nodes)?;
        checkpoint("undersample", &nodes)?;

        let (mut nodes, report) = self.filter.apply(nodes)?;
        reports.push(report);

        advance_tree_states(&mut nodes, TreeState::ReadyForExport);
        checkpoint("filter", &nodes)?;
        info!(rows = nodes.len(), trees = nodes.iter().filter(|n| n.is_root()).count(), "curation complete");
        Ok(CurationOutcome { nodes, reports })
    }
}
