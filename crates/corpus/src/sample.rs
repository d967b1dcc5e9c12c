// ABOUTME: Ratio-bounded class balancing by under-sampling oversized groups.
// ABOUTME: Groups are tree-level categories; excess rows are removed leaf-first in reverse corpus order.

//! Under-sampling.
//!
//! With `min` the size of the smallest group and `r` the ratio, every group
//! larger than `floor(min × r)` is trimmed to exactly that size. Rows are
//! taken from the end of the corpus, and only rows that currently have no
//! surviving replies are taken, so each removal deletes exactly one row and
//! never reaches into another group. Groups are keyed on a property of the
//! tree's root, which keeps every tree inside a single group.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use tracing::{debug, info, warn};

use crate::cascade::retain_unmarked;
use crate::error::{CorpusError, Result};
use crate::models::Node;
use crate::stage::StageReport;

/// Group label used for trees with neither a profile-shaped id nor a usable link.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Tree-level category used to balance the corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GroupKey {
    /// Source profile from the tree id, else the host of the root's link.
    #[default]
    Source,
    TreeState,
    Lang,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GroupKey::Source => "source",
            GroupKey::TreeState => "tree_state",
            GroupKey::Lang => "lang",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for GroupKey {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "source" => Ok(GroupKey::Source),
            "tree_state" | "state" => Ok(GroupKey::TreeState),
            "lang" | "language" => Ok(GroupKey::Lang),
            other => Err(CorpusError::config(format!(
                "unknown group key `{other}` (expected source, tree_state or lang)"
            ))),
        }
    }
}

/// Host part of a link, if it parses as an absolute URL.
pub fn link_host(link: &str) -> Option<String> {
    let parsed = url::Url::parse(link.trim()).ok()?;
    parsed.host_str().map(|h| h.trim_start_matches("www.").to_string())
}

/// Profile prefix of a tree id shaped `{profile}-{record index}`.
pub fn tree_id_source(tree_id: &str) -> Option<&str> {
    let (prefix, index) = tree_id.rsplit_once('-')?;
    let numbered = !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit());
    (numbered && !prefix.is_empty()).then_some(prefix)
}

impl GroupKey {
    fn label(self, root: &Node) -> String {
        match self {
            GroupKey::Source => tree_id_source(&root.tree_id)
                .map(str::to_string)
                .or_else(|| root.link.as_deref().and_then(link_host))
                .unwrap_or_else(|| UNKNOWN_SOURCE.to_string()),
            GroupKey::TreeState => root.tree_state.to_string(),
            GroupKey::Lang => root.lang.clone(),
        }
    }

    /// Group label of every row, taken from its tree's root.
    pub fn labels(self, nodes: &[Node]) -> Vec<String> {
        let by_tree: HashMap<&str, String> = nodes
            .iter()
            .filter(|n| n.is_root())
            .map(|root| (root.tree_id.as_str(), self.label(root)))
            .collect();
        nodes
            .iter()
            .map(|n| {
                by_tree
                    .get(n.tree_id.as_str())
                    .cloned()
                    .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
            })
            .collect()
    }
}

/// Under-sampler with a fixed ratio and grouping key.
#[derive(Debug, Clone, Copy)]
pub struct UnderSampler {
    ratio: f64,
    key: GroupKey,
}

impl UnderSampler {
    /// Fails when `ratio` is below 1.0 or not a finite number.
    pub fn new(ratio: f64, key: GroupKey) -> Result<Self> {
        if !ratio.is_finite() || ratio < 1.0 {
            return Err(CorpusError::config(format!(
                "under-sampling ratio must be at least 1.0, got {ratio}"
            )));
        }
        Ok(Self { ratio, key })
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }

    pub fn key(&self) -> GroupKey {
        self.key
    }

    /// Largest size any group may keep, given the smallest group size.
    pub fn target(&self, min_count: usize) -> usize {
        (min_count as f64 * self.ratio).floor() as usize
    }

    pub fn sample(&self, nodes: Vec<Node>) -> (Vec<Node>, StageReport) {
        let rows_before = nodes.len();
        let labels = self.key.labels(&nodes);

        let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        for (idx, label) in labels.iter().enumerate() {
            groups.entry(label.as_str()).or_default().push(idx);
        }

        let Some(min_count) = groups.values().map(Vec::len).min() else {
            return (
                nodes,
                StageReport {
                    stage: "undersample",
                    rows_before,
                    rows_after: rows_before,
                    seeds: 0,
                },
            );
        };
        let target = self.target(min_count);
        info!(key = %self.key, groups = groups.len(), min_count, target, "under-sampling");

        let position: HashMap<&str, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (n.id.as_str(), i))
            .collect();
        let parent_of: Vec<Option<usize>> = nodes
            .iter()
            .map(|n| n.parent_id.as_deref().and_then(|p| position.get(p).copied()))
            .collect();
        let mut live_children = vec![0usize; nodes.len()];
        for parent in parent_of.iter().flatten() {
            live_children[*parent] += 1;
        }

        let mut removed = vec![false; nodes.len()];
        let mut seeds = 0;
        for (label, members) in &groups {
            let mut count = members.len();
            if count <= target {
                continue;
            }
            while count > target {
                let mut progressed = false;
                for &idx in members.iter().rev() {
                    if count == target {
                        break;
                    }
                    if removed[idx] || live_children[idx] > 0 {
                        continue;
                    }
                    removed[idx] = true;
                    if let Some(parent) = parent_of[idx] {
                        live_children[parent] -= 1;
                    }
                    count -= 1;
                    seeds += 1;
                    progressed = true;
                }
                if !progressed {
                    warn!(group = label, count, target, "no removable rows left in group");
                    break;
                }
            }
            debug!(group = label, before = members.len(), after = count, "group trimmed");
        }

        let kept = retain_unmarked(nodes, &removed);
        let report = StageReport {
            stage: "undersample",
            rows_before,
            rows_after: kept.len(),
            seeds,
        };
        report.log();
        (kept, report)
    }
}
