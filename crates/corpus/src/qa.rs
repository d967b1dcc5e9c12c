// ABOUTME: QA Splitter separating comment blocks that hold both a question and its answer.
// ABOUTME: Splits at the first answer marker and pushes the answer one level deeper.

use std::collections::HashMap;

use aho_corasick::{AhoCorasick, MatchKind};
use tracing::{debug, info};

use crate::error::{CorpusError, Result};
use crate::models::{recompute_depths, Node};

/// Answer lead-ins used by Q&A style comment blocks.
pub const DEFAULT_MARKERS: &[&str] = &["A.", "답변"];

/// Shape of the data the pipeline is currently holding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataShape {
    Table,
    TreeDocument,
}

/// Decides whether a QA split pass applies to a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QaGate {
    pub source_supports_qa: bool,
    pub shape: DataShape,
}

impl QaGate {
    pub fn allows(&self) -> bool {
        self.source_supports_qa && self.shape == DataShape::Table
    }
}

/// Splits nodes at the first occurrence of any marker.
#[derive(Debug, Clone)]
pub struct QaSplitter {
    matcher: AhoCorasick,
}

impl QaSplitter {
    pub fn new<I, S>(markers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let markers: Vec<String> = markers
            .into_iter()
            .map(|m| m.as_ref().to_string())
            .filter(|m| !m.is_empty())
            .collect();
        if markers.is_empty() {
            return Err(CorpusError::config("at least one QA marker is required"));
        }
        let matcher = AhoCorasick::builder()
            .match_kind(MatchKind::LeftmostFirst)
            .build(&markers)
            .map_err(|e| CorpusError::config(format!("invalid QA markers: {e}")))?;
        Ok(Self { matcher })
    }

    /// Byte offset of the first marker occurrence in `text`.
    ///
    /// Text that already opens with a marker is an answer on its own and has no split point,
    /// even when a later marker follows.
    pub fn split_point(&self, text: &str) -> Option<usize> {
        let first = self.matcher.find(text)?;
        (first.start() > 0).then_some(first.start())
    }

    /// Splits one node in place, returning the new answer turn if a marker was found.
    pub fn split_node(&self, node: &mut Node) -> Option<Node> {
        let k = self.split_point(&node.text)?;
        let answer_text = node.text.split_off(k);

        let mut answer = node.clone();
        answer.id = format!("{}-qa", node.id);
        answer.parent_id = Some(node.id.clone());
        answer.text = answer_text;
        answer.rank = 0;
        answer.title = None;
        answer.link = None;
        answer.author_ref = None;
        answer.set_depth(node.depth + 1);
        debug_assert_eq!(answer.role, node.role.flipped());
        Some(answer)
    }

    /// Applies the split to every node in corpus order.
    ///
    /// Each answer turn is inserted right after its origin and becomes the origin's
    /// only child: former children move under the answer and their subtrees sink one level.
    pub fn split_corpus(&self, nodes: Vec<Node>, gate: QaGate) -> Vec<Node> {
        if !gate.allows() {
            info!(
                source_supports_qa = gate.source_supports_qa,
                shape = ?gate.shape,
                "QA split not applicable; skipping"
            );
            return nodes;
        }

        let mut out = Vec::with_capacity(nodes.len());
        let mut adopted: HashMap<String, String> = HashMap::new();
        for mut node in nodes {
            match self.split_node(&mut node) {
                Some(answer) => {
                    debug!(id = %node.id, answer = %answer.id, "split combined question/answer");
                    adopted.insert(node.id.clone(), answer.id.clone());
                    out.push(node);
                    out.push(answer);
                }
                None => out.push(node),
            }
        }

        if !adopted.is_empty() {
            for node in out.iter_mut() {
                let Some(parent) = node.parent_id.as_deref() else {
                    continue;
                };
                if let Some(answer_id) = adopted.get(parent) {
                    if *answer_id != node.id {
                        node.parent_id = Some(answer_id.clone());
                    }
                }
            }
            recompute_depths(&mut out);
            info!(splits = adopted.len(), "QA split complete");
        }
        out
    }
}
