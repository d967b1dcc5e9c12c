// ABOUTME: Tree Builder reconciling flat, selector-tagged fragments into one conversation tree.
// ABOUTME: Classifies fragments as top-level or nested by ordered subsequence matching.

//! Conversation tree reconstruction.
//!
//! A source adapter hands over three ordered fragment sequences for one
//! document: every comment (`all`), the top-level comments (`top`) and the
//! replies to top-level comments (`nested`). Both subsets are literal
//! subsequences of `all`, so classification walks `all` once with one cursor
//! per subset:
//!
//! - a fragment equal to the next unmatched `top` element is a depth-1 turn
//!   under the root;
//! - otherwise a fragment equal to the next unmatched `nested` element is a
//!   depth-2 turn under the latest depth-1 turn;
//! - anything else is an extraction mismatch: it is kept as a top-level turn
//!   and reported.
//!
//! Repeated texts ("감사합니다") can match both cursors at once. When every
//! fragment belongs to exactly one subset, [`plan_slots`] aligns the whole
//! document up front so that both subsets are consumed completely; among
//! equally valid alignments a reply is preferred over a new top-level turn.
//! Inputs that cannot be aligned fall back to the cursor walk above.

use tracing::{info, warn};

use crate::models::{Node, NodeDefaults, TreeState};

/// Flat fragments extracted from one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ThreadFragments {
    pub all: Vec<String>,
    pub top: Vec<String>,
    /// `None` when the source has no nested level.
    pub nested: Option<Vec<String>>,
    /// Dates aligned with `all`; `None` when the source has no date selector.
    pub dates: Option<Vec<String>>,
}

/// Document-level fields that become the root turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentFields {
    pub title: Option<String>,
    pub body: String,
    pub link: Option<String>,
    pub author_ref: Option<String>,
    pub created_date: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MismatchKind {
    /// Found in neither the top nor the nested subset.
    Unclassified,
    /// Classified as nested but no top-level turn precedes it.
    OrphanReply,
}

/// A fragment that could not be placed as the extractor claimed.
#[derive(Debug, Clone, PartialEq)]
pub struct Mismatch {
    pub position: usize,
    pub kind: MismatchKind,
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildReport {
    pub top_level: usize,
    pub nested: usize,
    pub mismatches: Vec<Mismatch>,
}

/// A built tree in pre-order (root first, each reply after its parent).
#[derive(Debug, Clone, PartialEq)]
pub struct BuiltTree {
    pub nodes: Vec<Node>,
    pub report: BuildReport,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Top,
    Nested,
    Unclassified,
}

fn same_text(a: &str, b: &str) -> bool {
    a.split_whitespace().eq(b.split_whitespace())
}

/// Assigns every fragment of `all` to `top` or `nested` so that both are consumed in order.
///
/// Returns `None` unless `all` is exactly an interleaving of the two subsets with no reply
/// before the first top-level fragment.
fn plan_slots(all: &[String], top: &[String], nested: &[String]) -> Option<Vec<Slot>> {
    let (a, t_len, n_len) = (all.len(), top.len(), nested.len());
    if a != t_len + n_len {
        return None;
    }
    let width = t_len + 1;
    // reachable[i * width + t]: all[i..] can finish the alignment after t top fragments.
    let mut reachable = vec![false; (a + 1) * width];
    reachable[a * width + t_len] = true;
    let top_fits = |i: usize, t: usize| t < t_len && same_text(&all[i], &top[t]);
    let nested_fits = |i: usize, t: usize| {
        let n = i - t;
        t > 0 && n < n_len && same_text(&all[i], &nested[n])
    };
    for i in (0..a).rev() {
        for t in i.saturating_sub(n_len)..=i.min(t_len) {
            reachable[i * width + t] = (top_fits(i, t) && reachable[(i + 1) * width + t + 1])
                || (nested_fits(i, t) && reachable[(i + 1) * width + t]);
        }
    }
    if !reachable[0] {
        return None;
    }

    let mut slots = Vec::with_capacity(a);
    let mut t = 0;
    for i in 0..a {
        if nested_fits(i, t) && reachable[(i + 1) * width + t] {
            slots.push(Slot::Nested);
        } else {
            slots.push(Slot::Top);
            t += 1;
        }
    }
    Some(slots)
}

/// Returns the index in `subset` of the first element that cannot be matched, in order, within `all`.
pub fn check_subsequence(all: &[String], subset: &[String]) -> Option<usize> {
    let mut cursor = 0;
    for candidate in all {
        if cursor < subset.len() && same_text(candidate, &subset[cursor]) {
            cursor += 1;
        }
    }
    if cursor == subset.len() {
        None
    } else {
        Some(cursor)
    }
}

/// Builds conversation trees with fixed node defaults.
#[derive(Debug, Clone, Default)]
pub struct TreeBuilder {
    defaults: NodeDefaults,
}

impl TreeBuilder {
    pub fn new(defaults: NodeDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &NodeDefaults {
        &self.defaults
    }

    /// Builds the tree for one document. Node ids are `{tree_id}-{ordinal}`, the root being ordinal 0.
    pub fn build(&self, tree_id: &str, doc: &DocumentFields, fragments: &ThreadFragments) -> BuiltTree {
        let mut report = BuildReport::default();
        let root_id = format!("{tree_id}-0");

        let mut root = self
            .defaults
            .node(root_id.clone(), None, tree_id, 0, 0, doc.body.clone());
        root.title = doc.title.clone();
        root.link = doc.link.clone();
        root.author_ref = doc.author_ref.clone();
        root.created_date = doc.created_date.clone();

        let mut nodes = vec![root];

        if fragments.all.is_empty() {
            info!(tree_id, "document has no comments; emitting root-only tree");
        }

        if let Some(nested) = &fragments.nested {
            if let Some(idx) = check_subsequence(&fragments.all, nested) {
                warn!(tree_id, index = idx, "nested fragments are not an ordered subsequence of all comments");
            }
        }
        if let Some(idx) = check_subsequence(&fragments.all, &fragments.top) {
            warn!(tree_id, index = idx, "top-level fragments are not an ordered subsequence of all comments");
        }

        let plan = fragments
            .nested
            .as_deref()
            .and_then(|nested| plan_slots(&fragments.all, &fragments.top, nested));

        let mut top_cursor = 0usize;
        let mut nested_cursor = 0usize;
        let mut current_top: Option<String> = None;
        let mut nested_rank = 0u32;
        let mut top_rank = 0u32;

        for (position, text) in fragments.all.iter().enumerate() {
            let slot = match (&plan, &fragments.nested) {
                (Some(plan), _) => plan[position],
                (None, None) => Slot::Top,
                (None, Some(nested)) => {
                    if top_cursor < fragments.top.len() && same_text(text, &fragments.top[top_cursor]) {
                        top_cursor += 1;
                        Slot::Top
                    } else if nested_cursor < nested.len() && same_text(text, &nested[nested_cursor]) {
                        nested_cursor += 1;
                        Slot::Nested
                    } else {
                        Slot::Unclassified
                    }
                }
            };

            let created_date = fragments
                .dates
                .as_ref()
                .and_then(|dates| dates.get(position))
                .filter(|d| !d.trim().is_empty())
                .cloned();
            let placed_as_reply = match (slot, &current_top) {
                (Slot::Nested, Some(parent_id)) => {
                    let mut node = self.defaults.node(
                        format!("{tree_id}-{}", nodes.len()),
                        Some(parent_id.clone()),
                        tree_id,
                        2,
                        nested_rank,
                        text.clone(),
                    );
                    node.created_date = created_date.clone();
                    nodes.push(node);
                    nested_rank += 1;
                    report.nested += 1;
                    true
                }
                (Slot::Nested, None) => {
                    warn!(tree_id, position, "reply precedes any top-level comment; keeping it top-level");
                    report.mismatches.push(Mismatch {
                        position,
                        kind: MismatchKind::OrphanReply,
                        text: text.clone(),
                    });
                    false
                }
                (Slot::Unclassified, _) => {
                    warn!(tree_id, position, "fragment matches neither top nor nested level; keeping it top-level");
                    report.mismatches.push(Mismatch {
                        position,
                        kind: MismatchKind::Unclassified,
                        text: text.clone(),
                    });
                    false
                }
                (Slot::Top, _) => false,
            };

            if !placed_as_reply {
                let id = format!("{tree_id}-{}", nodes.len());
                let mut node = self
                    .defaults
                    .node(id.clone(), Some(root_id.clone()), tree_id, 1, top_rank, text.clone());
                node.created_date = created_date;
                nodes.push(node);
                current_top = Some(id);
                top_rank += 1;
                nested_rank = 0;
                report.top_level += 1;
            }
        }

        let state = if nodes.len() > 1 {
            TreeState::Growing
        } else {
            TreeState::Initial
        };
        for node in nodes.iter_mut() {
            node.tree_state = state;
        }

        info!(
            tree_id,
            top_level = report.top_level,
            nested = report.nested,
            mismatches = report.mismatches.len(),
            "built conversation tree"
        );
        BuiltTree { nodes, report }
    }
}
