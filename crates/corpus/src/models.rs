// ABOUTME: Core conversation-tree models: Node, Role, TreeState and NodeDefaults.
// ABOUTME: Also validates forest invariants (single root, resolvable parents, depth/role parity).

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CorpusError, Result};

/// Conversational role of a turn, fixed by depth parity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Prompter,
    Assistant,
}

impl Role {
    /// Prompter on even depths, assistant on odd ones.
    pub fn for_depth(depth: u32) -> Self {
        if depth % 2 == 0 {
            Role::Prompter
        } else {
            Role::Assistant
        }
    }

    pub fn flipped(self) -> Self {
        match self {
            Role::Prompter => Role::Assistant,
            Role::Assistant => Role::Prompter,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Prompter => "prompter",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "prompter" => Ok(Role::Prompter),
            "assistant" => Ok(Role::Assistant),
            other => Err(CorpusError::malformed(format!("unknown role `{other}`"))),
        }
    }
}

/// Lifecycle stage of a tree. Declaration order is the only allowed direction of travel.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum TreeState {
    #[default]
    Initial,
    Growing,
    ReadyForExport,
    AbortedLowGrade,
    HaltedByModerator,
}

impl TreeState {
    pub fn as_str(self) -> &'static str {
        match self {
            TreeState::Initial => "initial",
            TreeState::Growing => "growing",
            TreeState::ReadyForExport => "ready_for_export",
            TreeState::AbortedLowGrade => "aborted_low_grade",
            TreeState::HaltedByModerator => "halted_by_moderator",
        }
    }

    /// Moves to `next` if that is a forward transition; returns whether the state changed.
    pub fn advance(&mut self, next: TreeState) -> bool {
        if next > *self {
            *self = next;
            true
        } else {
            if next < *self {
                tracing::debug!(from = self.as_str(), to = next.as_str(), "ignoring backward tree_state transition");
            }
            false
        }
    }
}

impl fmt::Display for TreeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TreeState {
    type Err = CorpusError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "initial" => Ok(TreeState::Initial),
            "growing" => Ok(TreeState::Growing),
            "ready_for_export" => Ok(TreeState::ReadyForExport),
            "aborted_low_grade" => Ok(TreeState::AbortedLowGrade),
            "halted_by_moderator" => Ok(TreeState::HaltedByModerator),
            other => Err(CorpusError::malformed(format!("unknown tree_state `{other}`"))),
        }
    }
}

/// One conversation turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub parent_id: Option<String>,
    pub tree_id: String,
    pub user_id: Option<String>,
    pub created_date: Option<String>,
    pub title: Option<String>,
    pub text: String,
    pub is_active: bool,
    pub role: Role,
    pub lang: String,
    pub review_count: i64,
    pub review_result: bool,
    pub deleted: bool,
    pub rank: u32,
    pub synthetic: bool,
    pub model_name: Option<String>,
    pub detoxify: Option<serde_json::Value>,
    pub tree_state: TreeState,
    pub emojis: Vec<String>,
    pub labels: Vec<String>,
    pub link: Option<String>,
    pub author_ref: Option<String>,
    pub depth: u32,
}

impl Node {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Sets depth and the role that goes with it.
    pub fn set_depth(&mut self, depth: u32) {
        self.depth = depth;
        self.role = Role::for_depth(depth);
    }
}

/// Field values stamped on freshly built nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeDefaults {
    pub lang: String,
    pub user_id: Option<String>,
    pub is_active: bool,
    pub review_count: i64,
    pub review_result: bool,
    pub synthetic: bool,
    pub model_name: Option<String>,
    pub detoxify: Option<serde_json::Value>,
}

impl Default for NodeDefaults {
    fn default() -> Self {
        Self {
            lang: "ko".to_string(),
            user_id: None,
            is_active: true,
            review_count: 0,
            review_result: true,
            synthetic: false,
            model_name: None,
            detoxify: None,
        }
    }
}

impl NodeDefaults {
    /// Creates a node with these defaults; role follows depth.
    pub fn node(
        &self,
        id: String,
        parent_id: Option<String>,
        tree_id: &str,
        depth: u32,
        rank: u32,
        text: String,
    ) -> Node {
        Node {
            id,
            parent_id,
            tree_id: tree_id.to_string(),
            user_id: self.user_id.clone(),
            created_date: None,
            title: None,
            text,
            is_active: self.is_active,
            role: Role::for_depth(depth),
            lang: self.lang.clone(),
            review_count: self.review_count,
            review_result: self.review_result,
            deleted: false,
            rank,
            synthetic: self.synthetic,
            model_name: self.model_name.clone(),
            detoxify: self.detoxify.clone(),
            tree_state: TreeState::Initial,
            emojis: Vec::new(),
            labels: Vec::new(),
            link: None,
            author_ref: None,
            depth,
        }
    }
}

/// Advances every node of every tree present in `nodes` to `state`.
pub fn advance_tree_states(nodes: &mut [Node], state: TreeState) {
    for node in nodes.iter_mut() {
        node.tree_state.advance(state);
    }
}

/// Recomputes every node's depth (and role) from its parent chain.
///
/// Nodes whose chain does not reach a root, or loops, keep their current depth.
pub fn recompute_depths(nodes: &mut [Node]) {
    let index: HashMap<String, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, n)| (n.id.clone(), i))
        .collect();
    let mut resolved: Vec<Option<u32>> = vec![None; nodes.len()];

    for start in 0..nodes.len() {
        let mut chain = Vec::new();
        let mut cursor = Some(start);
        let mut base = None;
        while let Some(idx) = cursor {
            if let Some(depth) = resolved[idx] {
                base = Some(depth);
                break;
            }
            if chain.len() > nodes.len() {
                break;
            }
            chain.push(idx);
            cursor = match nodes[idx].parent_id.as_deref() {
                None => {
                    chain.pop();
                    resolved[idx] = Some(0);
                    base = Some(0);
                    None
                }
                Some(parent) => match index.get(parent) {
                    Some(&p) => Some(p),
                    None => None,
                },
            };
        }
        if let Some(mut depth) = base {
            for &idx in chain.iter().rev() {
                depth += 1;
                resolved[idx] = Some(depth);
            }
        }
    }

    for (node, depth) in nodes.iter_mut().zip(resolved) {
        if let Some(depth) = depth {
            node.set_depth(depth);
        }
    }
}

/// Checks single-root, parent resolution, depth and role invariants, plus id uniqueness.
pub fn validate_forest(nodes: &[Node]) -> Result<()> {
    let mut by_id: HashMap<&str, &Node> = HashMap::with_capacity(nodes.len());
    for node in nodes {
        if by_id.insert(node.id.as_str(), node).is_some() {
            return Err(CorpusError::malformed(format!("duplicate id `{}`", node.id)));
        }
    }

    let mut roots: HashSet<&str> = HashSet::new();
    for node in nodes {
        if node.role != Role::for_depth(node.depth) {
            return Err(CorpusError::malformed(format!(
                "node `{}` at depth {} has role {}",
                node.id, node.depth, node.role
            )));
        }
        match node.parent_id.as_deref() {
            None => {
                if node.depth != 0 {
                    return Err(CorpusError::malformed(format!(
                        "root `{}` has depth {}",
                        node.id, node.depth
                    )));
                }
                if !roots.insert(node.tree_id.as_str()) {
                    return Err(CorpusError::malformed(format!(
                        "tree `{}` has more than one root",
                        node.tree_id
                    )));
                }
            }
            Some(parent_id) => {
                let parent = by_id.get(parent_id).ok_or_else(|| {
                    CorpusError::malformed(format!(
                        "node `{}` references missing parent `{parent_id}`",
                        node.id
                    ))
                })?;
                if parent.tree_id != node.tree_id {
                    return Err(CorpusError::malformed(format!(
                        "node `{}` and parent `{parent_id}` belong to different trees",
                        node.id
                    )));
                }
                if node.depth != parent.depth + 1 {
                    return Err(CorpusError::malformed(format!(
                        "node `{}` has depth {} under parent at depth {}",
                        node.id, node.depth, parent.depth
                    )));
                }
            }
        }
    }

    for node in nodes {
        if !roots.contains(node.tree_id.as_str()) {
            return Err(CorpusError::malformed(format!("tree `{}` has no root", node.tree_id)));
        }
    }
    Ok(())
}
