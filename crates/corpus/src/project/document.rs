// ABOUTME: Nested tree-document form of the corpus: one document per conversation tree.
// ABOUTME: Flattening is pre-order with siblings in rank order; nesting and flattening are inverses.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{rows_to_nodes, Row};
use crate::error::{CorpusError, Result};
use crate::models::{Node, TreeState};

/// One turn with its replies nested beneath it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageNode {
    #[serde(flatten)]
    pub row: Row,
    #[serde(default)]
    pub replies: Vec<MessageNode>,
}

/// A whole conversation tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TreeDocument {
    pub message_tree_id: String,
    pub tree_state: TreeState,
    pub prompt: MessageNode,
}

fn nest(nodes: &[Node], children: &HashMap<&str, Vec<usize>>, idx: usize) -> MessageNode {
    let replies = children
        .get(nodes[idx].id.as_str())
        .map(|kids| kids.iter().map(|&k| nest(nodes, children, k)).collect())
        .unwrap_or_default();
    MessageNode {
        row: Row::from_node(&nodes[idx]),
        replies,
    }
}

/// Groups `nodes` into one document per tree, in order of first root appearance.
pub fn to_tree_documents(nodes: &[Node]) -> Vec<TreeDocument> {
    let mut children: HashMap<&str, Vec<usize>> = HashMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        if let Some(parent) = node.parent_id.as_deref() {
            children.entry(parent).or_default().push(idx);
        }
    }
    for kids in children.values_mut() {
        kids.sort_by_key(|&k| nodes[k].rank);
    }

    nodes
        .iter()
        .enumerate()
        .filter(|(_, n)| n.is_root())
        .map(|(idx, root)| TreeDocument {
            message_tree_id: root.tree_id.clone(),
            tree_state: root.tree_state,
            prompt: nest(nodes, &children, idx),
        })
        .collect()
}

fn flatten_into(message: MessageNode, tree_id: &str, parent: Option<&str>, out: &mut Vec<Row>) -> Result<()> {
    let mut row = message.row;
    if row.message_tree_id != tree_id {
        return Err(CorpusError::malformed(format!(
            "message `{}` belongs to tree `{}` but is nested in `{tree_id}`",
            row.message_id, row.message_tree_id
        )));
    }
    row.parent_id = parent.map(str::to_string);
    let id = row.message_id.clone();
    out.push(row);
    for reply in message.replies {
        flatten_into(reply, tree_id, Some(&id), out)?;
    }
    Ok(())
}

/// Flattens documents back into corpus-ordered nodes. Nesting decides `parent_id`.
pub fn from_tree_documents(docs: Vec<TreeDocument>) -> Result<Vec<Node>> {
    let mut rows = Vec::new();
    for doc in docs {
        flatten_into(doc.prompt, &doc.message_tree_id, None, &mut rows)?;
    }
    rows_to_nodes(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeDefaults;
    use crate::tree::{DocumentFields, ThreadFragments, TreeBuilder};
    use pretty_assertions::assert_eq;

    fn corpus() -> Vec<Node> {
        let builder = TreeBuilder::default();
        let fragments = ThreadFragments {
            all: vec!["t0".into(), "n0".into(), "t1".into()],
            top: vec!["t0".into(), "t1".into()],
            nested: Some(vec!["n0".into()]),
            dates: None,
        };
        let mut nodes = builder
            .build("a", &DocumentFields { body: "qa".into(), ..Default::default() }, &fragments)
            .nodes;
        nodes.extend(
            builder
                .build("b", &DocumentFields { body: "qb".into(), ..Default::default() }, &ThreadFragments::default())
                .nodes,
        );
        nodes
    }

    #[test]
    fn one_document_per_tree_with_nested_replies() {
        let docs = to_tree_documents(&corpus());
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].message_tree_id, "a");
        let replies: Vec<_> = docs[0].prompt.replies.iter().map(|r| r.row.text.as_str()).collect();
        assert_eq!(replies, vec!["t0", "t1"]);
        assert_eq!(docs[0].prompt.replies[0].replies[0].row.text, "n0");
        assert!(docs[1].prompt.replies.is_empty());
    }

    #[test]
    fn flattening_restores_the_corpus() {
        let nodes = corpus();
        let docs = to_tree_documents(&nodes);
        let json = serde_json::to_string_pretty(&docs).unwrap();
        let parsed: Vec<TreeDocument> = serde_json::from_str(&json).unwrap();
        assert_eq!(from_tree_documents(parsed).unwrap(), nodes);
    }

    #[test]
    fn siblings_follow_rank_order() {
        let d = NodeDefaults::default();
        let nodes = vec![
            d.node("r".into(), None, "t", 0, 0, "q".into()),
            d.node("second".into(), Some("r".into()), "t", 1, 1, "b".into()),
            d.node("first".into(), Some("r".into()), "t", 1, 0, "a".into()),
        ];
        let docs = to_tree_documents(&nodes);
        let ids: Vec<_> = docs[0].prompt.replies.iter().map(|r| r.row.message_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
    }

    #[test]
    fn reply_from_another_tree_is_rejected() {
        let mut docs = to_tree_documents(&corpus());
        docs[0].prompt.replies[0].row.message_tree_id = "b".into();
        assert!(from_tree_documents(docs).is_err());
    }
}
