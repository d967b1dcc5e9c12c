// ABOUTME: Row Projector mapping nodes to the flat 22-column export schema and back.
// ABOUTME: Reading rows recomputes depth from parent links and validates the forest.

pub mod document;

use serde::{Deserialize, Serialize};

use crate::error::{CorpusError, Result};
use crate::io::sheet::RawSheet;
use crate::models::{recompute_depths, validate_forest, Node, Role, TreeState};

pub use document::{from_tree_documents, to_tree_documents, MessageNode, TreeDocument};

/// Export columns, in schema order.
pub const COLUMNS: [&str; 22] = [
    "message_id",
    "parent_id",
    "user_id",
    "created_date",
    "title",
    "text",
    "is_active",
    "role",
    "lang",
    "review_count",
    "review_result",
    "deleted",
    "rank",
    "synthetic",
    "model_name",
    "detoxify",
    "message_tree_id",
    "tree_state",
    "emojis",
    "labels",
    "link",
    "author_ref",
];

/// One exported row. Field order is the schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub message_id: String,
    pub parent_id: Option<String>,
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
    pub message_tree_id: String,
    pub tree_state: TreeState,
    #[serde(default)]
    pub emojis: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub link: Option<String>,
    pub author_ref: Option<String>,
}

impl Row {
    pub fn from_node(node: &Node) -> Self {
        Row {
            message_id: node.id.clone(),
            parent_id: node.parent_id.clone(),
            user_id: node.user_id.clone(),
            created_date: node.created_date.clone(),
            title: node.title.clone(),
            text: node.text.clone(),
            is_active: node.is_active,
            role: node.role,
            lang: node.lang.clone(),
            review_count: node.review_count,
            review_result: node.review_result,
            deleted: node.deleted,
            rank: node.rank,
            synthetic: node.synthetic,
            model_name: node.model_name.clone(),
            detoxify: node.detoxify.clone(),
            message_tree_id: node.tree_id.clone(),
            tree_state: node.tree_state,
            emojis: node.emojis.clone(),
            labels: node.labels.clone(),
            link: node.link.clone(),
            author_ref: node.author_ref.clone(),
        }
    }

    /// Node with depth 0; callers recompute depth once all rows are known.
    fn into_node(self) -> Node {
        Node {
            id: self.message_id,
            parent_id: self.parent_id,
            tree_id: self.message_tree_id,
            user_id: self.user_id,
            created_date: self.created_date,
            title: self.title,
            text: self.text,
            is_active: self.is_active,
            role: self.role,
            lang: self.lang,
            review_count: self.review_count,
            review_result: self.review_result,
            deleted: self.deleted,
            rank: self.rank,
            synthetic: self.synthetic,
            model_name: self.model_name,
            detoxify: self.detoxify,
            tree_state: self.tree_state,
            emojis: self.emojis,
            labels: self.labels,
            link: self.link,
            author_ref: self.author_ref,
            depth: 0,
        }
    }

    /// String cells in `COLUMNS` order. Structured fields are compact JSON; `None` is an empty cell.
    pub fn to_cells(&self) -> Result<Vec<String>> {
        Ok(vec![
            self.message_id.clone(),
            opt_cell(&self.parent_id),
            opt_cell(&self.user_id),
            opt_cell(&self.created_date),
            opt_cell(&self.title),
            self.text.clone(),
            self.is_active.to_string(),
            self.role.to_string(),
            self.lang.clone(),
            self.review_count.to_string(),
            self.review_result.to_string(),
            self.deleted.to_string(),
            self.rank.to_string(),
            self.synthetic.to_string(),
            opt_cell(&self.model_name),
            match &self.detoxify {
                Some(value) => serde_json::to_string(value)?,
                None => String::new(),
            },
            self.message_tree_id.clone(),
            self.tree_state.to_string(),
            list_cell(&self.emojis)?,
            list_cell(&self.labels)?,
            opt_cell(&self.link),
            opt_cell(&self.author_ref),
        ])
    }

    /// Parses one data row of a sheet whose header names the schema columns.
    pub fn from_cells(sheet: &RawSheet, cells: &[String]) -> Result<Self> {
        // Ids and typed cells are trimmed; free text is kept as written.
        let get = |column: &str| cell(sheet, cells, column);
        let id = |column: &str| optional_cell(sheet, cells, column);
        let text = |column: &str| text_cell(sheet, cells, column);
        let required = |column: &str| -> Result<String> {
            id(column)?.ok_or_else(|| CorpusError::malformed(format!("empty `{column}` cell")))
        };

        Ok(Row {
            message_id: required("message_id")?,
            parent_id: id("parent_id")?,
            user_id: id("user_id")?,
            created_date: text("created_date")?,
            title: text("title")?,
            text: sheet.cell(cells, "text").unwrap_or("").to_string(),
            is_active: parse_bool("is_active", get("is_active")?)?,
            role: get("role")?.parse()?,
            lang: get("lang")?.to_string(),
            review_count: parse_number("review_count", get("review_count")?)?,
            review_result: parse_bool("review_result", get("review_result")?)?,
            deleted: parse_bool("deleted", get("deleted")?)?,
            rank: parse_number("rank", get("rank")?)?,
            synthetic: parse_bool("synthetic", get("synthetic")?)?,
            model_name: text("model_name")?,
            detoxify: match id("detoxify")? {
                Some(raw) => Some(serde_json::from_str(&raw)?),
                None => None,
            },
            message_tree_id: required("message_tree_id")?,
            tree_state: get("tree_state")?.parse()?,
            emojis: parse_list(get("emojis")?)?,
            labels: parse_list(get("labels")?)?,
            link: text("link")?,
            author_ref: text("author_ref")?,
        })
    }
}

fn raw_cell<'a>(sheet: &'a RawSheet, cells: &'a [String], column: &str) -> Result<&'a str> {
    sheet
        .cell(cells, column)
        .ok_or_else(|| CorpusError::malformed(format!("missing column `{column}`")))
}

fn cell<'a>(sheet: &'a RawSheet, cells: &'a [String], column: &str) -> Result<&'a str> {
    raw_cell(sheet, cells, column).map(str::trim)
}

fn optional_cell(sheet: &RawSheet, cells: &[String], column: &str) -> Result<Option<String>> {
    let value = cell(sheet, cells, column)?;
    Ok((!value.is_empty()).then(|| value.to_string()))
}

fn text_cell(sheet: &RawSheet, cells: &[String], column: &str) -> Result<Option<String>> {
    let value = raw_cell(sheet, cells, column)?;
    Ok((!value.is_empty()).then(|| value.to_string()))
}

fn opt_cell(value: &Option<String>) -> String {
    value.clone().unwrap_or_default()
}

fn list_cell(values: &[String]) -> Result<String> {
    if values.is_empty() {
        Ok(String::new())
    } else {
        Ok(serde_json::to_string(values)?)
    }
}

fn parse_list(raw: &str) -> Result<Vec<String>> {
    if raw.is_empty() {
        Ok(Vec::new())
    } else {
        Ok(serde_json::from_str(raw)?)
    }
}

fn parse_bool(column: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" | "" => Ok(false),
        other => Err(CorpusError::malformed(format!(
            "`{column}` expects a boolean, got `{other}`"
        ))),
    }
}

fn parse_number<T: std::str::FromStr>(column: &str, raw: &str) -> Result<T> {
    let raw = if raw.is_empty() { "0" } else { raw };
    // Spreadsheets sometimes store integers as `3.0`.
    let trimmed = raw.strip_suffix(".0").unwrap_or(raw);
    trimmed
        .parse()
        .map_err(|_| CorpusError::malformed(format!("`{column}` expects an integer, got `{raw}`")))
}

pub fn nodes_to_rows(nodes: &[Node]) -> Vec<Row> {
    nodes.iter().map(Row::from_node).collect()
}

/// Rebuilds nodes from rows: depth comes from parent links, and the stored role must agree with it.
pub fn rows_to_nodes(rows: Vec<Row>) -> Result<Vec<Node>> {
    let declared: Vec<Role> = rows.iter().map(|r| r.role).collect();
    let mut nodes: Vec<Node> = rows.into_iter().map(Row::into_node).collect();
    recompute_depths(&mut nodes);
    for (node, role) in nodes.iter().zip(declared) {
        if node.role != role {
            return Err(CorpusError::malformed(format!(
                "row `{}` is stored as {role} but sits at depth {}",
                node.id, node.depth
            )));
        }
    }
    validate_forest(&nodes)?;
    Ok(nodes)
}

/// Parses every data row of `sheet` and rebuilds the forest.
pub fn sheet_to_nodes(sheet: &RawSheet) -> Result<Vec<Node>> {
    for column in COLUMNS {
        if !sheet.headers.iter().any(|h| h.trim() == column) {
            return Err(CorpusError::malformed(format!("missing column `{column}`")));
        }
    }
    let rows = sheet
        .rows
        .iter()
        .map(|cells| Row::from_cells(sheet, cells))
        .collect::<Result<Vec<_>>>()?;
    rows_to_nodes(rows)
}
