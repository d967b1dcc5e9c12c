// ABOUTME: Corpus persistence in CSV, JSONL, tree-document JSON and XLSX.
// ABOUTME: The text encoding is detected on read and passed explicitly to writes.

pub mod encoding;
pub mod sheet;

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::{CorpusError, Result};
use crate::models::Node;
use crate::project::{nodes_to_rows, rows_to_nodes, sheet_to_nodes, to_tree_documents, from_tree_documents, Row, TreeDocument, COLUMNS};

pub use encoding::TextEncoding;

/// On-disk shape of a corpus file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataFormat {
    Csv,
    Jsonl,
    /// Nested JSON array of tree documents.
    TreeJson,
    Xlsx,
}

impl DataFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(DataFormat::Csv),
            "jsonl" => Ok(DataFormat::Jsonl),
            "json" => Ok(DataFormat::TreeJson),
            "xlsx" => Ok(DataFormat::Xlsx),
            "" => Err(CorpusError::config(format!(
                "cannot infer data format of `{}`: no file extension",
                path.display()
            ))),
            other => Err(CorpusError::config(format!(
                "unsupported data format `.{other}` (expected csv, jsonl, json or xlsx)"
            ))),
        }
    }

    pub fn is_tree_document(self) -> bool {
        matches!(self, DataFormat::TreeJson)
    }
}

/// Fails when a tree document is involved and the text is not UTF-8.
pub fn ensure_encoding_compatible(input: DataFormat, output: DataFormat, encoding: TextEncoding) -> Result<()> {
    if input.is_tree_document() || output.is_tree_document() {
        encoding.require_utf8()?;
    }
    Ok(())
}

/// Detects the encoding of raw file bytes. Spreadsheets are binary and report UTF-8.
pub fn detect_encoding(bytes: &[u8], format: DataFormat) -> TextEncoding {
    match format {
        DataFormat::Xlsx => TextEncoding::UTF8,
        _ => TextEncoding::detect(bytes),
    }
}

/// Decodes a corpus from raw bytes.
pub fn decode_corpus(bytes: &[u8], format: DataFormat, encoding: TextEncoding) -> Result<Vec<Node>> {
    match format {
        DataFormat::Xlsx => sheet_to_nodes(&sheet::parse_xlsx(bytes)?),
        DataFormat::Csv => sheet_to_nodes(&sheet::parse_csv(&encoding.decode(bytes))?),
        DataFormat::Jsonl => {
            let text = encoding.decode(bytes);
            let rows = text
                .lines()
                .filter(|line| !line.trim().is_empty())
                .map(serde_json::from_str::<Row>)
                .collect::<std::result::Result<Vec<_>, _>>()?;
            rows_to_nodes(rows)
        }
        DataFormat::TreeJson => {
            encoding.require_utf8()?;
            let docs: Vec<TreeDocument> = serde_json::from_str(&encoding.decode(bytes))?;
            from_tree_documents(docs)
        }
    }
}

/// Encodes a corpus for writing. CSV honours `encoding`; JSON forms are always UTF-8.
pub fn encode_corpus(nodes: &[Node], format: DataFormat, encoding: TextEncoding) -> Result<Vec<u8>> {
    match format {
        DataFormat::Csv => {
            let mut writer = csv::Writer::from_writer(Vec::new());
            writer.write_record(COLUMNS)?;
            for row in nodes_to_rows(nodes) {
                writer.write_record(row.to_cells()?)?;
            }
            let bytes = writer
                .into_inner()
                .map_err(|e| CorpusError::Io(e.into_error()))?;
            let text = String::from_utf8(bytes)
                .map_err(|e| CorpusError::malformed(format!("csv writer produced invalid UTF-8: {e}")))?;
            Ok(if encoding.is_utf8() { text.into_bytes() } else { encoding.encode(&text) })
        }
        DataFormat::Jsonl => {
            let mut out = Vec::new();
            for row in nodes_to_rows(nodes) {
                serde_json::to_writer(&mut out, &row)?;
                out.push(b'\n');
            }
            Ok(out)
        }
        DataFormat::TreeJson => {
            encoding.require_utf8()?;
            Ok(serde_json::to_vec_pretty(&to_tree_documents(nodes))?)
        }
        DataFormat::Xlsx => {
            let cells = nodes_to_rows(nodes)
                .iter()
                .map(Row::to_cells)
                .collect::<Result<Vec<_>>>()?;
            sheet::write_xlsx(&sheet::RawSheet {
                headers: COLUMNS.iter().map(|c| c.to_string()).collect(),
                rows: cells,
            })
        }
    }
}

/// Reads a corpus file, returning the nodes and the detected encoding.
pub fn read_corpus(path: &Path) -> Result<(Vec<Node>, TextEncoding)> {
    if !path.is_file() {
        return Err(CorpusError::config(format!("input file not found: {}", path.display())));
    }
    let format = DataFormat::from_path(path)?;
    let bytes = fs::read(path)?;
    let encoding = detect_encoding(&bytes, format);
    let nodes = decode_corpus(&bytes, format, encoding)?;
    info!(path = %path.display(), rows = nodes.len(), encoding = %encoding, ?format, "read corpus");
    Ok((nodes, encoding))
}

/// Writes a corpus file in place. Callers wanting atomic replacement write to a temporary path first.
pub fn write_corpus(path: &Path, nodes: &[Node], encoding: TextEncoding) -> Result<()> {
    let format = DataFormat::from_path(path)?;
    let bytes = encode_corpus(nodes, format, encoding)?;
    fs::write(path, bytes)?;
    info!(path = %path.display(), rows = nodes.len(), encoding = %encoding, ?format, "wrote corpus");
    Ok(())
}
