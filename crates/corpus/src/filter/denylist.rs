// ABOUTME: Denylist terms loaded once from a CSV or XLSX filter file.
// ABOUTME: Case-insensitive substring matching over lower-cased terms with aho-corasick.

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use aho_corasick::AhoCorasick;

use crate::error::{CorpusError, Result};
use crate::io::encoding::TextEncoding;
use crate::io::sheet::{parse_csv, parse_xlsx, RawSheet};

/// Immutable set of exclusion terms.
#[derive(Debug, Clone)]
pub struct Denylist {
    terms: Vec<String>,
    matcher: AhoCorasick,
}

impl Denylist {
    /// Builds a denylist from raw terms; blanks are dropped, the rest trimmed, lower-cased and deduplicated.
    pub fn new<I, S>(terms: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let terms: Vec<String> = terms
            .into_iter()
            .map(|t| t.as_ref().trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let matcher = AhoCorasick::new(&terms)
            .map_err(|e| CorpusError::config(format!("invalid denylist: {e}")))?;
        Ok(Self { terms, matcher })
    }

    /// Loads every non-empty cell below the header row of a `.csv` or `.xlsx` file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(CorpusError::config(format!(
                "filter file not found: {}",
                path.display()
            )));
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let bytes = fs::read(path)?;
        let sheet = match ext.as_str() {
            "csv" => parse_csv(&TextEncoding::detect(&bytes).decode(&bytes))?,
            "xlsx" => parse_xlsx(&bytes)?,
            other => {
                return Err(CorpusError::config(format!(
                    "unsupported filter file type `.{other}` (expected .csv or .xlsx)"
                )))
            }
        };
        let list = Self::from_sheet(&sheet)?;
        tracing::info!(path = %path.display(), terms = list.len(), "loaded denylist");
        Ok(list)
    }

    pub fn from_sheet(sheet: &RawSheet) -> Result<Self> {
        Self::new(sheet.rows.iter().flatten())
    }

    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// True if any term occurs in `text`, ignoring case.
    pub fn matches(&self, text: &str) -> bool {
        if self.terms.is_empty() || text.is_empty() {
            return false;
        }
        self.matcher.is_match(&text.to_lowercase())
    }
}
