// ABOUTME: Source adapter turning scraped XML documents into conversation trees.
// ABOUTME: Re-exports profiles, record reading, fragment extraction and date normalisation.

//! Threadset source adapter.
//!
//! A scraped document is an XML file of post records. Each record's comment
//! HTML is run through the selector set of a [`SourceProfile`], and the
//! resulting fragments are handed to the corpus crate's tree builder.

pub mod compiled;
pub mod date;
pub mod error;
pub mod extract;
pub mod profiles;
pub mod record;

use std::fs;
use std::path::Path;

use threadset_corpus::{BuiltTree, TextEncoding, ThreadFragments, TreeBuilder};
use tracing::{info, warn};

pub use crate::date::normalize_date;
pub use crate::error::{Result, SourceError};
pub use crate::extract::{document_fields, extract_fragments};
pub use crate::profiles::{ProfileRegistry, SelectorSet, SourceProfile};
pub use crate::record::{read_records, XmlRecord};

/// Decodes raw document bytes, detecting the charset when there is no BOM.
pub fn decode_document(bytes: &[u8]) -> String {
    let encoding = TextEncoding::detect(bytes);
    if !encoding.is_utf8() {
        info!(encoding = %encoding, "decoding non-UTF-8 source document");
    }
    encoding.decode(bytes)
}

/// Builds one tree per record. Tree ids are `{profile}-{record index}`.
pub fn build_trees(records: &[XmlRecord], profile: &SourceProfile, builder: &TreeBuilder) -> Vec<BuiltTree> {
    records
        .iter()
        .enumerate()
        .map(|(index, record)| {
            let fragments = match record.comment_html.as_deref() {
                Some(html) => extract_fragments(html, &profile.selectors),
                None => ThreadFragments {
                    nested: profile.selectors.nested.as_ref().map(|_| Vec::new()),
                    dates: profile.selectors.date.as_ref().map(|_| Vec::new()),
                    ..Default::default()
                },
            };
            let tree_id = format!("{}-{index}", profile.name);
            let built = builder.build(&tree_id, &document_fields(record, profile), &fragments);
            if !built.report.mismatches.is_empty() {
                warn!(tree_id, mismatches = built.report.mismatches.len(), "fragments placed as top-level");
            }
            built
        })
        .collect()
}

/// Reads an XML document from disk and builds its trees.
pub fn load_document(path: &Path, profile: &SourceProfile, builder: &TreeBuilder) -> Result<Vec<BuiltTree>> {
    let bytes = fs::read(path)?;
    let records = read_records(&decode_document(&bytes))?;
    let trees = build_trees(&records, profile, builder);
    info!(
        path = %path.display(),
        profile = %profile.name,
        trees = trees.len(),
        rows = trees.iter().map(|t| t.nodes.len()).sum::<usize>(),
        "built trees from source document"
    );
    Ok(trees)
}
