// ABOUTME: Core library for building and curating conversation-tree datasets.
// ABOUTME: Provides the tree model, tree building, QA splitting, dedup, sampling, filtering and I/O.

pub mod cascade;
pub mod dedup;
pub mod error;
pub mod filter;
pub mod io;
pub mod models;
pub mod pipeline;
pub mod project;
pub mod qa;
pub mod sample;
pub mod stage;
pub mod tree;

pub use cascade::cascade_remove;
pub use dedup::{dedup_key, remove_duplicate_prompters};
pub use error::{CorpusError, Result};
pub use filter::{CancelFlag, Denylist, ParallelFilter};
pub use io::{read_corpus, write_corpus, DataFormat, TextEncoding};
pub use models::{validate_forest, Node, NodeDefaults, Role, TreeState};
pub use pipeline::{Curation, CurationOutcome};
pub use project::{Row, TreeDocument, COLUMNS};
pub use qa::{DataShape, QaGate, QaSplitter, DEFAULT_MARKERS};
pub use sample::{GroupKey, UnderSampler};
pub use stage::StageReport;
pub use tree::{BuildReport, BuiltTree, DocumentFields, ThreadFragments, TreeBuilder};
