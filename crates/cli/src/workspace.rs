// ABOUTME: Scoped working copy for a curate run and atomic output replacement.
// ABOUTME: The working directory sits next to the output and is removed on every exit path.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::{NamedTempFile, TempDir};
use threadset_corpus::io::{encode_corpus, DataFormat, TextEncoding};
use threadset_corpus::Node;
use tracing::debug;

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Temporary directory holding the input copy and per-stage checkpoints.
pub struct WorkingCopy {
    dir: TempDir,
    input: PathBuf,
    checkpoints: usize,
}

impl WorkingCopy {
    /// Copies `input` into a fresh hidden directory beside `output`.
    pub fn create(input: &Path, output: &Path) -> Result<Self> {
        let parent = parent_dir(output);
        fs::create_dir_all(&parent)
            .with_context(|| format!("creating output directory {}", parent.display()))?;
        let dir = tempfile::Builder::new()
            .prefix(".threadset-work-")
            .tempdir_in(&parent)
            .with_context(|| format!("creating working copy in {}", parent.display()))?;
        let name = input.file_name().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("input"));
        let copy = dir.path().join(name);
        fs::copy(input, &copy).with_context(|| format!("copying {}", input.display()))?;
        debug!(dir = %dir.path().display(), "created working copy");
        Ok(Self { dir, input: copy, checkpoints: 0 })
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Saves the corpus after `stage` as JSONL.
    pub fn checkpoint(&mut self, stage: &str, nodes: &[Node]) -> threadset_corpus::Result<PathBuf> {
        self.checkpoints += 1;
        let path = self.dir.path().join(format!("{:02}-{stage}.jsonl", self.checkpoints));
        let bytes = encode_corpus(nodes, DataFormat::Jsonl, TextEncoding::UTF8)?;
        fs::write(&path, bytes)?;
        debug!(stage, path = %path.display(), rows = nodes.len(), "checkpoint written");
        Ok(path)
    }
}

/// Writes `bytes` to a temporary file beside `path` and renames it into place.
pub fn atomic_write(path: &Path, bytes: &[u8]) -> Result<()> {
    let parent = parent_dir(path);
    fs::create_dir_all(&parent)?;
    let mut tmp = NamedTempFile::new_in(&parent)
        .with_context(|| format!("creating temporary file in {}", parent.display()))?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}
