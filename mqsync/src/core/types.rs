//! Shared types for the discover → fetch → execute → classify pipeline.
//!
//! None of these values outlive a single cycle except [`RepositoryLocation`],
//! which is fixed at startup.

use serde::Deserialize;

/// Where configuration files are read from. Immutable for the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryLocation {
    pub owner: String,
    pub repo: String,
    /// Path inside the repository where discovery starts (empty = repository root).
    pub root_path: String,
    /// Branch, tag or commit to pin reads to (empty = default branch).
    pub reference: String,
}

/// Kind of a remote source entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    /// Symlinks, submodules and anything else the source may report.
    #[serde(other)]
    Other,
}

/// A single entry returned by the remote source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
}

impl FileEntry {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::File,
        }
    }

    pub fn dir(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Dir,
        }
    }
}

/// Result of looking up a path: either a single object or a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Listing {
    Directory(Vec<FileEntry>),
    File(FileEntry),
}

/// Returns true if `path` names a configuration file.
pub fn is_config_file(path: &str, suffix: &str) -> bool {
    path.ends_with(suffix)
}

/// Captured result of one engine invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionOutcome {
    /// Combined stdout and stderr, in arrival order.
    pub output: String,
    /// True iff the engine exited with status zero (and was not killed).
    pub success: bool,
    pub exit_code: Option<i32>,
    /// Bytes of output discarded beyond the capture limit.
    pub truncated_bytes: usize,
    pub timed_out: bool,
}

/// Observability signal derived from engine output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signal {
    /// Lowercased digest of the engine's closing status lines.
    Success { signature: String },
    /// Output too short to summarize; carries the raw text verbatim.
    Unexpected { raw: String },
}

/// How a single discovered file fared within a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// Engine exited successfully.
    Applied,
    /// Engine could not be started, exited nonzero or timed out.
    Failed,
    /// Content could not be fetched; the engine was not run.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileReport {
    pub path: String,
    pub status: FileStatus,
    /// `None` when the engine never produced output (fetch or spawn failure).
    pub signal: Option<Signal>,
}

/// Summary of one discover → process pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub discovery_failed: bool,
    pub files: Vec<FileReport>,
}

impl CycleReport {
    pub fn discovered(&self) -> usize {
        self.files.len()
    }

    pub fn count(&self, status: FileStatus) -> usize {
        self.files.iter().filter(|file| file.status == status).count()
    }
}
