//! Test-only fakes for the remote source, the engine and the scheduler clock.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};

use crate::core::types::{ExecutionOutcome, FileEntry, Listing, RepositoryLocation};
use crate::io::config::{SyncConfig, SyncSettings};
use crate::io::executor::CommandProcessor;
use crate::io::source::{HttpStatusError, RemoteSource};
use crate::looping::Sleeper;

/// Deterministic repository location rooted at `root_path`.
pub fn location(root_path: &str) -> RepositoryLocation {
    RepositoryLocation {
        owner: "acme".to_string(),
        repo: "mq-config".to_string(),
        root_path: root_path.to_string(),
        reference: "main".to_string(),
    }
}

/// Config for `QM1` polling `acme/mq-config` at `cfg` every 30 seconds.
///
/// Skips engine lookup so tests can pair it with scripted processors.
pub fn sync_config(engine_path: impl Into<PathBuf>) -> SyncConfig {
    SyncConfig {
        location: location("cfg"),
        token: String::new(),
        poll_interval: Duration::from_secs(30),
        queue_manager: "QM1".to_string(),
        engine_path: engine_path.into(),
        settings: SyncSettings::default(),
    }
}

/// In-memory source tree. Directory listings are derived from file paths in
/// insertion order; individual lookups can be made to fail.
#[derive(Debug, Default)]
pub struct ScriptedSource {
    dirs: HashMap<String, Vec<FileEntry>>,
    contents: HashMap<String, Vec<u8>>,
    failing_lists: HashSet<String>,
    failing_fetches: HashMap<String, String>,
    listed: RefCell<Vec<String>>,
    fetched: RefCell<Vec<String>>,
}

impl ScriptedSource {
    pub fn from_files(files: &[(&str, &str)]) -> Self {
        let mut source = Self::default();
        for (path, contents) in files {
            source.add_file(path, contents);
        }
        source
    }

    /// Add a file and register it (and any missing ancestors) in parent listings.
    pub fn add_file(&mut self, path: &str, contents: &str) {
        self.contents
            .insert(path.to_string(), contents.as_bytes().to_vec());
        let mut entry = FileEntry::file(path);
        loop {
            let parent = match entry.path.rfind('/') {
                Some(idx) => entry.path[..idx].to_string(),
                None => String::new(),
            };
            let siblings = self.dirs.entry(parent.clone()).or_default();
            if siblings.iter().any(|existing| existing.path == entry.path) {
                break;
            }
            siblings.push(entry);
            if parent.is_empty() {
                break;
            }
            entry = FileEntry::dir(parent);
        }
    }

    /// Append a raw entry to a directory listing.
    pub fn add_entry(&mut self, dir: &str, entry: FileEntry) {
        self.dirs.entry(dir.to_string()).or_default().push(entry);
    }

    pub fn fail_list(&mut self, path: &str) {
        self.failing_lists.insert(path.to_string());
    }

    /// Make fetching `path` fail with HTTP 500 and the given response body.
    pub fn fail_fetch(&mut self, path: &str, body: &str) {
        self.failing_fetches
            .insert(path.to_string(), body.to_string());
    }

    pub fn listed_paths(&self) -> Vec<String> {
        self.listed.borrow().clone()
    }

    pub fn fetched_paths(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }

    fn not_found(path: &str) -> anyhow::Error {
        HttpStatusError {
            url: format!("scripted://{path}"),
            status: 404,
            body: "{\"message\":\"Not Found\"}".to_string(),
        }
        .into()
    }
}

impl RemoteSource for ScriptedSource {
    fn list(&self, path: &str, _reference: &str) -> Result<Listing> {
        self.listed.borrow_mut().push(path.to_string());
        if self.failing_lists.contains(path) {
            return Err(anyhow!("scripted list failure for {path}"));
        }
        if self.contents.contains_key(path) {
            return Ok(Listing::File(FileEntry::file(path)));
        }
        match self.dirs.get(path) {
            Some(entries) => Ok(Listing::Directory(entries.clone())),
            None => Err(Self::not_found(path)),
        }
    }

    fn fetch(&self, path: &str, _reference: &str) -> Result<Vec<u8>> {
        self.fetched.borrow_mut().push(path.to_string());
        if let Some(body) = self.failing_fetches.get(path) {
            return Err(HttpStatusError {
                url: format!("scripted://{path}"),
                status: 500,
                body: body.clone(),
            }
            .into());
        }
        self.contents
            .get(path)
            .cloned()
            .ok_or_else(|| Self::not_found(path))
    }
}

/// Engine output used when no rule matches a batch.
pub const SUCCESS_OUTPUT: &str = "5724-H72 (C) Copyright IBM Corp. 1994, 2024.\n\
Starting MQSC for queue manager QM1.\n\
\n\
One MQSC command read.\n\
No commands have a syntax error.\n\
All valid MQSC commands were processed.\n";

#[derive(Debug, Clone)]
enum ScriptedRule {
    Outcome(ExecutionOutcome),
    SpawnError(String),
}

/// Records every batch and answers according to substring rules.
#[derive(Debug, Default)]
pub struct ScriptedProcessor {
    rules: Vec<(String, ScriptedRule)>,
    calls: RefCell<Vec<(String, String)>>,
}

impl ScriptedProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Batches containing `needle` exit with status 1 and `output`.
    pub fn fail_when_batch_contains(mut self, needle: &str, output: &str) -> Self {
        self.rules.push((
            needle.to_string(),
            ScriptedRule::Outcome(ExecutionOutcome {
                output: output.to_string(),
                success: false,
                exit_code: Some(1),
                truncated_bytes: 0,
                timed_out: false,
            }),
        ));
        self
    }

    /// Batches containing `needle` fail as if the engine could not be spawned.
    pub fn error_when_batch_contains(mut self, needle: &str, message: &str) -> Self {
        self.rules
            .push((needle.to_string(), ScriptedRule::SpawnError(message.to_string())));
        self
    }

    /// `(target, batch)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.borrow().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.borrow().len()
    }
}

impl CommandProcessor for ScriptedProcessor {
    fn execute(&self, target: &str, batch: &str) -> Result<ExecutionOutcome> {
        self.calls
            .borrow_mut()
            .push((target.to_string(), batch.to_string()));
        let rule = self
            .rules
            .iter()
            .find(|(needle, _)| batch.contains(needle.as_str()))
            .map(|(_, rule)| rule.clone());
        match rule {
            Some(ScriptedRule::Outcome(outcome)) => Ok(outcome),
            Some(ScriptedRule::SpawnError(message)) => Err(anyhow!(message)),
            None => Ok(ExecutionOutcome {
                output: SUCCESS_OUTPUT.to_string(),
                success: true,
                exit_code: Some(0),
                truncated_bytes: 0,
                timed_out: false,
            }),
        }
    }
}

/// Sleeper that records requested durations instead of blocking.
#[derive(Debug, Default)]
pub struct RecordingSleeper {
    slept: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn slept(&self) -> Vec<Duration> {
        self.slept.borrow().clone()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
    }
}

/// Executable `runmqsc` shell script living in its own temporary directory.
#[cfg(unix)]
pub struct FakeEngine {
    _dir: tempfile::TempDir,
    path: PathBuf,
}

#[cfg(unix)]
impl FakeEngine {
    /// Create the script with `body` after a `#!/bin/sh` line.
    pub fn new(body: &str) -> Result<Self> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().context("create engine dir")?;
        let path = dir.path().join("runmqsc");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n"))
            .with_context(|| format!("write {}", path.display()))?;
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
            .with_context(|| format!("chmod {}", path.display()))?;
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
