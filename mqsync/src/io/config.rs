//! Startup configuration: required environment values plus an optional TOML tuning file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

use crate::core::interval::parse_interval;
use crate::core::types::RepositoryLocation;
use crate::io::executor::locate_engine;

/// Tuning knobs (TOML).
///
/// Every field is optional in the file; missing fields take the defaults below.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SyncSettings {
    /// File name suffix that marks a configuration file.
    pub suffix: String,

    /// Engine executable, looked up on `PATH` unless it is a path.
    pub engine_program: String,

    /// Base URL of the repository-hosting REST API.
    pub api_base: String,

    /// Per-request timeout for remote source calls, in seconds.
    pub http_timeout_secs: u64,

    /// Kill the engine after this many seconds. Unset waits indefinitely.
    pub exec_timeout_secs: Option<u64>,

    /// Keep at most this many bytes of engine output per file.
    pub output_limit_bytes: usize,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            suffix: ".mqsc".to_string(),
            engine_program: "runmqsc".to_string(),
            api_base: "https://api.github.com".to_string(),
            http_timeout_secs: 30,
            exec_timeout_secs: None,
            output_limit_bytes: 1_000_000,
        }
    }
}

impl SyncSettings {
    pub fn validate(&self) -> Result<()> {
        if self.suffix.is_empty() {
            return Err(anyhow!("suffix must not be empty"));
        }
        if self.engine_program.trim().is_empty() {
            return Err(anyhow!("engine_program must not be empty"));
        }
        if self.api_base.trim().is_empty() {
            return Err(anyhow!("api_base must not be empty"));
        }
        if self.http_timeout_secs == 0 {
            return Err(anyhow!("http_timeout_secs must be > 0"));
        }
        if self.exec_timeout_secs == Some(0) {
            return Err(anyhow!("exec_timeout_secs must be > 0 when set"));
        }
        if self.output_limit_bytes == 0 {
            return Err(anyhow!("output_limit_bytes must be > 0"));
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    pub fn exec_timeout(&self) -> Option<Duration> {
        self.exec_timeout_secs.map(Duration::from_secs)
    }
}

/// Load settings from a TOML file.
///
/// With no path, or a path that does not exist, returns `SyncSettings::default()`.
pub fn load_settings(path: Option<&Path>) -> Result<SyncSettings> {
    let settings = match path {
        Some(path) if path.exists() => {
            let contents =
                fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
            toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?
        }
        _ => SyncSettings::default(),
    };
    settings.validate()?;
    Ok(settings)
}

/// Raw startup values, as read from the environment or flags.
#[derive(Debug, Clone, Default)]
pub struct StartupValues {
    pub token: String,
    pub owner: String,
    pub repo: String,
    pub root_path: String,
    pub reference: String,
    pub poll_interval: String,
    pub queue_manager: String,
}

impl StartupValues {
    /// Repository coordinates, with surrounding slashes stripped from the root path.
    pub fn location(&self) -> Result<RepositoryLocation> {
        if self.owner.trim().is_empty() {
            return Err(anyhow!("repository owner must not be empty"));
        }
        if self.repo.trim().is_empty() {
            return Err(anyhow!("repository name must not be empty"));
        }
        Ok(RepositoryLocation {
            owner: self.owner.trim().to_string(),
            repo: self.repo.trim().to_string(),
            root_path: self.root_path.trim().trim_matches('/').to_string(),
            reference: self.reference.trim().to_string(),
        })
    }
}

/// Process-wide configuration, built once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub location: RepositoryLocation,
    pub token: String,
    pub poll_interval: Duration,
    pub queue_manager: String,
    pub engine_path: PathBuf,
    pub settings: SyncSettings,
}

impl SyncConfig {
    /// Validate startup values and resolve the engine executable.
    ///
    /// Fails on an unparsable interval, an empty owner/repo/queue manager, or
    /// an engine that cannot be found. Any of these is fatal at startup.
    pub fn build(values: &StartupValues, settings: SyncSettings) -> Result<Self> {
        settings.validate()?;
        let poll_interval = parse_interval(&values.poll_interval)
            .with_context(|| format!("parse poll interval {:?}", values.poll_interval))?;
        let location = values.location()?;
        if values.queue_manager.trim().is_empty() {
            return Err(anyhow!("queue manager name must not be empty"));
        }
        let engine_path = locate_engine(&settings.engine_program)?;

        Ok(Self {
            location,
            token: values.token.clone(),
            poll_interval,
            queue_manager: values.queue_manager.trim().to_string(),
            engine_path,
            settings,
        })
    }
}
