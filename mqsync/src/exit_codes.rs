//! Stable exit codes for the `mqsync` binary.

/// `once` or `discover` finished (the `run` loop itself never exits on its own).
pub const OK: i32 = 0;
/// Startup failed: missing or invalid configuration or interval, missing
/// engine, or a `discover` command whose lookup failed.
///
/// Malformed command-line flags still exit with clap's usage code (2).
pub const STARTUP: i32 = 1;
