//! Side-effecting adapters: configuration files, the remote source and the engine process.

pub mod config;
pub mod executor;
pub mod process;
pub mod source;
