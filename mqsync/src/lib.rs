//! Continuous MQSC configuration sync from a GitHub repository to a queue manager.
//!
//! Every poll interval the sync loop walks a directory of the repository,
//! fetches each `.mqsc` file at a pinned reference and pipes it through
//! `runmqsc <queue manager>`. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (types, output classification,
//!   interval parsing). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (configuration, the GitHub API,
//!   the engine subprocess). Behind traits to enable scripted fakes in tests.
//!
//! Orchestration modules ([`discover`], [`cycle`], [`looping`]) coordinate
//! core logic with I/O to implement the poll loop.

pub mod core;
pub mod cycle;
pub mod discover;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod looping;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
