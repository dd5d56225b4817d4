//! Summarize engine output into a log signal.
//!
//! The engine closes every batch with a short status block (commands read,
//! syntax errors, commands failed). The last three lines are used as a
//! best-effort digest. Nothing here affects control flow.

use crate::core::types::Signal;

const SIGNATURE_LINES: usize = 3;

/// Classify captured engine output.
///
/// - A single trailing empty line (from a final `\n`) is discarded.
/// - With at least 3 remaining lines, the last 3 are lowercased and concatenated.
/// - Otherwise the raw output is returned verbatim as unexpected.
pub fn classify_output(output: &str) -> Signal {
    let mut lines: Vec<&str> = output.split('\n').collect();
    if lines.last() == Some(&"") {
        lines.pop();
    }

    if lines.len() < SIGNATURE_LINES {
        return Signal::Unexpected {
            raw: output.to_string(),
        };
    }

    let signature = lines[lines.len() - SIGNATURE_LINES..]
        .iter()
        .map(|line| line.to_lowercase())
        .collect::<String>();
    Signal::Success { signature }
}
