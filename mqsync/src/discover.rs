//! Recursive discovery of configuration files in the remote source.

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::types::{EntryKind, Listing, RepositoryLocation, is_config_file};
use crate::io::source::RemoteSource;

/// Walk the source from `location.root_path` and return every path ending in `suffix`.
///
/// Results from each subdirectory are merged into the accumulated set before
/// the next sibling entry is visited. Order follows the source's listing order.
/// Any lookup error aborts the whole walk.
#[instrument(skip_all, fields(root = %location.root_path, reference = %location.reference))]
pub fn discover<S: RemoteSource>(
    source: &S,
    location: &RepositoryLocation,
    suffix: &str,
) -> Result<Vec<String>> {
    let mut found = Vec::new();
    walk(
        source,
        &location.root_path,
        &location.reference,
        suffix,
        &mut found,
    )?;
    debug!(count = found.len(), "discovery finished");
    Ok(found)
}

fn walk<S: RemoteSource>(
    source: &S,
    path: &str,
    reference: &str,
    suffix: &str,
    found: &mut Vec<String>,
) -> Result<()> {
    let listing = source
        .list(path, reference)
        .with_context(|| format!("list {path:?}"))?;

    match listing {
        Listing::File(entry) => {
            if entry.kind == EntryKind::File && is_config_file(&entry.path, suffix) {
                found.push(entry.path);
            }
        }
        Listing::Directory(entries) => {
            for entry in entries {
                match entry.kind {
                    EntryKind::File => {
                        if is_config_file(&entry.path, suffix) {
                            found.push(entry.path);
                        }
                    }
                    EntryKind::Dir => walk(source, &entry.path, reference, suffix, found)?,
                    EntryKind::Other => debug!(path = %entry.path, "skipping non-file entry"),
                }
            }
        }
    }
    Ok(())
}
