//! File discovery for livdb inputs
//!
//! Expands the command-line inputs into a sorted, de-duplicated list of
//! livdb files. Directories are searched one level deep.

use crate::constants::LIVDB_EXTENSIONS;
use crate::error::{MagicError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Find livdb files among the given files and directories
///
/// Files named explicitly are taken as given. Each directory contributes
/// its entries whose name ends in one of the livdb suffixes, sorted by
/// name; inputs keep their command-line order.
pub async fn discover_livdb_files(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for input in inputs {
        let metadata = fs::metadata(input)
            .await
            .map_err(|_| MagicError::InputNotFound { path: input.clone() })?;

        if metadata.is_dir() {
            let found = discover_directory(input).await?;
            debug!("Found {} livdb files in {}", found.len(), input.display());
            files.extend(found);
        } else {
            files.push(input.clone());
        }
    }

    let mut seen = std::collections::HashSet::new();
    files.retain(|path| seen.insert(path.clone()));
    Ok(files)
}

async fn discover_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut entries = fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if entry.file_type().await?.is_file() && is_livdb_file(&path) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// Check if a path carries a livdb suffix
pub fn is_livdb_file(path: &Path) -> bool {
    let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_lowercase()) else {
        return false;
    };
    !name.starts_with('.') && LIVDB_EXTENSIONS.iter().any(|ext| name.ends_with(ext))
}
