//! Vault file discovery.
//!
//! Walks the vault recursively and returns the notes to index, sorted by
//! path so runs are deterministic. Hidden directories and hidden files
//! (names starting with `.`, such as `.obsidian/` or `.trash/`) are never
//! descended into or returned. Remaining files are kept when their path
//! relative to the vault root matches an include glob and no exclude glob.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::warn;
use walkdir::{DirEntry, WalkDir};

use crate::config::VaultConfig;
use crate::error::IndexError;

/// Every indexable note under `vault.path`.
pub fn discover_notes(vault: &VaultConfig) -> Result<Vec<PathBuf>, IndexError> {
    let root = vault.path.as_path();
    if !root.is_dir() {
        return Err(IndexError::VaultMissing(root.to_path_buf()));
    }

    let include_set = build_globset(&vault.include_globs)?;
    let exclude_set = build_globset(&vault.exclude_globs)?;

    let mut notes = Vec::new();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) if e.depth() == 0 => return Err(IndexError::Discover(e)),
            Err(e) => {
                warn!(error = %e, "skipping unreadable vault entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);

        if exclude_set.is_match(relative) {
            continue;
        }
        if !include_set.is_match(relative) {
            continue;
        }

        notes.push(path.to_path_buf());
    }

    notes.sort();
    Ok(notes)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet, IndexError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|source| IndexError::InvalidGlob {
            pattern: pattern.clone(),
            source,
        })?;
        builder.add(glob);
    }
    builder.build().map_err(|source| IndexError::InvalidGlob {
        pattern: patterns.join(", "),
        source,
    })
}

/// Path string used as a note's identity in the store.
pub fn path_key(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}
