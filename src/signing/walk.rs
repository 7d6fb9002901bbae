//! Directory traversal rules used to enumerate signable items.

use std::fs;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{CodesignError, Result};

/// Directory suffixes that mark a signable bundle.
pub const BUNDLE_SUFFIXES: &[&str] = &[".app", ".framework", ".bundle", ".plugin", ".appex", ".xpc"];

pub fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

/// `true` when the final extension of `path`, written with its leading dot,
/// is one of `suffixes`.
pub fn has_suffix(path: &Path, suffixes: &[impl AsRef<str>]) -> bool {
    let Some(ext) = path.extension() else {
        return false;
    };
    let dotted = format!(".{}", ext.to_string_lossy());
    suffixes.iter().any(|s| s.as_ref() == dotted)
}

/// Immediate non-hidden children of `dir`, sorted by name.
pub fn top_level(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }
    let entries = fs::read_dir(dir)
        .map_err(|e| CodesignError::io(format!("failed to list {}", dir.display()), e))?;

    let mut items = Vec::new();
    for entry in entries {
        let entry =
            entry.map_err(|e| CodesignError::io(format!("failed to list {}", dir.display()), e))?;
        if !is_hidden(&entry.file_name()) {
            items.push(entry.path());
        }
    }
    items.sort();
    Ok(items)
}

/// All signable descendants of `dir` accepted by `filter`, children before
/// their parent.
///
/// Hidden names (and anything below them) are skipped, symlinks are neither
/// followed nor yielded, and directories are only yielded when they carry a
/// bundle suffix.
pub fn recursive<F>(dir: &Path, filter: F) -> Result<Vec<PathBuf>>
where
    F: Fn(&Path) -> bool,
{
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut items = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .follow_links(false)
        .contents_first(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            CodesignError::io(format!("failed to walk {}", dir.display()), e.into())
        })?;
        let path = entry.path();

        if below_hidden(dir, path) {
            continue;
        }
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            continue;
        }
        if file_type.is_dir() && !has_suffix(path, BUNDLE_SUFFIXES) {
            continue;
        }
        if filter(path) {
            items.push(path.to_path_buf());
        }
    }
    Ok(items)
}

/// Regular files anywhere below `dir` whose name ends with `suffix`.
pub fn files_matching(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            CodesignError::io(format!("failed to walk {}", dir.display()), e.into())
        })?;
        if entry.file_type().is_file() && entry.file_name().to_string_lossy().ends_with(suffix) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn below_hidden(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root)
        .map(|rel| {
            rel.components()
                .any(|c| matches!(c, Component::Normal(name) if is_hidden(name)))
        })
        .unwrap_or(false)
}
