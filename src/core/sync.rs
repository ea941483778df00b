//! Directory walking for sync jobs.

use crate::{error::EesError, map_err};
use ignore::IgnoreMatcher;
use std::path::{Path, PathBuf};

pub mod ignore;

/// The in-tree file defining ignore patterns for a sync root.
pub const IGNORE_FILE: &str = ".eesignore";

/// Load the ignore matcher for a sync root: the root's `.eesignore`
/// when present, the default set otherwise.
pub async fn load_matcher(root: &Path) -> Result<IgnoreMatcher, EesError> {
    let ignore_path = root.join(IGNORE_FILE);

    match tokio::fs::read_to_string(&ignore_path).await {
        Ok(content) => {
            let lines = content.lines().collect::<Vec<_>>();
            IgnoreMatcher::new(&lines)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(IgnoreMatcher::default_set()),
        Err(e) => Err(crate::error::EesError::new(
            file!(),
            line!(),
            column!(),
            e.into(),
        )),
    }
}

/// Walk `root` and collect every file eligible for sync, honoring the
/// matcher. The result is sorted so progress is deterministic.
pub async fn collect_files(
    root: &Path,
    matcher: &IgnoreMatcher,
) -> Result<Vec<PathBuf>, EesError> {
    let mut files = Vec::new();
    let mut dirs = vec![root.to_path_buf()];

    while let Some(dir) = dirs.pop() {
        let mut entries = map_err!(tokio::fs::read_dir(&dir).await);

        while let Some(entry) = map_err!(entries.next_entry().await) {
            let path = entry.path();
            let rel = relative(root, &path);

            let file_type = map_err!(entry.file_type().await);

            if file_type.is_dir() {
                // Pruning is only sound without negations; a negated
                // pattern may un-ignore a descendant.
                if matcher.has_negations() || !matcher.is_ignored(&rel) {
                    dirs.push(path);
                }
                continue;
            }

            if !file_type.is_file() {
                continue;
            }

            if rel == IGNORE_FILE || matcher.is_ignored(&rel) {
                continue;
            }

            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

/// The `/` separated path of `path` relative to `root`.
pub fn relative(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    let rel = rel.to_string_lossy();

    if std::path::MAIN_SEPARATOR == '/' {
        rel.into_owned()
    } else {
        rel.replace(std::path::MAIN_SEPARATOR, "/")
    }
}
