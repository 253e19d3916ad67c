//! Recursive discovery of test files

use std::fs;
use std::path::Path;

use super::error::TestError;

/// Visit every file below `dir`, depth first.
///
/// Entries whose file name appears in `ignored` are pruned at every depth,
/// directories included. Each directory is listed in sorted order so runs are
/// reproducible across filesystems.
///
/// Symlinked directories are not descended into, so link cycles cannot recurse.
///
/// The callback may fail; its error aborts the walk.
pub fn walk<F>(dir: &Path, ignored: &[String], visit: &mut F) -> Result<(), TestError>
where
    F: FnMut(&Path) -> Result<(), TestError>,
{
    let listing = fs::read_dir(dir).map_err(|source| TestError::Walk {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut entries = Vec::new();
    for entry in listing {
        let entry = entry.map_err(|source| TestError::Walk {
            path: dir.to_path_buf(),
            source,
        })?;
        // `file_type` does not follow symlinks, so a linked directory is never entered.
        let is_dir = entry
            .file_type()
            .map_err(|source| TestError::Walk {
                path: entry.path(),
                source,
            })?
            .is_dir();
        entries.push((entry.path(), is_dir));
    }
    entries.sort();

    for (path, is_dir) in entries {
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if ignored.iter().any(|skip| skip == name) {
            tracing::debug!(path = %path.display(), "ignored");
            continue;
        }
        if is_dir {
            walk(&path, ignored, visit)?;
        } else {
            visit(&path)?;
        }
    }

    Ok(())
}
