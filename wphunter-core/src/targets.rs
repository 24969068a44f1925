//! Target list reader with a path safety gate.
//!
//! The gate is purely lexical: `.` and `..` segments are cleaned without
//! touching the filesystem, so a symlink that points outside the intended
//! directory is not detected here.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::TargetsError;

/// Longest accepted targets file path, in bytes.
pub const MAX_PATH_LEN: usize = 4096;

/// System locations a targets file may never point at.
const DENIED_PATHS: &[&str] = &["/etc/passwd", "/etc/shadow", "/proc", "/sys", "/dev"];

/// Read a newline-delimited targets file.
///
/// Lines are trimmed; blank lines and lines starting with `#` are skipped.
/// Order is preserved.
pub fn read_targets_file(path: &Path) -> Result<Vec<String>, TargetsError> {
    let safe = check_path(path)?;
    debug!(path = %safe.display(), "Reading targets file");

    let io_err = |source| TargetsError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(&safe).map_err(io_err)?;
    let mut targets = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.map_err(io_err)?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        targets.push(line.to_string());
    }
    Ok(targets)
}

/// Apply the path safety gate and return the cleaned path to open.
pub fn check_path(path: &Path) -> Result<PathBuf, TargetsError> {
    let raw = path.as_os_str().as_encoded_bytes();
    if raw.is_empty() {
        return Err(TargetsError::EmptyPath);
    }
    if raw.contains(&0) {
        return Err(TargetsError::NullByte);
    }
    if raw.len() > MAX_PATH_LEN {
        return Err(TargetsError::PathTooLong { max: MAX_PATH_LEN });
    }

    let cleaned = clean(path);
    if cleaned.components().any(|c| c == Component::ParentDir) {
        return Err(TargetsError::Traversal(cleaned));
    }

    let absolute = if cleaned.is_absolute() {
        cleaned.clone()
    } else {
        let cwd = std::env::current_dir().map_err(|source| TargetsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        clean(&cwd.join(&cleaned))
    };

    if DENIED_PATHS
        .iter()
        .any(|denied| absolute.starts_with(denied))
    {
        return Err(TargetsError::Denied(absolute));
    }

    Ok(cleaned)
}

/// Lexically resolve `.` and `..` segments.
///
/// A `..` directly under the root collapses into the root. A leading `..` on
/// a relative path has nothing to cancel and is kept.
fn clean(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    if out.is_empty() {
        return PathBuf::from(".");
    }
    out.iter().collect()
}
