//! Command lookup on the search path.

use std::ffi::OsStr;
use std::path::{Component, Path, PathBuf};

use crate::error::RunprocError;
use crate::Result;

/// Directories searched before `PATH`, in order.
pub const COMMON_BIN_PATHS: &[&str] = &[
    "/usr/libexec",
    "/usr/local/sbin",
    "/usr/local/bin",
    "/usr/sbin",
    "/usr/bin",
    "/sbin",
    "/bin",
];

/// The full search list: common directories, then `path_var` entries.
///
/// Duplicates are dropped keeping the first occurrence; empty entries are
/// skipped.
pub fn search_paths(path_var: Option<&OsStr>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = Vec::new();
    let from_env = path_var
        .map(|v| std::env::split_paths(v).collect::<Vec<_>>())
        .unwrap_or_default();

    for dir in COMMON_BIN_PATHS.iter().map(PathBuf::from).chain(from_env) {
        if dir.as_os_str().is_empty() || paths.contains(&dir) {
            continue;
        }
        paths.push(dir);
    }
    paths
}

/// Resolve `command` against `paths`, returning the first regular file.
///
/// A name containing a path separator is checked as given.
pub fn find_in(command: &str, paths: &[PathBuf]) -> Result<PathBuf> {
    if command.contains(std::path::MAIN_SEPARATOR) {
        let candidate = Path::new(command);
        if candidate.is_file() {
            return absolute(candidate);
        }
    } else if !command.is_empty() {
        for dir in paths {
            let candidate = dir.join(command);
            if candidate.is_file() {
                return absolute(&candidate);
            }
        }
    }

    Err(RunprocError::CommandNotFound {
        command: command.to_string(),
        paths: paths.to_vec(),
    })
}

/// Resolve `command` using the common directories and the `PATH` variable.
pub fn find_command(command: &str) -> Result<PathBuf> {
    let path_var = std::env::var_os("PATH");
    find_in(command, &search_paths(path_var.as_deref()))
}

/// Make `path` absolute and drop `.` and `..` components without touching
/// the filesystem. Symlinks are left as they are.
fn absolute(path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let mut normalized = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
            other => normalized.push(other),
        }
    }
    Ok(normalized)
}
