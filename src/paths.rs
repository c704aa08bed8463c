//! Executable searching on `PATH`-style search paths.

use std::env;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Find an executable in the directories of `search_path`.
///
/// `search_path` uses the platform separator (`:` on Unix, `;` on Windows).
/// Directories are tried in order. On Windows `name.exe` is tried after `name`.
///
/// Returns `None` if no directory contains a matching executable.
#[must_use = "found executable path should be used"]
pub fn find_executable(name: &str, search_path: &OsStr) -> Option<PathBuf> {
    let mut candidates = Vec::new();

    for dir in env::split_paths(search_path) {
        // An empty entry means the current directory; skip it
        if dir.as_os_str().is_empty() {
            continue;
        }
        candidates.push(dir.join(name));
        if cfg!(windows) {
            candidates.push(dir.join(format!("{name}.exe")));
        }
    }

    candidates.into_iter().find(|p| is_executable(p))
}

/// Find an executable on the system `PATH`.
///
/// Returns `None` if `PATH` is unset or the executable is not found.
#[must_use = "found executable path should be used"]
pub fn find_in_system_path(name: &str) -> Option<PathBuf> {
    let search_path = env::var_os("PATH")?;
    find_executable(name, &search_path)
}
