//! Path helpers for deriving copy destinations
//!
//! Local paths use the platform separator; remote SFTP paths always use `/`
//! (even Windows SSH servers present paths in Unix style).

use std::path::{Path, PathBuf};

/// Final component of a local path, if any.
///
/// `dir/a.txt` → `a.txt`; `/` and `..` have none.
pub fn local_file_name(path: &str) -> Option<String> {
    Path::new(path)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
}

/// Final component of a remote path, ignoring trailing slashes.
pub fn remote_file_name(path: &str) -> Option<String> {
    let trimmed = path.trim_end_matches('/');
    let name = trimmed.rsplit('/').next().unwrap_or(trimmed);
    match name {
        "" | "." | ".." => None,
        name => Some(name.to_string()),
    }
}

/// Join local path components using platform-native separator.
///
/// - Windows: `C:\Users` + `file.txt` → `C:\Users\file.txt`
/// - Unix: `/home/user` + `file.txt` → `/home/user/file.txt`
pub fn join_local_path(base: &str, component: &str) -> String {
    let mut path = PathBuf::from(base);
    path.push(component);
    path.to_string_lossy().to_string()
}

/// Join remote SFTP path components using `/` separator.
pub fn join_remote_path(base: &str, component: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, component)
    } else {
        format!("{}/{}", base, component)
    }
}
