//! Locating external programs.
//!
//! argv[0] containing a `/` is used as a concrete path; anything else is
//! searched along `PATH`, where an empty entry means the current directory.
//! The two failure shapes map onto the conventional shell exit codes:
//! not found is 127, found but not runnable is 126.

use crate::env::Environment;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Why a program name failed to resolve.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LookupError {
    #[error("command not found")]
    NotFound,
    #[error("permission denied")]
    NotExecutable,
}

impl LookupError {
    /// Conventional exit code for the failure.
    pub fn exit_code(self) -> i32 {
        match self {
            LookupError::NotFound => 127,
            LookupError::NotExecutable => 126,
        }
    }
}

/// Resolve a command name against the environment's `PATH`.
pub fn resolve_program(name: &str, env: &Environment) -> Result<PathBuf, LookupError> {
    if name.contains('/') {
        let path = PathBuf::from(name);
        return classify(&path).map(|_| path);
    }

    let search = env.get("PATH").unwrap_or_default();
    let mut found_non_executable = false;
    for dir in std::env::split_paths(search) {
        let candidate = if dir.as_os_str().is_empty() {
            PathBuf::from(name)
        } else {
            dir.join(name)
        };
        match classify(&candidate) {
            Ok(()) => return Ok(candidate),
            // only a real file counts as a present-but-unrunnable hit;
            // a directory named like the command is skipped
            Err(LookupError::NotExecutable) if candidate.is_file() => {
                found_non_executable = true;
            }
            Err(_) => {}
        }
    }

    if found_non_executable {
        Err(LookupError::NotExecutable)
    } else {
        Err(LookupError::NotFound)
    }
}

/// Decide whether `path` names an executable regular file.
fn classify(path: &Path) -> Result<(), LookupError> {
    let metadata = match path.metadata() {
        Ok(metadata) => metadata,
        Err(_) => return Err(LookupError::NotFound),
    };
    if !metadata.is_file() {
        return Err(LookupError::NotExecutable);
    }
    if metadata.permissions().mode() & 0o111 == 0 {
        return Err(LookupError::NotExecutable);
    }
    Ok(())
}
