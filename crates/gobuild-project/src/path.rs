//! File path checks for submitted project files.

use std::path::{Component, Path};

use crate::error::BuildError;

/// Go source file extension.
pub const SOURCE_EXT: &str = ".go";

/// Module manifest file name.
pub const MANIFEST_FILE: &str = "go.mod";

/// Check a project-relative file path.
///
/// Rejects empty paths, absolute paths, paths that escape the project root
/// and paths that are not in canonical slash-separated form (`./a.go`,
/// `a//b.go`, `a/`). Every accepted path names exactly one file key, so two
/// spellings of the same file cannot both reach the workspace. In `strict`
/// mode only Go sources and the module manifest are accepted.
pub fn validate_file_path(path: &str, strict: bool) -> Result<(), BuildError> {
    if path.trim().is_empty() {
        return Err(BuildError::new("file name cannot be empty"));
    }

    if path.starts_with('/') || path.starts_with('\\') || Path::new(path).is_absolute() {
        return Err(BuildError::new(format!(
            "absolute file paths are not allowed: {}",
            path
        )));
    }

    for component in Path::new(path).components() {
        match component {
            Component::Normal(_) => {}
            Component::CurDir => {
                return Err(BuildError::new(format!(
                    "file path must not contain '.' segments: {}",
                    path
                )));
            }
            _ => {
                return Err(BuildError::new(format!(
                    "file path cannot point outside of the project: {}",
                    path
                )));
            }
        }
    }

    // `Path::components` drops empty and inner `.` segments.
    if path.split('/').any(|segment| segment.is_empty() || segment == ".") {
        return Err(BuildError::new(format!(
            "file path is not in canonical form: {}",
            path
        )));
    }

    if strict && !is_accepted_file(path) {
        return Err(BuildError::new(format!(
            "invalid file type: {} (only {} files and {} are allowed)",
            path, SOURCE_EXT, MANIFEST_FILE
        )));
    }

    Ok(())
}

/// Number of `/` separators in a path.
pub fn path_depth(path: &str) -> usize {
    path.matches('/').count()
}

/// Base name of a slash-separated path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn is_accepted_file(path: &str) -> bool {
    let name = file_name(path);
    name == MANIFEST_FILE || (name.len() > SOURCE_EXT.len() && name.ends_with(SOURCE_EXT))
}
