//! Validation, classification and fingerprinting of submitted Go projects.
//!
//! A project is a flat map of slash-separated relative paths to file
//! contents. [`validate`] checks its shape and classifies it, and
//! [`fingerprint`] derives the content-addressed [`ArtifactId`] used as the
//! build cache key.

mod error;
mod fingerprint;
mod info;
mod path;

pub use error::BuildError;
pub use fingerprint::{fingerprint, ArtifactId};
pub use info::{ProjectInfo, ProjectType};
pub use path::{file_name, path_depth, validate_file_path, MANIFEST_FILE, SOURCE_EXT};

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::fingerprint::trim_space;

/// Maximum number of files in a project.
pub const MAX_FILE_COUNT: usize = 12;

/// Maximum number of `/` separators in a file path.
pub const MAX_PATH_DEPTH: usize = 5;

/// Suffix that marks a Go test file.
pub const TEST_FILE_SUFFIX: &str = "_test.go";

fn benchmark_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^func\s+Benchmark(?:[A-Z0-9_]\w*)?\s*\(\s*\w+\s+\*testing\.B\s*\)")
            .expect("benchmark pattern is valid")
    })
}

fn fuzz_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^func\s+Fuzz(?:[A-Z0-9_]\w*)?\s*\(\s*\w+\s+\*testing\.F\s*\)")
            .expect("fuzz pattern is valid")
    })
}

/// Check the shape of a file set and classify it.
///
/// Rules are applied in order: non-empty set, file count, per-file path
/// checks and depth, then non-empty content. The first violation is
/// returned.
pub fn validate<I, N, C>(files: I) -> Result<ProjectInfo, BuildError>
where
    I: IntoIterator<Item = (N, C)>,
    N: AsRef<str>,
    C: AsRef<[u8]>,
{
    let mut entries: Vec<(N, C)> = files.into_iter().collect();
    if entries.is_empty() {
        return Err(BuildError::new("no buildable source files"));
    }

    if entries.len() > MAX_FILE_COUNT {
        return Err(BuildError::new(format!(
            "too many files (max: {})",
            MAX_FILE_COUNT
        )));
    }

    // Report violations deterministically regardless of map order.
    entries.sort_by(|(a, _), (b, _)| a.as_ref().cmp(b.as_ref()));

    let mut info = ProjectInfo::default();
    for (name, content) in &entries {
        let name = name.as_ref();
        let content = content.as_ref();

        validate_file_path(name, true)?;
        if path_depth(name) > MAX_PATH_DEPTH {
            return Err(BuildError::new(format!(
                "file path is too deep: {} (max depth: {})",
                name, MAX_PATH_DEPTH
            )));
        }

        if trim_space(content).is_empty() {
            return Err(BuildError::new(format!("file {} is empty", name)));
        }

        if !is_root_test_file(name) {
            continue;
        }

        info.project_type = ProjectType::Test;
        let source = String::from_utf8_lossy(content);
        info.has_benchmark |= benchmark_pattern().is_match(&source);
        info.has_fuzz |= fuzz_pattern().is_match(&source);
    }

    Ok(info)
}

/// A `_test.go` file at the project root. A single leading slash still
/// counts as the root.
pub fn is_root_test_file(path: &str) -> bool {
    let depth = path_depth(path);
    let at_root = depth == 0 || (depth == 1 && path.starts_with('/'));
    at_root && path.ends_with(TEST_FILE_SUFFIX)
}
