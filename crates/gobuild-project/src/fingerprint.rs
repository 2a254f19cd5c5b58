//! Content-addressed identifiers for submitted projects.
//!
//! The digest covers every `(name, trimmed content)` pair in name order, so
//! the identifier does not depend on how the caller iterated the file set.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Deterministic identifier of a file set and of its build output.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    /// Wrap an already computed identifier (e.g. one received from a client).
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The hex-encoded digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the compiled artifact for this identifier.
    pub fn file_name(&self, ext: &str) -> String {
        format!("{}{}", self.0, ext)
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ArtifactId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Compute the artifact identifier of a file set.
///
/// Each file contributes the marker `-- <name> --\n` followed by its content
/// with surrounding whitespace removed; files are separated by a newline.
pub fn fingerprint<I, N, C>(files: I) -> ArtifactId
where
    I: IntoIterator<Item = (N, C)>,
    N: AsRef<str>,
    C: AsRef<[u8]>,
{
    let mut entries: Vec<(N, C)> = files.into_iter().collect();
    entries.sort_by(|(a, _), (b, _)| a.as_ref().cmp(b.as_ref()));

    let mut hasher = Sha256::new();
    for (i, (name, content)) in entries.iter().enumerate() {
        if i > 0 {
            hasher.update(b"\n");
        }
        hasher.update(b"-- ");
        hasher.update(name.as_ref().as_bytes());
        hasher.update(b" --\n");
        hasher.update(trim_space(content.as_ref()));
    }

    ArtifactId(hex::encode(hasher.finalize()))
}

/// Strip leading and trailing ASCII whitespace.
pub(crate) fn trim_space(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(data.len());
    let end = data
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &data[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{BTreeMap, HashMap};

    const MAIN: &str = "package main\n\nfunc main() {}\n";
    const UTIL: &str = "package main\n\nfunc helper() int { return 1 }\n";

    #[test]
    fn test_order_independent() {
        let forward = fingerprint(vec![("main.go", MAIN), ("util.go", UTIL)]);
        let backward = fingerprint(vec![("util.go", UTIL), ("main.go", MAIN)]);
        assert_eq!(forward, backward);

        let hashed: HashMap<String, Vec<u8>> = [
            ("util.go".to_string(), UTIL.as_bytes().to_vec()),
            ("main.go".to_string(), MAIN.as_bytes().to_vec()),
        ]
        .into_iter()
        .collect();
        let sorted: BTreeMap<&str, &[u8]> = [("main.go", MAIN.as_bytes()), ("util.go", UTIL.as_bytes())]
            .into_iter()
            .collect();

        assert_eq!(fingerprint(&hashed), forward);
        assert_eq!(fingerprint(sorted), forward);
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        let plain = fingerprint([("main.go", MAIN)]);
        let padded = fingerprint([("main.go", format!("\n\t  {}  \n\n", MAIN))]);
        assert_eq!(plain, padded);
    }

    #[test]
    fn test_single_byte_change_differs() {
        let base = fingerprint([("main.go", MAIN)]);
        let edited = fingerprint([("main.go", MAIN.replace("main()", "mair()"))]);
        assert_ne!(base, edited);
    }

    #[test]
    fn test_file_name_change_differs() {
        let base = fingerprint([("main.go", MAIN)]);
        let renamed = fingerprint([("prog.go", MAIN)]);
        assert_ne!(base, renamed);
    }

    #[test]
    fn test_content_cannot_shift_between_files() {
        // Moving a line from one file into the other must change the id.
        let a = fingerprint([("a.go", "package a\nvar x = 1"), ("b.go", "package a")]);
        let b = fingerprint([("a.go", "package a"), ("b.go", "package a\nvar x = 1")]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_no_collisions_across_corpus() {
        let mut seen = std::collections::HashSet::new();
        for i in 0..200 {
            let src = format!("package main\n\nconst n = {}\n", i);
            assert!(seen.insert(fingerprint([("main.go", src.clone())])));
            assert!(seen.insert(fingerprint([(format!("f{}.go", i), src)])));
        }
    }

    #[test]
    fn test_hex_encoded_sha256() {
        let id = fingerprint([("main.go", MAIN)]);
        assert_eq!(id.as_str().len(), 64);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_eq!(id.file_name(".wasm"), format!("{}.wasm", id));
    }

    #[test]
    fn test_trim_space() {
        assert_eq!(trim_space(b"  abc \n"), b"abc");
        assert_eq!(trim_space(b"\n\t "), b"");
        assert_eq!(trim_space(b""), b"");
        assert_eq!(trim_space(b"a b"), b"a b");
    }
}
