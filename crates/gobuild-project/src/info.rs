//! Project classification.

use serde::{Deserialize, Serialize};

/// Kind of project that was submitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectType {
    /// A regular program with a `main` package.
    #[default]
    Program,
    /// At least one root `_test.go` file is present.
    Test,
}

/// Classification derived from a validated file set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub project_type: ProjectType,
    /// Some root test file declares a `BenchmarkXxx(*testing.B)` function.
    pub has_benchmark: bool,
    /// Some root test file declares a `FuzzXxx(*testing.F)` function.
    pub has_fuzz: bool,
}

impl ProjectInfo {
    pub fn is_test(&self) -> bool {
        self.project_type == ProjectType::Test
    }
}
