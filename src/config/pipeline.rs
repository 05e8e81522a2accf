// ABOUTME: The `pipelines` config section selecting which reference handlers to register.
// ABOUTME: Each entry is tagged by `kind`.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineConfig {
    /// Deploy pushes to `branch`.
    Push { branch: String },
    /// Deploy pull requests opened against `base`.
    PullRequest { base: String },
}
