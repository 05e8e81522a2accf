// ABOUTME: The `cluster` config section naming the deployment target.
// ABOUTME: Its id is the build-status context and the running-log heading.

use serde::Deserialize;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ClusterConfig {
    pub environment: String,
    pub region: String,
    pub name: String,
}

impl ClusterConfig {
    /// `<environment>/<region>/<name>`
    pub fn id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ClusterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.environment, self.region, self.name)
    }
}
