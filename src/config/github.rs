// ABOUTME: The `github` config section: which repository to follow and how to reach its API.
// ABOUTME: Derives the REST base url and the clone url from domain, org and repo.

use serde::Deserialize;

use crate::error::Result;

use super::EnvValue;

const PUBLIC_DOMAIN: &str = "github.com";
const PUBLIC_API: &str = "https://api.github.com";

#[derive(Debug, Clone, Deserialize)]
pub struct GithubConfig {
    pub domain: String,
    pub org: String,
    pub repo: String,
    #[serde(default)]
    pub token: Option<EnvValue>,
    #[serde(default)]
    pub api_url: Option<String>,
}

impl GithubConfig {
    /// REST base for the repository, e.g. `https://ghe.example.com/api/v3/repos/org/repo`.
    pub fn api_url(&self) -> String {
        if let Some(url) = &self.api_url {
            return url.trim_end_matches('/').to_string();
        }
        if self.is_public() {
            format!("{PUBLIC_API}/repos/{}/{}", self.org, self.repo)
        } else {
            format!("https://{}/api/v3/repos/{}/{}", self.domain, self.org, self.repo)
        }
    }

    pub fn repo_url(&self) -> String {
        format!("https://{}/{}/{}", self.web_domain(), self.org, self.repo)
    }

    /// Host git clones go through.
    pub fn web_domain(&self) -> &str {
        if self.is_public() { PUBLIC_DOMAIN } else { &self.domain }
    }

    pub fn token(&self) -> Result<Option<String>> {
        self.token.as_ref().map(EnvValue::resolve).transpose()
    }

    fn is_public(&self) -> bool {
        self.domain == PUBLIC_DOMAIN || self.domain == "api.github.com"
    }
}
