// ABOUTME: Deterministic, DNS-compatible names for durable store objects.
// ABOUTME: Every name is prefixed with the owner, org and repo it belongs to.

use std::fmt;

pub const OWNER: &str = "quickcd";

/// Name of an object in the durable state store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceName(String);

impl ResourceName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Builds `quickcd-<org>-<repo>[-<category>]-<name>` names.
///
/// Each part is lowercased and every run of characters outside `[0-9a-z-]`
/// collapses to a single `-`, so arbitrary org/repo names stay valid object names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceNamer {
    org: String,
    repo: String,
}

impl ResourceNamer {
    pub fn new(org: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            org: org.into(),
            repo: repo.into(),
        }
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn repo(&self) -> &str {
        &self.repo
    }

    pub fn name(&self, name: impl fmt::Display) -> ResourceName {
        self.categorized(None, name)
    }

    pub fn categorized(&self, category: Option<&str>, name: impl fmt::Display) -> ResourceName {
        let name = name.to_string();
        let parts = [
            Some(OWNER),
            Some(self.org.as_str()),
            Some(self.repo.as_str()),
            category,
            Some(name.as_str()),
        ];

        let joined = parts
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .map(sanitize)
            .collect::<Vec<_>>()
            .join("-");
        ResourceName(joined)
    }

    /// Singleton object holding the event cursor.
    pub fn cursor(&self) -> ResourceName {
        self.name("event-cursor")
    }
}

fn sanitize(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    let mut in_run = false;
    for c in part.chars().flat_map(char::to_lowercase) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
            out.push(c);
            in_run = false;
        } else if !in_run {
            out.push('-');
            in_run = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_owner_org_and_repo() {
        let namer = ResourceNamer::new("Acme", "deploy-config");
        assert_eq!(namer.name(42).as_str(), "quickcd-acme-deploy-config-42");
        assert_eq!(namer.cursor().as_str(), "quickcd-acme-deploy-config-event-cursor");
    }

    #[test]
    fn collapses_invalid_character_runs() {
        let namer = ResourceNamer::new("my_org", "repo.v2");
        assert_eq!(namer.name("a  b").as_str(), "quickcd-my-org-repo-v2-a-b");
    }

    #[test]
    fn includes_optional_category() {
        let namer = ResourceNamer::new("o", "r");
        assert_eq!(namer.categorized(Some("lock"), "x").as_str(), "quickcd-o-r-lock-x");
        assert_eq!(namer.categorized(Some(""), "x").as_str(), "quickcd-o-r-x");
    }
}
