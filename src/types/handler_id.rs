// ABOUTME: Stable handler identifiers derived from handler names.
// ABOUTME: Used as label keys, so completed work survives redeploys of the loop.

use sha2::{Digest, Sha256};
use std::fmt;

const PREFIX: &str = "handler-";
const DIGEST_CHARS: usize = 16;

/// Deterministic id for a logical handler.
///
/// Same name, same id, across processes and releases. Short enough that the
/// derived `<id>_attempts` and `<id>_last_run` keys remain valid label names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(String);

impl HandlerId {
    pub fn from_name(name: &str) -> Self {
        let digest = hex::encode(Sha256::digest(name.as_bytes()));
        Self(format!("{PREFIX}{}", &digest[..DIGEST_CHARS]))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Label key recording the number of charged attempts.
    pub fn attempts_label(&self) -> String {
        format!("{}_attempts", self.0)
    }

    /// Label key recording the unix timestamp of the last attempt.
    pub fn last_run_label(&self) -> String {
        format!("{}_last_run", self.0)
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_id() {
        assert_eq!(HandlerId::from_name("push_to_staging"), HandlerId::from_name("push_to_staging"));
    }

    #[test]
    fn different_names_differ() {
        assert_ne!(HandlerId::from_name("a"), HandlerId::from_name("b"));
    }

    #[test]
    fn id_shape_is_label_safe() {
        let id = HandlerId::from_name("deploy pull requests");
        assert!(id.as_str().starts_with("handler-"));
        assert_eq!(id.as_str().len(), PREFIX.len() + DIGEST_CHARS);
        assert!(id.attempts_label().len() <= 63);
        assert!(id.last_run_label().ends_with("_last_run"));
    }
}
