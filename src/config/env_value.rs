// ABOUTME: Config values that are either literals or read from the environment.
// ABOUTME: Keeps secrets such as the GitHub token out of quickcd.yml.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::fmt;

#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum EnvValue {
    Literal(String),
    FromEnv {
        #[serde(rename = "env")]
        var: String,
        #[serde(default)]
        default: Option<String>,
    },
}

impl EnvValue {
    pub fn resolve(&self) -> Result<String> {
        match self {
            EnvValue::Literal(s) => Ok(s.clone()),
            EnvValue::FromEnv { var, default } => match std::env::var(var) {
                Ok(val) if !val.is_empty() => Ok(val),
                _ => default
                    .clone()
                    .ok_or_else(|| Error::MissingEnvVar(var.clone())),
            },
        }
    }
}

// Literal values may be secrets.
impl fmt::Debug for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Literal(_) => f.write_str("Literal(***)"),
            EnvValue::FromEnv { var, .. } => f.debug_struct("FromEnv").field("var", var).finish(),
        }
    }
}
