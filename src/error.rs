// ABOUTME: Application-wide error type for quickcd.
// ABOUTME: Wraps config, integration and engine errors for the binary.

use std::path::PathBuf;
use thiserror::Error;

use crate::events::{DispatchError, FetchError};
use crate::exec::ExecError;
use crate::github::GithubError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found in {0}")]
    ConfigNotFound(PathBuf),

    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("no handlers registered")]
    NoHandlers,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Github(#[from] GithubError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("fetch cycle failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("dispatch failed: {0}")]
    Dispatch(#[from] DispatchError),

    #[error("bootstrap command failed: {0}")]
    Bootstrap(#[from] ExecError),
}

pub type Result<T> = std::result::Result<T, Error>;
