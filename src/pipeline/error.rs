// ABOUTME: Errors raised inside a deployment pipeline run.
// ABOUTME: Converted to handler errors at the handler boundary; chart invariant breaks become fatal.

use crate::charts::ChartError;
use crate::events::HandlerError;
use crate::exec::ExecError;
use crate::github::GithubError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Chart(#[from] ChartError),

    #[error(transparent)]
    Command(#[from] ExecError),

    #[error("GitHub request failed: {0}")]
    Github(#[from] GithubError),

    #[error("unexpected event payload: {0}")]
    Payload(#[from] serde_json::Error),
}

impl From<PipelineError> for HandlerError {
    fn from(err: PipelineError) -> Self {
        match &err {
            PipelineError::Chart(e) if e.is_invariant() => HandlerError::fatal(err),
            _ => HandlerError::failed(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
