// ABOUTME: Reference deployment pipelines wired into the event registry.
// ABOUTME: Push and pull-request handlers share one PipelineEnv.

mod env;
mod error;
mod git;
mod handlers;
mod process;

pub use env::{ChartTooling, PipelineEnv};
pub use error::{PipelineError, Result};
pub use git::{
    BranchRef, PullRequest, PullRequestPayload, PushCommit, PushPayload, Repo, checkout_push,
    merge_pull_request,
};
pub use handlers::{PULL_REQUEST_EVENT, PUSH_EVENT, PullRequestHandler, PushHandler};
pub use process::{Outcome, Pipeline};

use std::sync::Arc;

use crate::config::PipelineConfig;
use crate::events::Registry;

/// Register one blocking handler per configured pipeline.
pub fn register_pipelines(registry: &mut Registry, pipelines: &[PipelineConfig], env: Arc<PipelineEnv>) {
    for pipeline in pipelines {
        match pipeline {
            PipelineConfig::Push { branch } => {
                registry.register_blocking(PUSH_EVENT, PushHandler::new(branch, env.clone()));
            }
            PipelineConfig::PullRequest { base } => {
                registry.register_blocking(
                    PULL_REQUEST_EVENT,
                    PullRequestHandler::new(base, env.clone()),
                );
            }
        }
    }
}
