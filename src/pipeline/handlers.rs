// ABOUTME: Reference handlers: deploy pushes to a branch, and pull requests merged into a base.
// ABOUTME: Both are blocking so deployments follow repository history.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::charts::DeployableDiff;
use crate::events::{Handler, HandlerContext, HandlerError};
use crate::github::BuildStatus;

use super::env::PipelineEnv;
use super::error::Result;
use super::git::{PullRequestPayload, PushPayload, checkout_push, merge_pull_request};
use super::process::Outcome;

pub const PUSH_EVENT: &str = "PushEvent";
pub const PULL_REQUEST_EVENT: &str = "PullRequestEvent";

/// Pull request actions that trigger a deployment.
const DEPLOY_ACTIONS: [&str; 2] = ["opened", "reopened"];

/// Deploys every push to one branch.
#[derive(Debug)]
pub struct PushHandler {
    name: String,
    git_ref: String,
    env: Arc<PipelineEnv>,
}

impl PushHandler {
    pub fn new(branch: &str, env: Arc<PipelineEnv>) -> Self {
        Self {
            name: format!("deploy-push-{branch}"),
            git_ref: format!("refs/heads/{branch}"),
            env,
        }
    }

    async fn deploy(&self, ctx: &HandlerContext, payload: &Value) -> Result<Outcome> {
        let push: PushPayload = serde_json::from_value(payload.clone())?;
        let log = self.env.start_log(&push.head, &self.name).await?;
        log.section("Event", &serde_json::to_string_pretty(payload)?)
            .await;

        let shell = self.env.shell(ctx, log.clone());
        checkout_push(&shell, &self.env.repo_url, &push).await?;

        let deployer = self.env.tooling.deployer(shell.clone());
        let jobs = self.env.tooling.jobs(shell.clone());
        let mut diff = DeployableDiff::new(
            &push.before,
            &push.head,
            &push.head,
            push.authors(),
            Vec::new(),
            log,
        );
        self.env
            .pipeline(&deployer, &jobs)
            .process_checkout(&mut diff, &shell)
            .await
    }
}

#[async_trait]
impl Handler for PushHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, payload: &Value) -> std::result::Result<bool, HandlerError> {
        payload
            .get("ref")
            .and_then(Value::as_str)
            .map(|r| r == self.git_ref)
            .ok_or_else(|| HandlerError::failed("push payload has no ref"))
    }

    async fn run(&self, ctx: &HandlerContext, payload: &Value) -> std::result::Result<(), HandlerError> {
        let outcome = self.deploy(ctx, payload).await?;
        tracing::info!(handler = %self.name, event_id = %ctx.event_id, ?outcome, "push processed");
        Ok(())
    }
}

/// Deploys the speculative merge of pull requests opened against one base branch.
#[derive(Debug)]
pub struct PullRequestHandler {
    name: String,
    base: String,
    env: Arc<PipelineEnv>,
}

impl PullRequestHandler {
    pub fn new(base: &str, env: Arc<PipelineEnv>) -> Self {
        Self {
            name: format!("deploy-pull-request-{base}"),
            base: base.to_string(),
            env,
        }
    }

    async fn deploy(&self, ctx: &HandlerContext, payload: &Value) -> Result<Option<Outcome>> {
        let event: PullRequestPayload = serde_json::from_value(payload.clone())?;
        let pr = &event.pull_request;
        let log = self.env.start_log(&pr.head.sha, &self.name).await?;
        log.section("Event", &serde_json::to_string_pretty(payload)?)
            .await;
        let authors = self.env.github.pull_request_authors(&pr.commits_url).await?;

        let shell = self.env.shell(ctx, log.clone());
        let Some(merge) = merge_pull_request(&shell, &self.env.repo_url, pr).await? else {
            self.env
                .statuses
                .set_status(&pr.head.sha, BuildStatus::Failure, "Merge conflict", log.html_url())
                .await;
            return Ok(None);
        };

        let deployer = self.env.tooling.deployer(shell.clone());
        let jobs = self.env.tooling.jobs(shell.clone());
        let mut diff = DeployableDiff::new(
            &pr.base.sha,
            &pr.head.sha,
            merge,
            authors,
            Vec::new(),
            log,
        );
        let outcome = self
            .env
            .pipeline(&deployer, &jobs)
            .process_checkout(&mut diff, &shell)
            .await?;
        Ok(Some(outcome))
    }
}

#[async_trait]
impl Handler for PullRequestHandler {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, payload: &Value) -> std::result::Result<bool, HandlerError> {
        let base = payload
            .pointer("/pull_request/base/ref")
            .and_then(Value::as_str);
        let action = payload.get("action").and_then(Value::as_str);
        match (base, action) {
            (Some(base), Some(action)) => Ok(base == self.base && DEPLOY_ACTIONS.contains(&action)),
            _ => Err(HandlerError::failed("pull request payload has no base ref or action")),
        }
    }

    async fn run(&self, ctx: &HandlerContext, payload: &Value) -> std::result::Result<(), HandlerError> {
        let outcome = self.deploy(ctx, payload).await?;
        tracing::info!(handler = %self.name, event_id = %ctx.event_id, ?outcome, "pull request processed");
        Ok(())
    }
}
