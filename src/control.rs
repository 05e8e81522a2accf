// ABOUTME: The main control loop: refresh credentials, fetch, drain dispatch, idle.
// ABOUTME: Also assembles the store, event source and registry from a Config.

use std::sync::Arc;
use std::time::Duration;

use crate::bootstrap::Bootstrap;
use crate::config::{Config, StoreKind};
use crate::error::{Error, Result};
use crate::events::{
    Clock, DispatchError, Dispatcher, EventSource, FetchError, Fetcher, Registry, SystemClock,
    Workspace,
};
use crate::github::{CommitStatuses, GithubClient};
use crate::notify::{LogNotifier, Notifier, SendmailNotifier};
use crate::pipeline::{PipelineEnv, register_pipelines};
use crate::shutdown::Shutdown;
use crate::store::{KubectlStore, MemoryStore, StateStore};
use crate::types::ResourceNamer;

pub struct ControlLoop {
    store: Arc<dyn StateStore>,
    source: Arc<dyn EventSource>,
    registry: Registry,
    namer: ResourceNamer,
    workspace: Workspace,
    clock: Arc<dyn Clock>,
    shutdown: Arc<Shutdown>,
    idle_interval: Duration,
    dispatch_interval: Duration,
    bootstrap: Option<Bootstrap>,
}

impl ControlLoop {
    pub fn new(
        store: Arc<dyn StateStore>,
        source: Arc<dyn EventSource>,
        registry: Registry,
        namer: ResourceNamer,
        workspace: Workspace,
        shutdown: Arc<Shutdown>,
    ) -> Self {
        Self {
            store,
            source,
            registry,
            namer,
            workspace,
            clock: Arc::new(SystemClock),
            shutdown,
            idle_interval: Duration::from_secs(60),
            dispatch_interval: Duration::from_secs(1),
            bootstrap: None,
        }
    }

    /// Wire everything a config describes: GitHub feed, store, pipelines, bootstrap.
    pub fn from_config(config: &Config, shutdown: Arc<Shutdown>) -> Result<Self> {
        let token = config.github.token()?;
        let github = Arc::new(GithubClient::new(config.github.api_url(), token.as_deref())?);
        let runner = config.runner();

        let store: Arc<dyn StateStore> = match config.store {
            StoreKind::Kubectl => Arc::new(KubectlStore::new(runner.clone(), &config.namespace)),
            StoreKind::Memory => Arc::new(MemoryStore::new()),
        };
        let notifier: Arc<dyn Notifier> = match &config.email {
            Some(email) => Arc::new(SendmailNotifier::new(
                runner.clone(),
                &email.sendmail,
                &email.from,
            )),
            None => Arc::new(LogNotifier),
        };

        let env = Arc::new(PipelineEnv {
            cluster_id: config.cluster_id(),
            repo_url: config.github.repo_url(),
            github: github.clone(),
            statuses: Arc::new(CommitStatuses::new(github.clone(), config.cluster_id())),
            notifier,
            runner: runner.clone(),
            tooling: config.chart_tooling(),
        });
        let mut registry = Registry::new();
        register_pipelines(&mut registry, &config.pipelines, env);

        let mut bootstrap = Bootstrap::new(
            runner,
            &config.bootstrap,
            config.polling.credentials_refresh,
        );
        if let Some(token) = &token {
            bootstrap = bootstrap.with_git_token(config.github.web_domain(), token);
        }

        Ok(Self::new(
            store,
            github,
            registry,
            config.namer(),
            Workspace::new(&config.workspace),
            shutdown,
        )
        .intervals(config.polling.idle_interval, config.polling.dispatch_interval)
        .bootstrap(bootstrap))
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn intervals(mut self, idle: Duration, dispatch: Duration) -> Self {
        self.idle_interval = idle;
        self.dispatch_interval = dispatch;
        self
    }

    pub fn bootstrap(mut self, bootstrap: Bootstrap) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Run the startup commands once.
    pub async fn start(&mut self) -> Result<()> {
        if let Some(bootstrap) = &mut self.bootstrap {
            bootstrap.startup().await?;
        }
        Ok(())
    }

    /// One fetch cycle. Returns whether durable state changed.
    pub async fn fetch_cycle(&self) -> std::result::Result<bool, FetchError> {
        Fetcher::new(
            self.store.as_ref(),
            self.source.as_ref(),
            &self.registry,
            &self.namer,
        )
        .fetch_and_persist()
        .await
    }

    /// Dispatch until nothing is runnable or shutdown is requested.
    ///
    /// Returns the number of steps that did work.
    pub async fn drain(&self) -> std::result::Result<usize, DispatchError> {
        let dispatcher = Dispatcher::new(
            self.store.as_ref(),
            &self.registry,
            &self.namer,
            &self.workspace,
            self.clock.as_ref(),
        );
        let mut steps = 0;
        while !self.shutdown.is_requested() {
            if !dispatcher.process_next_pending().await? {
                break;
            }
            steps += 1;
            if !self.shutdown.sleep(self.dispatch_interval).await {
                break;
            }
        }
        Ok(steps)
    }

    /// Loop until shutdown. Only fatal handler errors and bootstrap failures end it early.
    pub async fn run(&mut self) -> Result<()> {
        if self.registry.is_empty() {
            return Err(Error::NoHandlers);
        }
        self.start().await?;

        while !self.shutdown.is_requested() {
            if let Some(bootstrap) = &mut self.bootstrap {
                bootstrap.refresh_if_due().await?;
            }

            match self.fetch_cycle().await {
                Ok(changed) => tracing::debug!(changed, "fetch cycle complete"),
                Err(e) => tracing::error!("fetch cycle failed: {}", e),
            }

            match self.drain().await {
                Ok(steps) => tracing::debug!(steps, "dispatch drained"),
                Err(e) if e.is_fatal() => return Err(e.into()),
                Err(e) => tracing::error!("dispatch failed: {}", e),
            }

            if !self.shutdown.is_requested() {
                self.shutdown.sleep(self.idle_interval).await;
            }
        }

        tracing::info!("clean exit");
        Ok(())
    }
}
