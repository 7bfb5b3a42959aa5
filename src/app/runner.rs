//! Application runner
//!
//! Runs one upload pipeline per requested source. Pipelines run concurrently
//! and are joined before the run finishes; each one is sequential inside.

use crate::app::state::AppState;
use crate::config::Settings;
use crate::error::UploadResult;
use crate::pipeline::{ArchiveSource, Batcher, DirectorySource, MediaSource, PipelineReport};
use anyhow::Result;
use futures::future::join_all;
use std::fmt;
use std::path::PathBuf;
use tokio::signal;
use tracing::Instrument;
use uuid::Uuid;

/// A source to upload from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceTarget {
    Archive(PathBuf),
    Directory(PathBuf),
}

impl SourceTarget {
    fn open(&self) -> UploadResult<Box<dyn MediaSource>> {
        Ok(match self {
            SourceTarget::Archive(path) => Box::new(ArchiveSource::open(path)?),
            SourceTarget::Directory(path) => Box::new(DirectorySource::open(path)?),
        })
    }
}

impl fmt::Display for SourceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceTarget::Archive(path) => write!(f, "archive:{}", path.display()),
            SourceTarget::Directory(path) => write!(f, "directory:{}", path.display()),
        }
    }
}

/// Main application struct
pub struct App {
    state: AppState,
}

impl App {
    /// Create a new application instance
    ///
    /// Builds the pools (probing every token) before anything is uploaded.
    pub async fn new(settings: Settings) -> Result<Self> {
        tracing::debug!("Initializing application state");
        let state = AppState::new(settings).await?;
        Ok(Self { state })
    }

    /// Upload every target, returning one result per target in input order
    pub async fn run(&self, targets: &[SourceTarget]) -> Vec<UploadResult<PipelineReport>> {
        let results = join_all(targets.iter().map(|target| self.run_pipeline(target))).await;

        let endpoints = self.state.endpoints.stats();
        let credentials = self.state.credentials.stats();
        tracing::info!(
            endpoints_working = endpoints.working,
            endpoints_removed = endpoints.removed,
            tokens_working = credentials.working,
            tokens_removed = credentials.removed,
            "All pipelines finished"
        );

        results
    }

    /// Run with Ctrl+C / SIGTERM handling
    ///
    /// Fails if interrupted or if any pipeline failed.
    pub async fn run_until_complete(&self, targets: &[SourceTarget]) -> Result<Vec<PipelineReport>> {
        let results = tokio::select! {
            results = self.run(targets) => results,
            _ = shutdown_signal() => {
                anyhow::bail!("Interrupted before all uploads completed");
            }
        };

        let mut reports = Vec::with_capacity(results.len());
        let mut failures = 0;
        for (target, result) in targets.iter().zip(results) {
            match result {
                Ok(report) => reports.push(report),
                Err(e) => {
                    failures += 1;
                    tracing::error!(source = %target, error = %e, "Pipeline failed");
                }
            }
        }

        if failures > 0 {
            anyhow::bail!("{} of {} upload pipelines failed", failures, targets.len());
        }
        Ok(reports)
    }

    async fn run_pipeline(&self, target: &SourceTarget) -> UploadResult<PipelineReport> {
        let span = tracing::info_span!("pipeline", source = %target, run_id = %Uuid::new_v4());

        async move {
            let mut source = target.open()?;
            let batcher = Batcher::new(&self.state.dispatcher, self.state.settings.batch_config());
            batcher.run(source.as_mut()).await
        }
        .instrument(span)
        .await
    }

    /// Get a reference to the application state
    pub fn state(&self) -> &AppState {
        &self.state
    }
}

/// Create a future that completes when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, stopping uploads");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, stopping uploads");
        }
    }
}
