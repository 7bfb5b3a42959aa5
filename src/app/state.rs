//! Application state container
//!
//! Owns everything a run shares between its pipelines: the settings, both
//! pools and the dispatcher built on top of them. Built once per run.

use crate::config::Settings;
use crate::error::UploadResult;
use crate::services::{BotApiClient, CredentialPool, Dispatcher, EndpointPool};
use std::sync::Arc;

/// Shared application state
///
/// Cheaply cloneable; pools are shared through `Arc` and serialize their own
/// mutations.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Mirror endpoints still in service
    pub endpoints: Arc<EndpointPool>,

    /// Bot tokens still in service
    pub credentials: Arc<CredentialPool>,

    /// Retrying delivery to the target chat
    pub dispatcher: Dispatcher,
}

impl AppState {
    /// Build the pools and the dispatcher
    ///
    /// Endpoints are built first; every configured token is then probed
    /// against them. Fails before any delivery if either pool ends up empty.
    pub async fn new(settings: Settings) -> UploadResult<Self> {
        let settings = Arc::new(settings);

        tracing::debug!(
            timeout_secs = ?settings.request_timeout_seconds,
            "Creating Bot API client"
        );
        let client = BotApiClient::new(settings.request_timeout())?;

        let endpoints = Arc::new(EndpointPool::new(&settings.api_urls)?);
        let credentials =
            Arc::new(CredentialPool::probe(&endpoints, &client, &settings.tokens).await?);

        let dispatcher = Dispatcher::new(
            client,
            Arc::clone(&endpoints),
            Arc::clone(&credentials),
            settings.chat_id.clone(),
            settings.retry_config(),
        );

        tracing::info!(
            endpoints = endpoints.len(),
            tokens = credentials.len(),
            "Application state initialized"
        );

        Ok(Self {
            settings,
            endpoints,
            credentials,
            dispatcher,
        })
    }
}
