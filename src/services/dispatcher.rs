//! Delivery dispatcher
//!
//! Each delivery attempt draws one endpoint and one token from the pools,
//! issues a single Bot API call and reports the outcome back into the pools.
//! Attempts are wrapped in the fixed-delay retry wrapper.

use crate::error::{UploadError, UploadResult};
use crate::pipeline::{Batch, Deliver, MediaItem};
use crate::schemas::telegram::ApiResponse;
use crate::services::backend_pool::{CredentialPool, EndpointPool};
use crate::services::telegram::{BotApiClient, CallError};
use crate::utils::{mask_token, retry_with_delay, RetryConfig, RetryDecision};
use async_trait::async_trait;
use std::sync::Arc;

/// Retry classification for delivery errors
pub fn classify(err: &UploadError) -> RetryDecision {
    if err.is_fatal() {
        RetryDecision::Abort
    } else if err.is_rate_limited() {
        RetryDecision::Cooldown(err.retry_after())
    } else {
        RetryDecision::Retry
    }
}

/// Payload of one delivery attempt
enum Payload<'a> {
    Text(&'a str),
    MediaGroup(&'a [MediaItem]),
}

/// Delivers messages and media groups to one chat through the shared pools
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: BotApiClient,
    endpoints: Arc<EndpointPool>,
    credentials: Arc<CredentialPool>,
    chat_id: String,
    retry: RetryConfig,
}

impl Dispatcher {
    pub fn new(
        client: BotApiClient,
        endpoints: Arc<EndpointPool>,
        credentials: Arc<CredentialPool>,
        chat_id: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            client,
            endpoints,
            credentials,
            chat_id: chat_id.into(),
            retry,
        }
    }

    pub fn endpoints(&self) -> &Arc<EndpointPool> {
        &self.endpoints
    }

    pub fn credentials(&self) -> &Arc<CredentialPool> {
        &self.credentials
    }

    /// Draw one endpoint and one token for an attempt
    fn draw(&self) -> UploadResult<(String, String)> {
        let endpoint = self
            .endpoints
            .select()
            .ok_or(UploadError::PoolExhausted { pool: "endpoint" })?;
        let token = self
            .credentials
            .select()
            .ok_or(UploadError::PoolExhausted { pool: "credential" })?;
        Ok((endpoint, token))
    }

    /// One attempt: draw, call, and record the outcome in the pools
    async fn attempt(&self, payload: &Payload<'_>) -> UploadResult<()> {
        let (endpoint, token) = self.draw()?;

        let outcome = match payload {
            Payload::Text(text) => {
                self.client
                    .send_message(&endpoint, &token, &self.chat_id, text)
                    .await
            }
            Payload::MediaGroup(items) => {
                self.client
                    .send_media_group(&endpoint, &token, &self.chat_id, items)
                    .await
            }
        };

        self.settle(&endpoint, &token, outcome)
    }

    fn settle(
        &self,
        endpoint: &str,
        token: &str,
        outcome: Result<ApiResponse, CallError>,
    ) -> UploadResult<()> {
        match outcome {
            Ok(response) if response.ok => {
                self.endpoints.record_success(endpoint);
                self.credentials.record_success(token);
                Ok(())
            }
            Ok(response) => {
                let reason = response.failure_reason();
                tracing::error!(
                    endpoint = %endpoint,
                    token = %mask_token(token),
                    error_code = ?response.error_code,
                    reason = %reason,
                    "Bot API rejected the call"
                );
                self.credentials.record_failure(token);
                let retry_after = response.parameters.as_ref().and_then(|p| p.retry_after);
                Err(UploadError::from_api_failure(reason, response.error_code, retry_after))
            }
            Err(e) => {
                tracing::error!(
                    endpoint = %endpoint,
                    token = %mask_token(token),
                    error = %e,
                    "Bot API call failed"
                );
                self.credentials.record_failure(token);
                if e.is_unreachable() {
                    self.endpoints.record_failure(endpoint);
                }
                Err(UploadError::Delivery {
                    reason: e.to_string(),
                })
            }
        }
    }

    async fn deliver(&self, payload: Payload<'_>) -> UploadResult<u32> {
        let payload = &payload;
        let outcome = retry_with_delay(&self.retry, classify, move || self.attempt(payload)).await;
        outcome.result.map(|_| outcome.attempts)
    }
}

#[async_trait]
impl Deliver for Dispatcher {
    async fn send_text(&self, text: &str) -> UploadResult<()> {
        let attempts = self.deliver(Payload::Text(text)).await?;
        tracing::debug!(attempts, "Delivered message");
        Ok(())
    }

    async fn send_media_group(&self, batch: &Batch) -> UploadResult<()> {
        let attempts = self.deliver(Payload::MediaGroup(&batch.items)).await?;
        tracing::info!(
            batch = batch.index,
            items = batch.len(),
            attempts,
            "Delivered media group"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn dispatcher(endpoints: &[&str], tokens: &[&str]) -> Dispatcher {
        Dispatcher::new(
            BotApiClient::new(Some(Duration::from_secs(2))).unwrap(),
            Arc::new(EndpointPool::new(endpoints.iter().copied()).unwrap()),
            Arc::new(CredentialPool::from_verified(tokens.iter().copied())),
            "@channel",
            RetryConfig::new()
                .with_max_attempts(3)
                .with_delay(Duration::ZERO)
                .with_rate_limit_cooldown(Duration::ZERO),
        )
    }

    fn response(json: &str) -> ApiResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify(&UploadError::PoolExhausted { pool: "endpoint" }),
            RetryDecision::Abort
        );
        assert_eq!(
            classify(&UploadError::RateLimited {
                reason: "Too Many Requests".into(),
                retry_after: None,
            }),
            RetryDecision::Cooldown(None)
        );
        assert_eq!(
            classify(&UploadError::RateLimited {
                reason: "Too Many Requests".into(),
                retry_after: Some(Duration::from_secs(40)),
            }),
            RetryDecision::Cooldown(Some(Duration::from_secs(40)))
        );
        assert_eq!(
            classify(&UploadError::Delivery { reason: "Bad Gateway".into() }),
            RetryDecision::Retry
        );
    }

    #[test]
    fn test_settle_success_counts_both_pools() {
        let d = dispatcher(&["a.example"], &["token-a"]);
        d.settle("https://a.example", "token-a", Ok(response(r#"{"ok":true}"#)))
            .unwrap();
        assert_eq!(d.endpoints.uses("https://a.example"), Some(1));
        assert_eq!(d.credentials.uses("token-a"), Some(1));
    }

    #[test]
    fn test_settle_rejection_removes_only_the_token() {
        let d = dispatcher(&["a.example"], &["token-a", "token-b"]);
        let err = d
            .settle(
                "https://a.example",
                "token-a",
                Ok(response(r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#)),
            )
            .unwrap_err();

        assert!(matches!(err, UploadError::Delivery { ref reason } if reason == "Unauthorized"));
        assert!(!d.credentials.contains("token-a"));
        assert!(d.endpoints.contains("https://a.example"));
        assert_eq!(d.endpoints.uses("https://a.example"), Some(0));
    }

    #[test]
    fn test_settle_rate_limit_is_classified() {
        let d = dispatcher(&["a.example"], &["token-a"]);
        let err = d
            .settle(
                "https://a.example",
                "token-a",
                Ok(response(
                    r#"{"ok":false,"error_code":429,"description":"Too Many Requests: retry after 45","parameters":{"retry_after":45}}"#,
                )),
            )
            .unwrap_err();
        assert!(err.is_rate_limited());
        assert_eq!(
            classify(&err),
            RetryDecision::Cooldown(Some(Duration::from_secs(45)))
        );
        assert!(!d.credentials.contains("token-a"));
    }

    #[tokio::test]
    async fn test_empty_endpoint_pool_is_pool_exhausted() {
        let d = dispatcher(&["a.example"], &["token-a"]);
        d.endpoints.record_failure("https://a.example");

        let err = d.send_text("hello").await.unwrap_err();
        assert!(err.is_pool_exhausted());
        // No attempt reached the network, so the token is untouched
        assert!(d.credentials.contains("token-a"));
    }

    #[tokio::test]
    async fn test_empty_credential_pool_is_pool_exhausted() {
        let d = dispatcher(&["a.example"], &["token-a"]);
        d.credentials.record_failure("token-a");

        let batch = Batch {
            index: 0,
            items: vec![MediaItem::new("a.jpg", vec![1])],
        };
        let err = d.send_media_group(&batch).await.unwrap_err();
        assert!(matches!(err, UploadError::PoolExhausted { pool: "credential" }));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_removed_with_token() {
        let d = dispatcher(&["http://127.0.0.1:9"], &["token-a", "token-b", "token-c"]);

        let err = d.send_text("hello").await.unwrap_err();
        // First attempt removes the mirror, the retry then finds the pool empty
        assert!(err.is_pool_exhausted());
        assert!(d.endpoints.is_empty());
        assert_eq!(d.credentials.len(), 2);
    }
}
