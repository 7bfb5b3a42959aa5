//! Telegram Bot API client
//!
//! Thin HTTP layer over the three Bot API methods the uploader uses. It does
//! not touch the pools: callers pass the endpoint and token for every call and
//! decide what the outcome means.

use crate::pipeline::MediaItem;
use crate::schemas::telegram::{file_key, photo_manifest, ApiResponse};
use crate::services::backend_pool::TokenProbe;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use std::time::Duration;

/// Errors from a single Bot API call
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Failed to encode request: {0}")]
    Encode(String),
}

impl CallError {
    /// No connection to the endpoint could be established
    pub fn is_unreachable(&self) -> bool {
        matches!(self, CallError::Transport(e) if e.is_connect())
    }
}

/// Client for `{endpoint}/bot{token}/{method}` calls
#[derive(Debug, Clone)]
pub struct BotApiClient {
    client: Client,
}

impl BotApiClient {
    /// Create a client; `timeout` of `None` keeps the transport default
    ///
    /// Proxy environment variables (`HTTPS_PROXY`, `HTTP_PROXY`, `ALL_PROXY`)
    /// are picked up by reqwest's system proxy support.
    pub fn new(timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    fn method_url(endpoint: &str, token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", endpoint, token, method)
    }

    /// `GET getMe`
    pub async fn get_me(&self, endpoint: &str, token: &str) -> Result<ApiResponse, CallError> {
        let url = Self::method_url(endpoint, token, "getMe");
        let response = self.client.get(&url).send().await?;
        Ok(response.json::<ApiResponse>().await?)
    }

    /// `POST sendMessage` with a form-encoded body
    pub async fn send_message(
        &self,
        endpoint: &str,
        token: &str,
        chat_id: &str,
        text: &str,
    ) -> Result<ApiResponse, CallError> {
        let url = Self::method_url(endpoint, token, "sendMessage");
        let response = self
            .client
            .post(&url)
            .form(&[("chat_id", chat_id), ("text", text)])
            .send()
            .await?;
        Ok(response.json::<ApiResponse>().await?)
    }

    /// `POST sendMediaGroup` with one file part per item
    pub async fn send_media_group(
        &self,
        endpoint: &str,
        token: &str,
        chat_id: &str,
        items: &[MediaItem],
    ) -> Result<ApiResponse, CallError> {
        let url = Self::method_url(endpoint, token, "sendMediaGroup");
        let form = build_media_group_form(chat_id, items)?;
        let response = self.client.post(&url).multipart(form).send().await?;
        Ok(response.json::<ApiResponse>().await?)
    }
}

/// Multipart body for `sendMediaGroup`
///
/// Files go under `file0..fileN` and the `media` field references them in
/// batch order.
pub fn build_media_group_form(chat_id: &str, items: &[MediaItem]) -> Result<Form, CallError> {
    let manifest = serde_json::to_string(&photo_manifest(items.len()))
        .map_err(|e| CallError::Encode(e.to_string()))?;

    let mut form = Form::new().text("chat_id", chat_id.to_string());
    for (index, item) in items.iter().enumerate() {
        let part = Part::bytes(item.bytes.clone())
            .file_name(item.name.clone())
            .mime_str(item.content_type())?;
        form = form.part(file_key(index), part);
    }
    Ok(form.text("media", manifest))
}

#[async_trait]
impl TokenProbe for BotApiClient {
    async fn is_alive(&self, endpoint: &str, token: &str) -> bool {
        match self.get_me(endpoint, token).await {
            Ok(response) => {
                tracing::debug!(ok = response.ok, endpoint = %endpoint, "getMe response");
                response.ok
            }
            Err(e) => {
                tracing::debug!(error = %e, endpoint = %endpoint, "getMe call failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_url() {
        assert_eq!(
            BotApiClient::method_url("https://api.telegram.org", "123:abc", "getMe"),
            "https://api.telegram.org/bot123:abc/getMe"
        );
    }

    #[test]
    fn test_media_group_form_has_boundary() {
        let items = vec![
            MediaItem::new("a.jpg", vec![1, 2, 3]),
            MediaItem::new("b.png", vec![4, 5]),
        ];
        let form = build_media_group_form("@channel", &items).unwrap();
        assert!(!form.boundary().is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_fails_probe() {
        let client = BotApiClient::new(Some(Duration::from_secs(2))).unwrap();
        // Port 9 (discard) on localhost is not listening in test environments
        assert!(!client.is_alive("http://127.0.0.1:9", "123:abc").await);
    }
}
