//! Credential pool and startup token probing
//!
//! This module defines the `TokenProbe` trait used to verify bot tokens at
//! startup and the `CredentialPool` holding the tokens that passed.

use super::endpoint::EndpointPool;
use super::pool::{PoolEntry, PoolStats, UsagePool};
use crate::error::{UploadError, UploadResult};
use crate::utils::mask_token;
use async_trait::async_trait;

// ============================================================================
// Token Probe
// ============================================================================

/// Liveness check for a bot token against one endpoint
#[async_trait]
pub trait TokenProbe: Send + Sync {
    /// Returns true only on a well-formed "ok" response
    async fn is_alive(&self, endpoint: &str, token: &str) -> bool;
}

// ============================================================================
// Credential Pool
// ============================================================================

/// Pool of bot tokens that passed the startup probe
#[derive(Debug)]
pub struct CredentialPool {
    inner: UsagePool,
}

impl CredentialPool {
    /// Probe every configured token and keep the live ones
    ///
    /// Each probe draws an endpoint from `endpoints` and bumps its usage count
    /// whatever the outcome. Fails if the endpoint pool runs dry or if no
    /// token survives.
    pub async fn probe<P, I, S>(
        endpoints: &EndpointPool,
        prober: &P,
        raw_tokens: I,
    ) -> UploadResult<Self>
    where
        P: TokenProbe + ?Sized,
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let candidates = clean_tokens(raw_tokens);
        tracing::info!(candidates = candidates.len(), "Probing bot tokens");

        let mut live = Vec::with_capacity(candidates.len());
        for token in candidates {
            let endpoint = endpoints.select().ok_or_else(|| {
                UploadError::Config("no endpoint left to probe tokens against".to_string())
            })?;

            let alive = prober.is_alive(&endpoint, &token).await;
            endpoints.record_success(&endpoint);

            if alive {
                tracing::info!(token = %mask_token(&token), endpoint = %endpoint, "Token probe succeeded");
                live.push(token);
            } else {
                tracing::error!(token = %mask_token(&token), endpoint = %endpoint, "Token probe failed");
            }
        }

        let pool = Self::from_verified(live);
        if pool.is_empty() {
            return Err(UploadError::Config(
                "no bot token passed the liveness probe".to_string(),
            ));
        }

        tracing::info!(tokens = pool.len(), "Initialized credential pool");
        Ok(pool)
    }

    /// Build a pool from tokens that are already known to work
    pub fn from_verified<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            inner: UsagePool::new("credential", clean_tokens(tokens)),
        }
    }

    /// Least-used working token, or `None` once every token has failed
    pub fn select(&self) -> Option<String> {
        self.inner.select()
    }

    pub fn record_success(&self, token: &str) {
        self.inner.record_success(token);
    }

    pub fn record_failure(&self, token: &str) {
        if self.inner.record_failure(token) {
            tracing::warn!(
                token = %mask_token(token),
                remaining = self.inner.len(),
                "Removed failing token"
            );
        }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.inner.contains(token)
    }

    pub fn uses(&self, token: &str) -> Option<u64> {
        self.inner.uses(token)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn snapshot(&self) -> Vec<PoolEntry> {
        self.inner.snapshot()
    }

    pub fn stats(&self) -> PoolStats {
        self.inner.stats()
    }
}

/// Trim tokens and drop blanks and repeats, keeping configuration order
fn clean_tokens<I, S>(raw_tokens: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut tokens: Vec<String> = Vec::new();
    for raw in raw_tokens {
        let token = raw.as_ref().trim();
        if !token.is_empty() && !tokens.iter().any(|t| t == token) {
            tokens.push(token.to_string());
        }
    }
    tokens
}

// ============================================================================
// Tests
// ============================================================================
