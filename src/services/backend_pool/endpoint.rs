//! Endpoint pool
//!
//! Tracks the Bot API mirrors a run may talk to. Addresses are normalized on
//! construction and a mirror that fails is dropped for the rest of the run.

use super::pool::{PoolEntry, PoolStats, UsagePool};
use crate::error::{UploadError, UploadResult};

/// Normalize a configured mirror address
///
/// Adds `https://` when no scheme is present and strips one trailing slash.
/// Returns `None` for blank input.
pub fn normalize_address(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut address = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    if address.ends_with('/') {
        address.pop();
    }
    Some(address)
}

/// Pool of Bot API mirror endpoints
#[derive(Debug)]
pub struct EndpointPool {
    inner: UsagePool,
}

impl EndpointPool {
    /// Build the pool from raw configured addresses
    pub fn new<I, S>(raw_addresses: I) -> UploadResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let addresses: Vec<String> = raw_addresses
            .into_iter()
            .filter_map(|raw| normalize_address(raw.as_ref()))
            .collect();

        let inner = UsagePool::new("endpoint", addresses);
        if inner.is_empty() {
            return Err(UploadError::Config(
                "no usable API endpoint configured".to_string(),
            ));
        }

        tracing::info!(endpoints = inner.len(), "Initialized endpoint pool");
        Ok(Self { inner })
    }

    /// Least-used working endpoint, or `None` once every mirror has failed
    pub fn select(&self) -> Option<String> {
        self.inner.select()
    }

    pub fn record_success(&self, endpoint: &str) {
        self.inner.record_success(endpoint);
    }

    pub fn record_failure(&self, endpoint: &str) {
        if self.inner.record_failure(endpoint) {
            tracing::warn!(
                endpoint = %endpoint,
                remaining = self.inner.len(),
                "Removed failing endpoint"
            );
        }
    }

    pub fn contains(&self, endpoint: &str) -> bool {
        self.inner.contains(endpoint)
    }

    pub fn uses(&self, endpoint: &str) -> Option<u64> {
        self.inner.uses(endpoint)
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
