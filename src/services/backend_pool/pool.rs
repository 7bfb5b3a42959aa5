//! Least-used pool implementation
//!
//! This module provides the `UsagePool` shared by the endpoint and credential
//! pools: a shrinking working set of keys with usage counters, where selection
//! always picks among the least-used members.

use rand::seq::SliceRandom;
use rand::thread_rng;
use std::sync::{Mutex, MutexGuard, PoisonError};

// ============================================================================
// Pool Entry
// ============================================================================

/// One member of a pool's working set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry {
    /// Identity of the member (normalized address or token)
    pub key: String,
    /// Number of successful uses so far
    pub uses: u64,
}

impl PoolEntry {
    fn new(key: String) -> Self {
        Self { key, uses: 0 }
    }
}

// ============================================================================
// Usage Pool
// ============================================================================

/// A working set that only shrinks, with least-used random selection
///
/// Every operation holds the mutex for its whole read-modify-write sequence,
/// so concurrent pipelines can share one pool behind an `Arc`.
#[derive(Debug)]
pub struct UsagePool {
    /// Human-readable kind used in logs and errors ("endpoint", "credential")
    kind: &'static str,
    /// Number of members the pool started with
    configured: usize,
    entries: Mutex<Vec<PoolEntry>>,
}

impl UsagePool {
    /// Create a pool from keys, dropping duplicates while keeping first-seen order
    pub fn new(kind: &'static str, keys: impl IntoIterator<Item = String>) -> Self {
        let mut entries: Vec<PoolEntry> = Vec::new();
        for key in keys {
            if !entries.iter().any(|e| e.key == key) {
                entries.push(PoolEntry::new(key));
            }
        }
        Self {
            kind,
            configured: entries.len(),
            entries: Mutex::new(entries),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<PoolEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Pick a random member among those sharing the minimum usage count
    pub fn select(&self) -> Option<String> {
        let entries = self.lock();
        let min_uses = entries.iter().map(|e| e.uses).min()?;
        let candidates: Vec<&PoolEntry> = entries.iter().filter(|e| e.uses == min_uses).collect();
        candidates
            .choose(&mut thread_rng())
            .map(|entry| entry.key.clone())
    }

    /// Increment the usage count of a member; no-op once it has been removed
    pub fn record_success(&self, key: &str) {
        let mut entries = self.lock();
        if let Some(entry) = entries.iter_mut().find(|e| e.key == key) {
            entry.uses += 1;
        }
    }

    /// Remove a member permanently
    ///
    /// Returns true if the member was still in the working set.
    pub fn record_failure(&self, key: &str) -> bool {
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|e| e.key != key);
        before != entries.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().iter().any(|e| e.key == key)
    }

    /// Usage count of a member still in the working set
    pub fn uses(&self, key: &str) -> Option<u64> {
        self.lock().iter().find(|e| e.key == key).map(|e| e.uses)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Copy of the current working set
    pub fn snapshot(&self) -> Vec<PoolEntry> {
        self.lock().clone()
    }

    pub fn stats(&self) -> PoolStats {
        let working = self.len();
        PoolStats {
            kind: self.kind,
            configured: self.configured,
            working,
            removed: self.configured.saturating_sub(working),
        }
    }
}

// ============================================================================
// Pool Statistics
// ============================================================================

/// Statistics about a pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolStats {
    pub kind: &'static str,
    /// Members the pool started with
    pub configured: usize,
    /// Members still in the working set
    pub working: usize,
    /// Members removed after a failure
    pub removed: usize,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn create_test_pool() -> UsagePool {
        UsagePool::new(
            "test",
            ["a", "b", "c"].into_iter().map(String::from),
        )
    }

    #[test]
    fn test_duplicates_are_dropped() {
        let pool = UsagePool::new("test", ["a", "b", "a"].into_iter().map(String::from));
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.stats().configured, 2);
    }

    #[test]
    fn test_select_never_exceeds_minimum() {
        let pool = create_test_pool();
        pool.record_success("a");
        pool.record_success("a");
        pool.record_success("b");

        for _ in 0..50 {
            assert_eq!(pool.select().as_deref(), Some("c"));
        }

        pool.record_success("c");
        for _ in 0..50 {
            let selected = pool.select().unwrap();
            let min = pool.snapshot().iter().map(|e| e.uses).min().unwrap();
            assert_eq!(pool.uses(&selected), Some(min));
        }
    }

    #[test]
    fn test_ties_are_broken_randomly() {
        let pool = create_test_pool();
        let seen: HashSet<String> = (0..200).filter_map(|_| pool.select()).collect();
        assert_eq!(seen.len(), 3);
    }

    #[test]
    fn test_select_balances_usage() {
        let pool = create_test_pool();
        for _ in 0..30 {
            let key = pool.select().unwrap();
            pool.record_success(&key);
        }
        for entry in pool.snapshot() {
            assert_eq!(entry.uses, 10);
        }
    }

    #[test]
    fn test_removal_is_monotonic() {
        let pool = create_test_pool();
        assert!(pool.record_failure("b"));
        assert!(!pool.record_failure("b"));

        for _ in 0..100 {
            assert_ne!(pool.select().as_deref(), Some("b"));
        }

        // Success on a removed member must not bring it back
        pool.record_success("b");
        assert!(!pool.contains("b"));
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_empty_pool_selects_nothing() {
        let pool = create_test_pool();
        for key in ["a", "b", "c"] {
            pool.record_failure(key);
        }
        assert!(pool.is_empty());
        assert!(pool.select().is_none());
    }

    #[test]
    fn test_pool_stats() {
        let pool = create_test_pool();
        let stats = pool.stats();
        assert_eq!(stats.configured, 3);
        assert_eq!(stats.working, 3);
        assert_eq!(stats.removed, 0);
        assert_eq!(stats.kind, "test");

        pool.record_failure("a");
        let stats = pool.stats();
        assert_eq!(stats.working, 2);
        assert_eq!(stats.removed, 1);

        pool.record_failure("b");
        pool.record_failure("c");
        assert_eq!(pool.stats().working, 0);
        assert_eq!(pool.stats().removed, 3);
    }
}
