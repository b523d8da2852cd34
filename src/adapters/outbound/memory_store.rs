//! In-Memory Coordination Store
//!
//! Implements CoordinationStore using DashMap. Leases are tracked explicitly:
//! revoking or expiring a lease deletes the keys written under it. Useful for
//! local runs and tests; nothing is persisted or replicated.

use crate::domain::ports::{CoordinationStore, LeaseRenewal, StoreError};
use crate::domain::value_objects::{CancelToken, LeaseId};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Stored value and the lease it is attached to, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    pub value: String,
    pub lease: Option<LeaseId>,
}

/// Bookkeeping for one granted lease.
#[derive(Debug, Clone)]
pub struct LeaseState {
    pub ttl: Duration,
    /// Whether a keep-alive stream is currently renewing the lease
    pub kept_alive: bool,
}

/// DashMap-backed coordination store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, StoredValue>>,
    leases: Arc<DashMap<LeaseId, LeaseState>>,
    next_lease: Arc<AtomicI64>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<StoredValue> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// All keys, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort();
        keys
    }

    /// Keys starting with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.keys()
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether `lease` is still granted (neither revoked nor expired).
    pub fn lease_active(&self, lease: LeaseId) -> bool {
        self.leases.contains_key(&lease)
    }

    /// TTL `lease` was granted with, if it is still active.
    pub fn lease_ttl(&self, lease: LeaseId) -> Option<Duration> {
        self.leases.get(&lease).map(|l| l.ttl)
    }

    /// Whether `lease` is active and being renewed.
    pub fn is_kept_alive(&self, lease: LeaseId) -> bool {
        self.leases.get(&lease).map(|l| l.kept_alive).unwrap_or(false)
    }

    /// Simulate TTL expiry of `lease`. Returns the number of keys removed.
    pub fn expire_lease(&self, lease: LeaseId) -> usize {
        self.drop_lease(lease).unwrap_or(0)
    }

    fn drop_lease(&self, lease: LeaseId) -> Option<usize> {
        self.leases.remove(&lease)?;
        let before = self.entries.len();
        self.entries.retain(|_, v| v.lease != Some(lease));
        Some(before - self.entries.len())
    }
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                lease: None,
            },
        );
        Ok(())
    }

    async fn put_with_lease(
        &self,
        key: &str,
        value: &str,
        lease: LeaseId,
    ) -> Result<(), StoreError> {
        if !self.lease_active(lease) {
            return Err(StoreError::LeaseNotFound(lease));
        }
        self.entries.insert(
            key.to_string(),
            StoredValue {
                value: value.to_string(),
                lease: Some(lease),
            },
        );
        Ok(())
    }

    async fn grant_lease(&self, ttl: Duration) -> Result<LeaseId, StoreError> {
        let lease = LeaseId::new(self.next_lease.fetch_add(1, Ordering::SeqCst) + 1);
        self.leases.insert(
            lease,
            LeaseState {
                ttl,
                kept_alive: false,
            },
        );
        tracing::debug!("memory store granted lease {} ttl={:?}", lease, ttl);
        Ok(lease)
    }

    async fn keep_alive(
        &self,
        lease: LeaseId,
        _ttl: Duration,
        cancel: CancelToken,
    ) -> Result<LeaseRenewal, StoreError> {
        match self.leases.get_mut(&lease) {
            Some(mut state) => state.kept_alive = true,
            None => return Err(StoreError::LeaseNotFound(lease)),
        }

        let leases = self.leases.clone();
        Ok(Box::pin(async move {
            cancel.cancelled().await;
            if let Some(mut state) = leases.get_mut(&lease) {
                state.kept_alive = false;
            }
        }))
    }

    async fn revoke_lease(&self, lease: LeaseId) -> Result<(), StoreError> {
        let removed = self
            .drop_lease(lease)
            .ok_or(StoreError::LeaseNotFound(lease))?;
        tracing::debug!("memory store revoked lease {} ({} keys)", lease, removed);
        Ok(())
    }
}
