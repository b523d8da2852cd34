//! Coordination Store Port
//!
//! The minimal capability surface the registry needs from a strongly
//! consistent, lease-aware key-value store. Implementations may talk to etcd
//! or keep everything in memory.

use crate::domain::value_objects::{CancelToken, LeaseId};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::time::Duration;

/// Background work renewing a lease; completes once its token is cancelled
/// or renewal can no longer continue.
pub type LeaseRenewal = BoxFuture<'static, ()>;

/// Errors reported by a coordination store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("lease {0} not found")]
    LeaseNotFound(LeaseId),
    #[error("request failed: {0}")]
    Request(String),
}

/// Key-value store with TTL-bound leases.
///
/// None of the operations retry; callers decide retry policy.
#[async_trait]
pub trait CoordinationStore: Send + Sync {
    /// Write `value` at `key` with no lease. Overwrites any existing value.
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Write `value` at `key` attached to `lease`.
    async fn put_with_lease(&self, key: &str, value: &str, lease: LeaseId)
        -> Result<(), StoreError>;

    /// Grant a new lease expiring after `ttl` unless kept alive.
    async fn grant_lease(&self, ttl: Duration) -> Result<LeaseId, StoreError>;

    /// Establish renewal of `lease` and return the work driving it.
    ///
    /// The caller spawns the returned future; it runs until `cancel` fires.
    /// Renewal failures after this returns are not reported and surface as
    /// the lease expiring.
    async fn keep_alive(
        &self,
        lease: LeaseId,
        ttl: Duration,
        cancel: CancelToken,
    ) -> Result<LeaseRenewal, StoreError>;

    /// Revoke `lease`, deleting every key attached to it.
    async fn revoke_lease(&self, lease: LeaseId) -> Result<(), StoreError>;
}
