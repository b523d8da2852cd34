//! etcd Coordination Store
//!
//! Implements CoordinationStore on top of etcd's v3 API. Lease renewal is
//! handed back as a future driving etcd's keep-alive stream; every step of it
//! races the supplied token, so a stalled stream never outlives cancellation.
//!
//! See: https://etcd.io/docs/v3.5/learning/api/#lease-api

use crate::domain::ports::{CoordinationStore, LeaseRenewal, StoreError};
use crate::domain::value_objects::{CancelToken, LeaseId};
use async_trait::async_trait;
use etcd_client::{Client, ConnectOptions, LeaseKeepAliveStream, LeaseKeeper, PutOptions};
use std::time::Duration;
use tokio::time::Interval;

/// Local etcd proxy used when no endpoint is configured.
pub const LOCAL_ETCD_PROXY: &str = "127.0.0.1:2379";

/// Connection settings for etcd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtcdConfig {
    /// Cluster endpoints (e.g., "127.0.0.1:2379")
    pub endpoints: Vec<String>,
    /// Timeout for establishing the connection
    pub dial_timeout: Duration,
}

impl Default for EtcdConfig {
    fn default() -> Self {
        Self {
            endpoints: vec![LOCAL_ETCD_PROXY.to_string()],
            dial_timeout: Duration::from_secs(5),
        }
    }
}

/// etcd-backed coordination store.
#[derive(Clone)]
pub struct EtcdStore {
    client: Client,
}

impl EtcdStore {
    /// Connect to the configured cluster.
    pub async fn connect(config: &EtcdConfig) -> Result<Self, StoreError> {
        let options = ConnectOptions::new().with_connect_timeout(config.dial_timeout);
        let client = Client::connect(&config.endpoints, Some(options))
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;

        tracing::info!("connected to etcd endpoints={:?}", config.endpoints);
        Ok(Self { client })
    }

    /// Wrap an already connected client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

/// Whole seconds granted for `ttl`; etcd rejects a zero TTL.
pub(crate) fn ttl_seconds(ttl: Duration) -> i64 {
    ttl.as_secs().max(1) as i64
}

/// Interval between keep-alive pings: a third of the TTL, at least 500ms.
pub(crate) fn keep_alive_interval(ttl: Duration) -> Duration {
    (Duration::from_secs(ttl_seconds(ttl) as u64) / 3).max(Duration::from_millis(500))
}

fn request_error(e: etcd_client::Error) -> StoreError {
    StoreError::Request(e.to_string())
}

/// Wait for the next tick, ping once and read the response.
///
/// Returns false once renewal cannot continue.
async fn renew_once(
    keeper: &mut LeaseKeeper,
    stream: &mut LeaseKeepAliveStream,
    ticker: &mut Interval,
    lease: LeaseId,
) -> bool {
    ticker.tick().await;

    if let Err(e) = keeper.keep_alive().await {
        tracing::warn!("keep-alive ping for lease {} failed: {}", lease, e);
        return true;
    }

    match stream.message().await {
        Ok(Some(resp)) if resp.ttl() > 0 => {
            tracing::trace!("lease {} renewed ttl={}s", lease, resp.ttl());
            true
        }
        Ok(Some(_)) => {
            tracing::error!("lease {} expired, keep-alive stopped", lease);
            false
        }
        Ok(None) => {
            tracing::error!("keep-alive stream for lease {} closed", lease);
            false
        }
        Err(e) => {
            tracing::warn!("keep-alive response for lease {} failed: {}", lease, e);
            true
        }
    }
}

#[async_trait]
impl CoordinationStore for EtcdStore {
    async fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut client = self.client.clone();
        client.put(key, value, None).await.map_err(request_error)?;
        Ok(())
    }

    async fn put_with_lease(
        &self,
        key: &str,
        value: &str,
        lease: LeaseId,
    ) -> Result<(), StoreError> {
        let mut client = self.client.clone();
        let options = PutOptions::new().with_lease(lease.as_i64());
        client
            .put(key, value, Some(options))
            .await
            .map_err(request_error)?;
        Ok(())
    }

    async fn grant_lease(&self, ttl: Duration) -> Result<LeaseId, StoreError> {
        let mut client = self.client.clone();
        let resp = client
            .lease_grant(ttl_seconds(ttl), None)
            .await
            .map_err(request_error)?;
        Ok(LeaseId::new(resp.id()))
    }

    async fn keep_alive(
        &self,
        lease: LeaseId,
        ttl: Duration,
        cancel: CancelToken,
    ) -> Result<LeaseRenewal, StoreError> {
        let mut client = self.client.clone();
        let (mut keeper, mut stream) = client
            .lease_keep_alive(lease.as_i64())
            .await
            .map_err(request_error)?;

        let interval = keep_alive_interval(ttl);
        Ok(Box::pin(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::debug!("keep-alive for lease {} stopped", lease);
                        return;
                    }
                    renewing = renew_once(&mut keeper, &mut stream, &mut ticker, lease) => {
                        if !renewing {
                            return;
                        }
                    }
                }
            }
        }))
    }

    async fn revoke_lease(&self, lease: LeaseId) -> Result<(), StoreError> {
        let mut client = self.client.clone();
        client
            .lease_revoke(lease.as_i64())
            .await
            .map_err(request_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_targets_local_proxy() {
        let config = EtcdConfig::default();
        assert_eq!(config.endpoints, vec!["127.0.0.1:2379".to_string()]);
        assert_eq!(config.dial_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_ttl_seconds() {
        assert_eq!(ttl_seconds(Duration::from_secs(30)), 30);
        assert_eq!(ttl_seconds(Duration::from_millis(1500)), 1);
        assert_eq!(ttl_seconds(Duration::ZERO), 1);
    }

    #[test]
    fn test_keep_alive_interval() {
        assert_eq!(keep_alive_interval(Duration::from_secs(30)), Duration::from_secs(10));
        assert_eq!(keep_alive_interval(Duration::from_secs(3)), Duration::from_secs(1));
        assert_eq!(keep_alive_interval(Duration::from_secs(1)), Duration::from_millis(500));
    }
}
