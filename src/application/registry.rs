//! Registry - Registration use case
//!
//! Announces one application instance, and the routes it serves, to the
//! proxy control plane:
//!
//! 1. `new`/`connect` validates the endpoint, grants a lease and starts
//!    renewing it
//! 2. `add_frontend` queues routing rules
//! 3. `start` writes the backend-type, server, frontend and middleware records
//! 4. `stop` cancels the lifecycle, revokes the lease and joins background work
//!
//! Only the server record is lease-scoped. Backend-type, frontend and
//! middleware records are shared by every instance of the app and are never
//! deleted here: when the last instance goes away its routing rules stay in
//! the store until something else removes or overwrites them.

use crate::adapters::outbound::{EtcdConfig, EtcdStore};
use crate::domain::entities::{BackendSpec, FrontendSpec, InvalidEndpoint, Middleware};
use crate::domain::keys::KeyLayout;
use crate::domain::ports::{CoordinationStore, StoreError};
use crate::domain::value_objects::LeaseId;
use crate::infrastructure::lifecycle::Lifecycle;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// TTL used when none is configured.
pub const DEFAULT_REGISTRATION_TTL: Duration = Duration::from_secs(30);

/// Root prefix used when none is configured.
pub const DEFAULT_CHROOT: &str = "/vulcand";

/// Configuration for a [`Registry`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// etcd connection settings (only used by [`Registry::connect`])
    pub etcd: EtcdConfig,
    /// Root prefix for every key written
    pub chroot: String,
    /// Lease TTL; the server record expires this long after renewal stops
    pub ttl: Duration,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            etcd: EtcdConfig::default(),
            chroot: DEFAULT_CHROOT.to_string(),
            ttl: DEFAULT_REGISTRATION_TTL,
        }
    }
}

impl RegistryConfig {
    /// Set the etcd endpoints.
    pub fn endpoints(mut self, endpoints: Vec<String>) -> Self {
        self.etcd.endpoints = endpoints;
        self
    }

    /// Set the root prefix.
    pub fn chroot(mut self, chroot: impl Into<String>) -> Self {
        self.chroot = chroot.into();
        self
    }

    /// Set the lease TTL.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Fill unset values: a zero TTL and an empty endpoint list.
    pub fn with_defaults(mut self) -> Self {
        if self.ttl.is_zero() {
            self.ttl = DEFAULT_REGISTRATION_TTL;
        }
        if self.etcd.endpoints.is_empty() {
            self.etcd = EtcdConfig {
                endpoints: EtcdConfig::default().endpoints,
                ..self.etcd
            };
        }
        self
    }
}

/// Registration errors.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("failed to create backend: {0}")]
    InvalidEndpoint(#[from] InvalidEndpoint),
    #[error("failed to connect to coordination store {endpoints:?}: {source}")]
    Connection {
        endpoints: Vec<String>,
        #[source]
        source: StoreError,
    },
    #[error("failed to grant a lease with ttl {ttl:?}: {source}")]
    LeaseGrant {
        ttl: Duration,
        #[source]
        source: StoreError,
    },
    #[error("failed to start keep alive for lease {lease}: {source}")]
    KeepAlive {
        lease: LeaseId,
        #[source]
        source: StoreError,
    },
    #[error("failed to set {record}, {key}: {source}")]
    Write {
        record: &'static str,
        key: String,
        #[source]
        source: StoreError,
    },
    #[error("failed to encode {record}, {key}: {source}")]
    Encode {
        record: &'static str,
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to register frontend, {frontend}: {source}")]
    Frontend {
        frontend: String,
        #[source]
        source: Box<RegistryError>,
    },
    #[error("cannot {operation}: registry {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },
}

/// Announces one backend and its frontends, and keeps the announcement alive.
pub struct Registry {
    config: RegistryConfig,
    keys: KeyLayout,
    store: Arc<dyn CoordinationStore>,
    backend: BackendSpec,
    frontends: Vec<FrontendSpec>,
    lease: LeaseId,
    lifecycle: Lifecycle,
    started: bool,
    revoker_spawned: AtomicBool,
}

impl Registry {
    /// Build a registry talking to etcd.
    pub async fn connect(
        config: RegistryConfig,
        app_name: &str,
        ip: &str,
        port: u32,
    ) -> Result<Self, RegistryError> {
        let backend = BackendSpec::new(app_name, ip, port)?;
        let config = config.with_defaults();

        let store = EtcdStore::connect(&config.etcd)
            .await
            .map_err(|source| RegistryError::Connection {
                endpoints: config.etcd.endpoints.clone(),
                source,
            })?;

        Self::open(config, Arc::new(store), backend).await
    }

    /// Build a registry on top of an existing store.
    pub async fn with_store(
        config: RegistryConfig,
        store: Arc<dyn CoordinationStore>,
        app_name: &str,
        ip: &str,
        port: u32,
    ) -> Result<Self, RegistryError> {
        let backend = BackendSpec::new(app_name, ip, port)?;
        Self::open(config.with_defaults(), store, backend).await
    }

    async fn open(
        config: RegistryConfig,
        store: Arc<dyn CoordinationStore>,
        backend: BackendSpec,
    ) -> Result<Self, RegistryError> {
        let lease = store
            .grant_lease(config.ttl)
            .await
            .map_err(|source| RegistryError::LeaseGrant {
                ttl: config.ttl,
                source,
            })?;

        let lifecycle = Lifecycle::new();
        let renewal = store
            .keep_alive(lease, config.ttl, lifecycle.token())
            .await
            .map_err(|source| RegistryError::KeepAlive { lease, source })?;
        lifecycle.spawn("lease-keep-alive", renewal);

        tracing::info!(
            "granted lease {} ttl={:?} for {}",
            lease,
            config.ttl,
            backend
        );

        Ok(Self {
            keys: KeyLayout::new(&config.chroot),
            config,
            store,
            backend,
            frontends: Vec::new(),
            lease,
            lifecycle,
            started: false,
            revoker_spawned: AtomicBool::new(false),
        })
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    pub fn backend(&self) -> &BackendSpec {
        &self.backend
    }

    pub fn frontends(&self) -> &[FrontendSpec] {
        &self.frontends
    }

    pub fn lease(&self) -> LeaseId {
        self.lease
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Whether the registry has been stopped or aborted its start.
    pub fn is_cancelled(&self) -> bool {
        self.lifecycle.is_cancelled()
    }

    /// Queue a frontend routing `methods` on `path` under `host` to this app.
    ///
    /// Must be called before [`start`](Self::start); afterwards it is
    /// rejected with [`RegistryError::InvalidState`].
    pub fn add_frontend<S: AsRef<str>>(
        &mut self,
        host: &str,
        path: &str,
        methods: &[S],
        middlewares: Vec<Middleware>,
    ) -> Result<&FrontendSpec, RegistryError> {
        if self.started {
            return Err(RegistryError::InvalidState {
                operation: "add frontend",
                state: "already started",
            });
        }

        let frontend = FrontendSpec::new(&self.backend.app_name, host, path, methods, middlewares);
        tracing::debug!("queued {}", frontend);
        self.frontends.push(frontend);
        Ok(self.frontends.last().expect("frontend was just pushed"))
    }

    /// Write every record once and hand the lease over to keep-alive.
    ///
    /// Fails fast: the first failed write cancels the lifecycle (which revokes
    /// the lease) and is returned. Records already written are not rolled
    /// back, so a failed start may leave a partial registration behind.
    pub async fn start(&mut self) -> Result<(), RegistryError> {
        if self.started {
            return Err(RegistryError::InvalidState {
                operation: "start",
                state: "already started",
            });
        }
        if self.lifecycle.is_cancelled() {
            return Err(RegistryError::InvalidState {
                operation: "start",
                state: "stopped",
            });
        }
        self.started = true;

        if let Err(e) = self.register_backend().await {
            self.abort();
            return Err(e);
        }

        self.spawn_revoker();

        for frontend in &self.frontends {
            if let Err(e) = self.register_frontend(frontend).await {
                self.abort();
                return Err(RegistryError::Frontend {
                    frontend: frontend.id.clone(),
                    source: Box::new(e),
                });
            }
        }

        tracing::info!(
            "registered {} with {} frontends",
            self.backend,
            self.frontends.len()
        );
        Ok(())
    }

    /// Cancel the lifecycle and wait for keep-alive to exit and the lease
    /// revocation to be issued.
    ///
    /// Revocation failures are logged, not returned: the lease still expires
    /// one TTL after keep-alive stops. Concurrent calls all wait for the
    /// revocation; calling it again afterwards returns immediately.
    pub async fn stop(&self) {
        self.spawn_revoker();
        self.lifecycle.shutdown().await;
    }

    fn abort(&self) {
        self.spawn_revoker();
        self.lifecycle.cancel();
    }

    /// Spawn the task revoking the lease once the lifecycle is cancelled.
    fn spawn_revoker(&self) {
        if self.revoker_spawned.swap(true, Ordering::SeqCst) {
            return;
        }

        let store = self.store.clone();
        let lease = self.lease;
        let token = self.lifecycle.token();
        self.lifecycle.spawn("lease-revoker", async move {
            token.cancelled().await;
            match store.revoke_lease(lease).await {
                Ok(()) => tracing::info!("lease {} revoked", lease),
                Err(e) => tracing::warn!("failed to revoke lease {}: {}", lease, e),
            }
        });
    }

    async fn register_backend(&self) -> Result<(), RegistryError> {
        let backend = &self.backend;

        let key = self.keys.backend(&backend.app_name);
        let value = encode("backend type", &key, backend.type_spec())?;
        self.put("backend type", key, &value, None).await?;

        let key = self.keys.server(&backend.app_name, &backend.id);
        let value = encode("backend spec", &key, backend.server_spec())?;
        self.put("backend spec", key, &value, Some(self.lease)).await
    }

    async fn register_frontend(&self, frontend: &FrontendSpec) -> Result<(), RegistryError> {
        let key = self.keys.frontend(&frontend.host, &frontend.id);
        let value = encode("frontend spec", &key, frontend.spec())?;
        self.put("frontend spec", key, &value, None).await?;

        for middleware in &frontend.middlewares {
            let key = self.keys.middleware(&frontend.host, &frontend.id, &middleware.id);
            let value = encode("middleware", &key, middleware.spec())?;
            self.put("middleware", key, &value, None).await?;
        }
        Ok(())
    }

    async fn put(
        &self,
        record: &'static str,
        key: String,
        value: &str,
        lease: Option<LeaseId>,
    ) -> Result<(), RegistryError> {
        let result = match lease {
            Some(lease) => self.store.put_with_lease(&key, value, lease).await,
            None => self.store.put(&key, value).await,
        };

        match result {
            Ok(()) => {
                tracing::debug!("set {} {}", record, key);
                Ok(())
            }
            Err(source) => Err(RegistryError::Write {
                record,
                key,
                source,
            }),
        }
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        // stops keep-alive; the lease then expires within one TTL
        self.lifecycle.cancel();
    }
}

fn encode(
    record: &'static str,
    key: &str,
    value: serde_json::Result<String>,
) -> Result<String, RegistryError> {
    value.map_err(|source| RegistryError::Encode {
        record,
        key: key.to_string(),
        source,
    })
}
