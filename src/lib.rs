//! edge-registrar Library
//!
//! Announces an application instance and its routes to a vulcand-style
//! proxy through etcd, keeping the announcement alive with a lease.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export commonly used types
pub use adapters::inbound::{App, AppConfig, HandlerSpec};
pub use adapters::outbound::{EtcdConfig, EtcdStore, MemoryStore};
pub use application::{Registry, RegistryConfig, RegistryError};
pub use config::load_config;
pub use domain::entities::{BackendSpec, FrontendSpec, Middleware};
pub use domain::ports::{CoordinationStore, RequestLogger, StoreError};
pub use domain::value_objects::{FrontendOptions, LeaseId};
pub use infrastructure::{CancelToken, Lifecycle};
