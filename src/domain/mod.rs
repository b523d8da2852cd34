//! Domain Layer
//!
//! Registration records, key layout, route normalization and the ports the
//! application layer depends on. Nothing in here performs I/O.

pub mod entities;
pub mod keys;
pub mod ports;
pub mod services;
pub mod value_objects;

pub use entities::{BackendSpec, FrontendSpec, InvalidEndpoint, Middleware};
pub use keys::KeyLayout;
pub use value_objects::{CancelToken, FrontendOptions, LeaseId, DEFAULT_FAILOVER_PREDICATE};
