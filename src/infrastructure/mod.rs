//! Infrastructure Layer
//!
//! Cross-cutting concerns and infrastructure components.

pub mod lifecycle;

pub use lifecycle::{shutdown_signal, CancelToken, Lifecycle};
