//! Application Layer
//!
//! Use cases orchestrating the domain and its ports.

pub mod registry;

pub use registry::{
    Registry, RegistryConfig, RegistryError, DEFAULT_CHROOT, DEFAULT_REGISTRATION_TTL,
};
