//! Adapters Layer
//!
//! Inbound: the HTTP application wrapper.
//! Outbound: coordination store implementations (etcd, in-memory).

pub mod inbound;
pub mod outbound;
