//! Domain Services
//!
//! Stateless domain logic with no I/O.

pub mod routing;

pub use routing::{convert_path, frontend_id, route_expression, router_path};
