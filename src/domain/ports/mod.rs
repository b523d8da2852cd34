mod coordination_store;
mod request_logger;

pub use coordination_store::{CoordinationStore, LeaseRenewal, StoreError};
pub use request_logger::{RequestLogger, RequestRecord, TracingRequestLogger};
