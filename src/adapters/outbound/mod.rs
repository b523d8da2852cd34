mod etcd_store;
mod memory_store;

pub use etcd_store::{EtcdConfig, EtcdStore, LOCAL_ETCD_PROXY};
pub use memory_store::{LeaseState, MemoryStore, StoredValue};
