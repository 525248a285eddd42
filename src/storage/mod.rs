pub mod codec;
mod lock;
mod memory;
mod rocksdb;

pub use codec::{decode_state, encode_state};
pub use lock::{LocalLockBackend, LockConfig, LockGuard};
pub use memory::MemoryStorage;
pub use rocksdb::RocksDbStorage;
