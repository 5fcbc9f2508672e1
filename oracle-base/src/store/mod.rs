pub use lock::LeaseLock;
pub use memory::InMemoryStore;
pub use rocks::{DbError, RocksStore};

mod lock;
mod memory;
mod rocks;
