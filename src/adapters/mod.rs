// Adapters layer: concrete implementations for external systems (storage, database, http).

pub mod http;
pub mod memory;
pub mod postgres;
pub mod storage;

pub use memory::MemoryUserStore;
pub use postgres::PgUserStore;
pub use storage::LocalStorage;
