pub mod error;
pub mod handle;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{Result, StoreError};
pub use handle::StoreHandle;
pub use memory::InMemoryKeyValueStore;
pub use postgres::PostgresKeyValueStore;
pub use store::KeyValueStore;
