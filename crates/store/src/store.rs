use async_trait::async_trait;

use crate::Result;

/// Raw key-value persistence for one domain.
///
/// Values are opaque encoded records. Implementations must be thread-safe
/// and usable behind `Arc<dyn KeyValueStore>`.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Reads a single value.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Reads several values, returned in the order of `keys`.
    async fn get_many(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Writes a single value, replacing any existing one.
    async fn set(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Writes several values in one operation.
    ///
    /// Either every entry is written or none is.
    async fn set_many(&self, entries: &[(String, Vec<u8>)]) -> Result<()>;

    /// Re-establishes the connection after a transient failure.
    async fn reconnect(&self) -> Result<()>;
}
