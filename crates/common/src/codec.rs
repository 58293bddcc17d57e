//! Binary encoding for commands, replies and persisted records.

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Failure to encode or decode a value.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("failed to encode value: {0}")]
    Encode(bitcode::Error),

    #[error("failed to decode value: {0}")]
    Decode(bitcode::Error),
}

/// Encodes a value into its binary representation.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    bitcode::serialize(value).map_err(CodecError::Encode)
}

/// Decodes a value from its binary representation.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    bitcode::deserialize(bytes).map_err(CodecError::Decode)
}
