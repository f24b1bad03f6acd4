//! Codec trait and the JSON implementation.
//!
//! The rendezvous carrier moves opaque byte messages; a [`Codec`] turns an
//! [`Envelope`](crate::Envelope) into those bytes and back.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes Rust values to bytes and decodes them back.
///
/// `Send + Sync + 'static` so a codec can live inside a spawned carrier task.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Encode`] if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns [`ProtocolError::Decode`] if the bytes are malformed or do not
    /// match the expected type.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// A [`Codec`] that uses JSON, the format every browser peer speaks.
///
/// ```rust
/// use peerboard_protocol::{Codec, Envelope, JsonCodec};
///
/// let codec = JsonCodec;
/// let env = Envelope {
///     action: "chat".into(),
///     payload: serde_json::json!({"text": "gl hf"}),
/// };
/// let bytes = codec.encode(&env).unwrap();
/// let back: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(env, back);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
