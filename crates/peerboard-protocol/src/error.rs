//! Error types for the protocol layer.

/// Errors that can occur while encoding or decoding protocol messages.
///
/// None of these ever reach a caller from inbound traffic: a message that
/// fails to decode is logged and dropped by whoever received it.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust type into bytes).
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, missing fields, or a
    /// payload shaped for a different action.
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A framed message had no `\n` between action name and payload.
    #[error("frame is missing the action separator")]
    MissingSeparator,

    /// The action name was not valid UTF-8.
    #[error("action name is not valid UTF-8")]
    InvalidActionName,

    /// An action name is empty, too long, or contains a newline.
    #[error("action name {name:?} is not usable: {reason}")]
    BadActionName { name: String, reason: &'static str },

    /// An encoded frame does not fit the 4-byte length prefix.
    #[error("frame of {0} bytes is too large")]
    FrameTooLarge(usize),
}
