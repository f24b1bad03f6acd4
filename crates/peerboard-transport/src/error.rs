/// Errors that can occur in the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport is not available in this environment (no radio, no
    /// secure context, permission denied). Never retried.
    #[error("transport unsupported: {0}")]
    Unsupported(String),

    /// Signaling, bonding, or the physical connect handshake failed.
    #[error("connect failed: {0}")]
    ConnectFailed(String),

    /// Every retry of a connection attempt failed.
    #[error("gave up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<TransportError>,
    },

    /// The link or channel was closed.
    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    /// Writing data failed.
    #[error("send failed: {0}")]
    SendFailed(#[source] std::io::Error),

    /// Reading data failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(#[source] std::io::Error),
}

impl TransportError {
    /// Returns `true` if retrying the same operation may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ConnectFailed(_))
    }
}
