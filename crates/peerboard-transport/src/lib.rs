//! Transport abstraction layer for Peerboard.
//!
//! Peerboard never owns a network stack of its own. It consumes three
//! external collaborators, each modelled here as a trait:
//!
//! - [`ByteLink`]: one point-to-point byte connection whose writes are
//!   limited to [`ByteLink::max_chunk`] bytes and whose reads deliver bytes
//!   in arbitrarily sized chunks (a short-range radio link).
//! - [`DeviceDiscovery`]: finds a device advertising a service identifier
//!   and opens a [`ByteLink`] to it.
//! - [`Rendezvous`]: the wide-area signaling transport: joining a room by
//!   name yields a [`RendezvousChannel`] that broadcasts bytes to the peers
//!   present and reports their joins and leaves.
//!
//! # Feature Flags
//!
//! - `memory` (default): in-process implementations of all three traits
//!   ([`MemoryRendezvous`], [`memory_link_pair`], [`MemoryDiscovery`]).

mod error;
#[cfg(feature = "memory")]
mod memory;
pub mod retry;

pub use error::TransportError;
#[cfg(feature = "memory")]
pub use memory::{
    memory_link_pair, MemoryDevice, MemoryDiscovery, MemoryEndpoint,
    MemoryLink, MemoryRendezvous, WriteFault,
};
pub use retry::RetryPolicy;

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Opaque identifier for a peer, unique per connection attempt.
///
/// Rendezvous transports assign it; on a [`ByteLink`] the connecting side
/// generates its own and the remote one is learned from the first payload
/// that carries it.
#[derive(
    Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PeerId(String);

impl PeerId {
    /// Creates a `PeerId` from any string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Point-to-point byte link
// ---------------------------------------------------------------------------

/// A bidirectional, ordered byte connection with a bounded write size.
///
/// Methods return `Send` futures so a link can be driven from spawned tasks.
pub trait ByteLink: Send + Sync + 'static {
    /// Largest payload a single [`write`](Self::write) accepts.
    fn max_chunk(&self) -> usize;

    /// Writes one chunk of at most [`max_chunk`](Self::max_chunk) bytes.
    fn write(
        &self,
        chunk: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Reads the next chunk of bytes. Chunk boundaries carry no meaning.
    ///
    /// Returns `Ok(None)` when the remote side closed the link.
    fn read(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the link. Closing twice is not an error.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Finds nearby devices by advertised service identifier and opens links.
pub trait DeviceDiscovery: Send + Sync + 'static {
    /// Handle to a selected device.
    type Device: Send;
    /// The link type produced by [`open`](Self::open).
    type Link: ByteLink;

    /// Whether the radio is present and usable here.
    fn is_supported(&self) -> bool;

    /// Enumerates devices advertising `service_id` and selects one.
    fn select(
        &self,
        service_id: &str,
    ) -> impl Future<Output = Result<Self::Device, TransportError>> + Send;

    /// Opens a byte link to a selected device.
    fn open(
        &self,
        device: Self::Device,
    ) -> impl Future<Output = Result<Self::Link, TransportError>> + Send;
}

// ---------------------------------------------------------------------------
// Wide-area rendezvous
// ---------------------------------------------------------------------------

/// Something the rendezvous transport reports about a joined room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RendezvousEvent {
    /// A peer became reachable.
    PeerJoined(PeerId),
    /// A peer went away.
    PeerLeft(PeerId),
    /// Bytes from a peer.
    Data { from: PeerId, bytes: Vec<u8> },
}

/// Bytes to deliver to one peer, or to every peer when `target` is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RendezvousOutbound {
    pub target: Option<PeerId>,
    pub bytes: Vec<u8>,
}

/// A joined rendezvous room.
///
/// Dropping `outbound` leaves the room; `inbound` ends once the transport
/// has released it.
#[derive(Debug)]
pub struct RendezvousChannel {
    /// Our own identity in this room, as the other peers see it.
    pub local_id: PeerId,
    pub outbound: mpsc::UnboundedSender<RendezvousOutbound>,
    pub inbound: mpsc::UnboundedReceiver<RendezvousEvent>,
}

/// The wide-area signaling transport.
pub trait Rendezvous: Send + Sync + 'static {
    /// Whether the transport can run here at all.
    fn is_supported(&self) -> bool {
        true
    }

    /// Joins the named room.
    fn join(
        &self,
        room: &str,
    ) -> impl Future<Output = Result<RendezvousChannel, TransportError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peer_id_display_is_raw_string() {
        assert_eq!(PeerId::new("abc").to_string(), "abc");
    }

    #[test]
    fn test_peer_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&PeerId::from("p-1")).unwrap();
        assert_eq!(json, "\"p-1\"");
    }

    #[test]
    fn test_connect_failed_is_retryable_unsupported_is_not() {
        assert!(TransportError::ConnectFailed("x".into()).is_retryable());
        assert!(!TransportError::Unsupported("x".into()).is_retryable());
    }
}
