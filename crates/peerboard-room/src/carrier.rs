//! Carriers: what a room sends through and hears from.
//!
//! A [`Room`](crate::Room) is generic over exactly one [`Carrier`], picked
//! when the room is spawned. Two implementations exist:
//!
//! - [`RendezvousCarrier`] over a wide-area [`Rendezvous`] room.
//! - [`FramedLinkCarrier`](crate::FramedLinkCarrier) over a single
//!   point-to-point [`ByteLink`](peerboard_transport::ByteLink).

use std::collections::BTreeSet;
use std::future::Future;

use peerboard_protocol::{Codec, Envelope, JsonCodec, PeerId, RoomId};
use peerboard_transport::{
    retry, Rendezvous, RendezvousChannel, RendezvousEvent, RendezvousOutbound,
    RetryPolicy, TransportError,
};
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::RoomError;

/// Something a carrier observed.
#[derive(Debug, Clone, PartialEq)]
pub enum CarrierEvent {
    /// A peer became reachable.
    PeerJoined(PeerId),
    /// A peer went away. `None` when the carrier never learned who it was;
    /// every peer of that carrier should be considered gone.
    PeerLeft(Option<PeerId>),
    /// A message on a named action.
    Message {
        action: String,
        payload: Value,
        from: PeerId,
    },
}

/// The sending half of a room's underlying transport.
///
/// Each carrier is created together with an
/// `mpsc::UnboundedReceiver<CarrierEvent>` that reports what it hears.
pub trait Carrier: Send + 'static {
    /// Our own identity as seen through this carrier.
    fn local_id(&self) -> &PeerId;

    /// Whether a send to `target` (or a broadcast when `None`) has anyone
    /// to reach, given the peers the room currently knows.
    fn reaches(&self, target: Option<&PeerId>, present: &BTreeSet<PeerId>) -> bool {
        match target {
            Some(peer) => present.contains(peer),
            None => !present.is_empty(),
        }
    }

    /// Sends one action message to `target`, or to every peer when `None`.
    ///
    /// Sending with nobody listening is not an error.
    fn send(
        &mut self,
        action: &str,
        payload: &Value,
        target: Option<&PeerId>,
    ) -> impl Future<Output = Result<(), RoomError>> + Send;

    /// Releases the transport. No events are reported afterwards.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

// ---------------------------------------------------------------------------
// Rendezvous adapter
// ---------------------------------------------------------------------------

/// A [`Carrier`] over a joined rendezvous room.
///
/// Messages travel as JSON [`Envelope`]s.
pub struct RendezvousCarrier {
    local_id: PeerId,
    outbound: Option<mpsc::UnboundedSender<RendezvousOutbound>>,
    pump: JoinHandle<()>,
}

impl RendezvousCarrier {
    /// Joins `room` on `transport`, retrying connection failures under
    /// `policy`.
    ///
    /// # Errors
    /// [`TransportError::Unsupported`] straight away if the transport cannot
    /// run here; otherwise the last join error once retries are spent.
    pub async fn join<R: Rendezvous>(
        transport: &R,
        room: &RoomId,
        policy: &RetryPolicy,
    ) -> Result<(Self, mpsc::UnboundedReceiver<CarrierEvent>), RoomError> {
        if !transport.is_supported() {
            return Err(TransportError::Unsupported(
                "rendezvous transport is not available".into(),
            )
            .into());
        }
        let channel = retry::with_backoff(policy, |_| transport.join(room.as_str())).await?;
        Ok(Self::from_channel(channel))
    }

    /// Wraps an already joined channel.
    pub fn from_channel(
        channel: RendezvousChannel,
    ) -> (Self, mpsc::UnboundedReceiver<CarrierEvent>) {
        let RendezvousChannel {
            local_id,
            outbound,
            mut inbound,
        } = channel;
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let pump = tokio::spawn(async move {
            while let Some(event) = inbound.recv().await {
                let mapped = match event {
                    RendezvousEvent::PeerJoined(id) => CarrierEvent::PeerJoined(id),
                    RendezvousEvent::PeerLeft(id) => CarrierEvent::PeerLeft(Some(id)),
                    RendezvousEvent::Data { from, bytes } => {
                        match JsonCodec.decode::<Envelope>(&bytes) {
                            Ok(env) => CarrierEvent::Message {
                                action: env.action,
                                payload: env.payload,
                                from,
                            },
                            Err(e) => {
                                tracing::debug!(peer = %from, error = %e, "dropping undecodable message");
                                continue;
                            }
                        }
                    }
                };
                if events_tx.send(mapped).is_err() {
                    break;
                }
            }
        });

        let carrier = Self {
            local_id,
            outbound: Some(outbound),
            pump,
        };
        (carrier, events_rx)
    }
}

impl Carrier for RendezvousCarrier {
    fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    async fn send(
        &mut self,
        action: &str,
        payload: &Value,
        target: Option<&PeerId>,
    ) -> Result<(), RoomError> {
        let Some(outbound) = &self.outbound else {
            return Ok(());
        };
        let bytes = JsonCodec.encode(&Envelope {
            action: action.to_owned(),
            payload: payload.clone(),
        })?;
        outbound
            .send(RendezvousOutbound {
                target: target.cloned(),
                bytes,
            })
            .map_err(|_| {
                RoomError::from(TransportError::ConnectionClosed(
                    "rendezvous room released".into(),
                ))
            })
    }

    async fn close(&mut self) {
        self.outbound.take();
        self.pump.abort();
    }
}

impl Drop for RendezvousCarrier {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
