//! A [`Carrier`] over one point-to-point byte link.
//!
//! The link has a single remote endpoint and no notion of peer identity,
//! so the carrier learns the remote id from the first payload that
//! carries an `id` or `peerId` field. Messages that arrive before that are
//! attributed to [`UNKNOWN_PEER`].
//!
//! Any close, remote close, or write failure tears the link down once:
//! a single `PeerLeft` is reported with the last known identity and every
//! later send is a no-op.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use peerboard_protocol::{chunk_frame, encode_frame, Frame, FrameDecoder, PeerId};
use peerboard_transport::ByteLink;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{Carrier, CarrierEvent, RoomError};

/// Service identifier short-range peers advertise and scan for.
pub const SERVICE_ID: &str = "f47b5e2d-4a9e-4c5a-9b3f-8e1d2c3a4b5c";

/// Largest single write the short-range link accepts.
pub const LINK_MAX_CHUNK: usize = 512;

/// Sender attributed to messages that arrive before the remote identity
/// is known.
pub const UNKNOWN_PEER: &str = "ble-unknown";

/// State shared by the carrier and its reader task.
struct LinkState {
    torn_down: AtomicBool,
    remote: Mutex<Option<PeerId>>,
    events: mpsc::UnboundedSender<CarrierEvent>,
}

impl LinkState {
    fn remote(&self) -> Option<PeerId> {
        self.remote
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns `true` on the first call only.
    fn tear_down(&self, reason: &str) -> bool {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return false;
        }
        let remote = self.remote();
        tracing::info!(peer = ?remote, reason, "framed link torn down");
        let _ = self.events.send(CarrierEvent::PeerLeft(remote));
        true
    }

    fn is_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    fn dispatch(&self, frame: Frame) {
        let resolved = {
            let mut remote = self.remote.lock().unwrap_or_else(PoisonError::into_inner);
            if remote.is_none() {
                if let Some(id) = identity_of(&frame.payload) {
                    *remote = Some(id.clone());
                    let _ = self.events.send(CarrierEvent::PeerJoined(id));
                }
            }
            remote.clone()
        };
        let from = resolved.unwrap_or_else(|| PeerId::from(UNKNOWN_PEER));
        let _ = self.events.send(CarrierEvent::Message {
            action: frame.action,
            payload: frame.payload,
            from,
        });
    }
}

fn identity_of(payload: &Value) -> Option<PeerId> {
    ["id", "peerId"]
        .iter()
        .find_map(|key| payload.get(*key)?.as_str())
        .filter(|s| !s.is_empty())
        .map(PeerId::from)
}

/// A [`Carrier`] over a [`ByteLink`], using the length-prefixed frame
/// format from [`peerboard_protocol::frame`].
pub struct FramedLinkCarrier<L: ByteLink> {
    local_id: PeerId,
    link: Arc<L>,
    state: Arc<LinkState>,
    reader: JoinHandle<()>,
}

impl<L: ByteLink> FramedLinkCarrier<L> {
    /// Wraps an open link and starts reading from it. The local id is a
    /// fresh random UUID.
    pub fn new(link: L) -> (Self, mpsc::UnboundedReceiver<CarrierEvent>) {
        Self::with_local_id(link, PeerId::new(uuid::Uuid::new_v4().to_string()))
    }

    /// Like [`new`](Self::new) with a caller-chosen local id.
    pub fn with_local_id(
        link: L,
        local_id: PeerId,
    ) -> (Self, mpsc::UnboundedReceiver<CarrierEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let link = Arc::new(link);
        let state = Arc::new(LinkState {
            torn_down: AtomicBool::new(false),
            remote: Mutex::new(None),
            events: events_tx,
        });

        let reader = tokio::spawn(read_loop(Arc::clone(&link), Arc::clone(&state)));

        let carrier = Self {
            local_id,
            link,
            state,
            reader,
        };
        (carrier, events_rx)
    }

    /// The remote identity, once a payload has revealed it.
    pub fn remote_id(&self) -> Option<PeerId> {
        self.state.remote()
    }

    /// Whether the link has been torn down.
    pub fn is_closed(&self) -> bool {
        self.state.is_down()
    }
}

async fn read_loop<L: ByteLink>(link: Arc<L>, state: Arc<LinkState>) {
    let mut decoder = FrameDecoder::new();
    loop {
        let chunk = match link.read().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => {
                state.tear_down("remote closed");
                break;
            }
            Err(e) => {
                tracing::debug!(error = %e, "framed link read failed");
                state.tear_down("read failed");
                break;
            }
        };
        if state.is_down() {
            break;
        }
        for frame in decoder.push(&chunk) {
            match frame {
                Ok(frame) => {
                    tracing::trace!(action = %frame.action, "frame received");
                    state.dispatch(frame);
                }
                Err(e) => tracing::debug!(error = %e, "dropping malformed frame"),
            }
        }
    }
}

impl<L: ByteLink> Carrier for FramedLinkCarrier<L> {
    fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    /// The remote end is present for as long as the link is up, whether or
    /// not its identity has been learned yet.
    fn reaches(&self, _target: Option<&PeerId>, _present: &BTreeSet<PeerId>) -> bool {
        !self.state.is_down()
    }

    /// Writes the frame in link-sized chunks. The link has one remote
    /// endpoint, so `target` is not consulted.
    async fn send(
        &mut self,
        action: &str,
        payload: &Value,
        _target: Option<&PeerId>,
    ) -> Result<(), RoomError> {
        if self.state.is_down() {
            return Ok(());
        }
        let frame = encode_frame(action, payload)?;
        for chunk in chunk_frame(&frame, self.link.max_chunk()) {
            if let Err(e) = self.link.write(chunk).await {
                self.reader.abort();
                self.state.tear_down("write failed");
                let _ = self.link.close().await;
                return Err(e.into());
            }
        }
        Ok(())
    }

    async fn close(&mut self) {
        self.reader.abort();
        self.state.tear_down("closed locally");
        let _ = self.link.close().await;
    }
}

impl<L: ByteLink> Drop for FramedLinkCarrier<L> {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_identity_prefers_id_then_peer_id() {
        assert_eq!(identity_of(&json!({"id": "a", "peerId": "b"})), Some("a".into()));
        assert_eq!(identity_of(&json!({"peerId": "b"})), Some("b".into()));
        assert_eq!(identity_of(&json!({"id": ""})), None);
        assert_eq!(identity_of(&json!({"id": 7})), None);
        assert_eq!(identity_of(&json!([1, 2])), None);
    }
}
