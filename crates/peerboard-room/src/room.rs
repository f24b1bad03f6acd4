//! Room actor: one Tokio task per room that owns the carrier, the peer set
//! and every action listener.
//!
//! The outside world talks to it through a [`Room`] handle. All room state
//! is mutated by that single task, so inbound carrier events and local
//! sends are processed in one sequential order.

use std::collections::{BTreeSet, HashMap};

use peerboard_protocol::{action, PeerId, ProtocolError, RoomId};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::{Carrier, CarrierEvent, RoomConfig, RoomError};

/// One inbound message on an action.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound {
    pub payload: Value,
    pub from: PeerId,
}

impl Inbound {
    /// Decodes the payload as `T`.
    ///
    /// # Errors
    /// [`ProtocolError::Decode`] if the payload has a different shape.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        T::deserialize(&self.payload).map_err(ProtocolError::Decode)
    }
}

/// Commands sent to a room actor through its channel.
enum RoomCommand {
    Subscribe {
        action: String,
        listener: mpsc::UnboundedSender<Inbound>,
        reply: oneshot::Sender<()>,
    },
    Send {
        action: String,
        payload: Value,
        target: Option<PeerId>,
        reply: oneshot::Sender<()>,
    },
    Peers {
        reply: oneshot::Sender<Vec<PeerId>>,
    },
    OnPeerJoin {
        listener: mpsc::UnboundedSender<PeerId>,
        reply: oneshot::Sender<()>,
    },
    OnPeerLeave {
        listener: mpsc::UnboundedSender<Option<PeerId>>,
        reply: oneshot::Sender<()>,
    },
    Rename {
        id: RoomId,
    },
    Leave {
        reply: oneshot::Sender<()>,
    },
}

/// Handle to a running room. Cheap to clone.
///
/// The room stops when [`leave`](Self::leave) is called or the last
/// handle is dropped; either way its carrier is closed and no listener
/// hears from it again.
#[derive(Clone)]
pub struct Room {
    id: RoomId,
    local_id: PeerId,
    sender: mpsc::Sender<RoomCommand>,
}

impl std::fmt::Debug for Room {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Room")
            .field("id", &self.id)
            .field("local_id", &self.local_id)
            .field("closed", &self.sender.is_closed())
            .finish()
    }
}

impl Room {
    /// Spawns the actor for a room over `carrier`.
    ///
    /// `events` must be the receiver the carrier was created with.
    pub fn spawn<C: Carrier>(
        id: RoomId,
        carrier: C,
        events: mpsc::UnboundedReceiver<CarrierEvent>,
        config: &RoomConfig,
    ) -> Self {
        let (tx, rx) = mpsc::channel(config.command_channel_size.max(1));
        let local_id = carrier.local_id().clone();

        let actor = RoomActor {
            room_id: id.clone(),
            carrier,
            events: Some(events),
            receiver: rx,
            peers: BTreeSet::new(),
            listeners: HashMap::new(),
            join_listeners: Vec::new(),
            leave_listeners: Vec::new(),
        };
        tokio::spawn(actor.run());

        Self {
            id,
            local_id,
            sender: tx,
        }
    }

    pub fn id(&self) -> &RoomId {
        &self.id
    }

    /// Our own peer id in this room.
    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    /// Whether the room actor has stopped.
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    /// Opens a named action: a sender plus a new listener.
    ///
    /// Calling this again with the same name adds another listener; each
    /// inbound message reaches every listener in registration order. The
    /// listener is registered when this returns.
    ///
    /// # Errors
    /// [`RoomError::Protocol`] for an unusable name, [`RoomError::Closed`]
    /// if the room has been left.
    pub async fn make_action(
        &self,
        name: &str,
    ) -> Result<(ActionSender, ActionReceiver), RoomError> {
        action::validate_action_name(name)?;
        let (listener, rx) = mpsc::unbounded_channel();
        self.request(|reply| RoomCommand::Subscribe {
            action: name.to_owned(),
            listener,
            reply,
        })
        .await?;
        Ok((self.action_sender(name), ActionReceiver { receiver: rx }))
    }

    /// A send-only handle for `name`. Registers no listener.
    pub fn action_sender(&self, name: &str) -> ActionSender {
        ActionSender {
            room_id: self.id.clone(),
            action: name.to_owned(),
            sender: self.sender.clone(),
        }
    }

    /// Snapshot of the peers present right now.
    ///
    /// A room that has been left has no peers.
    pub async fn peers(&self) -> Vec<PeerId> {
        let (reply, rx) = oneshot::channel();
        if self.command(RoomCommand::Peers { reply }).await.is_err() {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    /// Subscribes to peer joins from now on.
    ///
    /// Peers already present are not replayed; pair this with
    /// [`peers`](Self::peers) to build a live mirror.
    pub async fn on_peer_join(&self) -> Result<mpsc::UnboundedReceiver<PeerId>, RoomError> {
        let (listener, rx) = mpsc::unbounded_channel();
        self.request(|reply| RoomCommand::OnPeerJoin { listener, reply })
            .await?;
        Ok(rx)
    }

    /// Subscribes to peer leaves. `None` means a peer whose identity was
    /// never learned went away.
    pub async fn on_peer_leave(
        &self,
    ) -> Result<mpsc::UnboundedReceiver<Option<PeerId>>, RoomError> {
        let (listener, rx) = mpsc::unbounded_channel();
        self.request(|reply| RoomCommand::OnPeerLeave { listener, reply })
            .await?;
        Ok(rx)
    }

    /// Returns a handle to the same room under a new id.
    ///
    /// Used when a link-backed lobby room becomes the match room.
    pub async fn renamed(&self, id: RoomId) -> Result<Room, RoomError> {
        self.command(RoomCommand::Rename { id: id.clone() }).await?;
        Ok(Room {
            id,
            local_id: self.local_id.clone(),
            sender: self.sender.clone(),
        })
    }

    /// Leaves the room: closes the carrier and detaches every listener.
    ///
    /// Idempotent. Returns once the carrier is closed.
    pub async fn leave(&self) {
        let (reply, rx) = oneshot::channel();
        if self.command(RoomCommand::Leave { reply }).await.is_ok() {
            let _ = rx.await;
        }
    }

    async fn command(&self, cmd: RoomCommand) -> Result<(), RoomError> {
        self.sender
            .send(cmd)
            .await
            .map_err(|_| RoomError::Closed(self.id.clone()))
    }

    /// Sends a command and waits until the actor has applied it.
    async fn request<T>(
        &self,
        cmd: impl FnOnce(oneshot::Sender<T>) -> RoomCommand,
    ) -> Result<T, RoomError> {
        let (reply, rx) = oneshot::channel();
        self.command(cmd(reply)).await?;
        rx.await.map_err(|_| RoomError::Closed(self.id.clone()))
    }
}

/// The send side of an action.
#[derive(Clone)]
pub struct ActionSender {
    room_id: RoomId,
    action: String,
    sender: mpsc::Sender<RoomCommand>,
}

impl ActionSender {
    pub fn action(&self) -> &str {
        &self.action
    }

    /// Sends `payload` to `target`, or to every current peer when `None`.
    ///
    /// Recipients are the peers present when the room handles the send,
    /// and this returns once it has. With no peers present, a target that
    /// is not present, or after the room was left, nothing is sent.
    pub async fn send<T: Serialize + ?Sized>(&self, payload: &T, target: Option<&PeerId>) {
        let payload = match serde_json::to_value(payload) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(room_id = %self.room_id, action = %self.action, error = %e, "payload not serializable");
                return;
            }
        };
        let (reply, rx) = oneshot::channel();
        let cmd = RoomCommand::Send {
            action: self.action.clone(),
            payload,
            target: target.cloned(),
            reply,
        };
        if self.sender.send(cmd).await.is_err() || rx.await.is_err() {
            tracing::trace!(room_id = %self.room_id, action = %self.action, "send on closed room dropped");
        }
    }
}

/// The receive side of an action.
#[derive(Debug)]
pub struct ActionReceiver {
    receiver: mpsc::UnboundedReceiver<Inbound>,
}

impl ActionReceiver {
    /// The next inbound message, in arrival order. `None` once the room
    /// has stopped.
    pub async fn recv(&mut self) -> Option<Inbound> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<Inbound> {
        self.receiver.try_recv().ok()
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

struct RoomActor<C: Carrier> {
    room_id: RoomId,
    carrier: C,
    events: Option<mpsc::UnboundedReceiver<CarrierEvent>>,
    receiver: mpsc::Receiver<RoomCommand>,
    peers: BTreeSet<PeerId>,
    listeners: HashMap<String, Vec<mpsc::UnboundedSender<Inbound>>>,
    join_listeners: Vec<mpsc::UnboundedSender<PeerId>>,
    leave_listeners: Vec<mpsc::UnboundedSender<Option<PeerId>>>,
}

impl<C: Carrier> RoomActor<C> {
    async fn run(mut self) {
        tracing::info!(room_id = %self.room_id, local = %self.carrier.local_id(), "room opened");

        loop {
            tokio::select! {
                biased;
                cmd = self.receiver.recv() => match cmd {
                    Some(RoomCommand::Leave { reply }) => {
                        self.shut_down().await;
                        let _ = reply.send(());
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd).await,
                    None => {
                        self.shut_down().await;
                        break;
                    }
                },
                Some(event) = recv_event(&mut self.events) => self.handle_event(event),
            }
        }

        tracing::info!(room_id = %self.room_id, "room left");
    }

    async fn handle_command(&mut self, cmd: RoomCommand) {
        match cmd {
            RoomCommand::Subscribe {
                action,
                listener,
                reply,
            } => {
                self.listeners.entry(action).or_default().push(listener);
                let _ = reply.send(());
            }
            RoomCommand::Send {
                action,
                payload,
                target,
                reply,
            } => {
                if !self.carrier.reaches(target.as_ref(), &self.peers) {
                    tracing::trace!(room_id = %self.room_id, %action, ?target, "nobody to send to");
                } else if let Err(e) = self.carrier.send(&action, &payload, target.as_ref()).await {
                    tracing::debug!(room_id = %self.room_id, %action, error = %e, "carrier send failed");
                    // The carrier reports its own teardown; apply it before
                    // the next command so callers observe it immediately.
                    self.drain_events();
                }
                let _ = reply.send(());
            }
            RoomCommand::Peers { reply } => {
                let _ = reply.send(self.peers.iter().cloned().collect());
            }
            RoomCommand::OnPeerJoin { listener, reply } => {
                self.join_listeners.push(listener);
                let _ = reply.send(());
            }
            RoomCommand::OnPeerLeave { listener, reply } => {
                self.leave_listeners.push(listener);
                let _ = reply.send(());
            }
            RoomCommand::Rename { id } => {
                tracing::info!(room_id = %self.room_id, new_id = %id, "room re-keyed");
                self.room_id = id;
            }
            RoomCommand::Leave { .. } => {}
        }
    }

    fn drain_events(&mut self) {
        while let Some(event) = self.events.as_mut().and_then(|rx| rx.try_recv().ok()) {
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: CarrierEvent) {
        match event {
            CarrierEvent::PeerJoined(peer) => {
                if self.peers.insert(peer.clone()) {
                    tracing::info!(room_id = %self.room_id, %peer, "peer joined");
                    self.join_listeners.retain(|l| l.send(peer.clone()).is_ok());
                }
            }
            CarrierEvent::PeerLeft(Some(peer)) => {
                if self.peers.remove(&peer) {
                    tracing::info!(room_id = %self.room_id, %peer, "peer left");
                }
                self.leave_listeners.retain(|l| l.send(Some(peer.clone())).is_ok());
            }
            CarrierEvent::PeerLeft(None) => {
                tracing::info!(room_id = %self.room_id, "unidentified peer left");
                self.peers.clear();
                self.leave_listeners.retain(|l| l.send(None).is_ok());
            }
            CarrierEvent::Message {
                action,
                payload,
                from,
            } => {
                let Some(listeners) = self.listeners.get_mut(&action) else {
                    tracing::trace!(room_id = %self.room_id, %action, "no listener for action");
                    return;
                };
                let inbound = Inbound { payload, from };
                listeners.retain(|l| l.send(inbound.clone()).is_ok());
            }
        }
    }

    async fn shut_down(&mut self) {
        self.receiver.close();
        self.carrier.close().await;
        self.events = None;
        self.peers.clear();
        self.listeners.clear();
        self.join_listeners.clear();
        self.leave_listeners.clear();
    }
}

async fn recv_event(
    events: &mut Option<mpsc::UnboundedReceiver<CarrierEvent>>,
) -> Option<CarrierEvent> {
    match events {
        Some(rx) => {
            let event = rx.recv().await;
            if event.is_none() {
                *events = None;
            }
            event
        }
        None => std::future::pending().await,
    }
}
