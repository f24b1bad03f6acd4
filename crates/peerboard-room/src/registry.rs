//! Registry of open rooms, keyed by room id.
//!
//! The registry is an ordinary owned value: whoever manages connection
//! lifecycle holds one, and independent registries never share rooms.
//! Rooms that stop on their own (left through a handle, or every handle
//! dropped) are forgotten the next time the registry is used.

use std::collections::HashMap;

use peerboard_protocol::RoomId;
use peerboard_transport::{retry, DeviceDiscovery, Rendezvous, TransportError};

use crate::framed::SERVICE_ID;
use crate::{FramedLinkCarrier, RendezvousCarrier, Room, RoomConfig, RoomError};

/// Tracks the rooms a node currently has open.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
    config: RoomConfig,
}

impl RoomRegistry {
    pub fn new(config: RoomConfig) -> Self {
        Self {
            rooms: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &RoomConfig {
        &self.config
    }

    /// The open room registered under `id`, if it is still running.
    pub fn get(&self, id: &RoomId) -> Option<Room> {
        self.rooms.get(id).filter(|r| !r.is_closed()).cloned()
    }

    /// Returns the open rendezvous room `id`, joining it first if needed.
    ///
    /// # Errors
    /// See [`RendezvousCarrier::join`].
    pub async fn join_rendezvous<R: Rendezvous>(
        &mut self,
        transport: &R,
        id: RoomId,
    ) -> Result<Room, RoomError> {
        self.prune();
        if let Some(room) = self.get(&id) {
            return Ok(room);
        }
        let (carrier, events) =
            RendezvousCarrier::join(transport, &id, &self.config.retry).await?;
        let room = Room::spawn(id.clone(), carrier, events, &self.config);
        self.rooms.insert(id, room.clone());
        Ok(room)
    }

    /// Finds a nearby device advertising [`SERVICE_ID`], opens a framed
    /// link to it and registers the resulting room as `id`.
    ///
    /// # Errors
    /// [`RoomError::AlreadyExists`] if `id` is open,
    /// [`TransportError::Unsupported`] straight away if there is no radio,
    /// otherwise the last connect error once retries are spent.
    pub async fn open_link<D: DeviceDiscovery>(
        &mut self,
        discovery: &D,
        id: RoomId,
    ) -> Result<Room, RoomError> {
        self.prune();
        if self.get(&id).is_some() {
            return Err(RoomError::AlreadyExists(id));
        }
        if !discovery.is_supported() {
            return Err(
                TransportError::Unsupported("short-range radio is not available".into()).into(),
            );
        }
        let link = retry::with_backoff(&self.config.retry, |_| async move {
            let device = discovery.select(SERVICE_ID).await?;
            discovery.open(device).await
        })
        .await?;
        let (carrier, events) = FramedLinkCarrier::new(link);
        let room = Room::spawn(id.clone(), carrier, events, &self.config);
        self.rooms.insert(id, room.clone());
        Ok(room)
    }

    /// Registers an already spawned room under its own id.
    ///
    /// # Errors
    /// [`RoomError::AlreadyExists`] if another open room has that id.
    pub fn insert(&mut self, room: Room) -> Result<(), RoomError> {
        self.prune();
        if self.get(room.id()).is_some() {
            return Err(RoomError::AlreadyExists(room.id().clone()));
        }
        self.rooms.insert(room.id().clone(), room);
        Ok(())
    }

    /// Moves the room at `from` to `to` without reopening its carrier.
    ///
    /// # Errors
    /// [`RoomError::NotFound`] if `from` is not open,
    /// [`RoomError::AlreadyExists`] if `to` is.
    pub async fn rekey(&mut self, from: &RoomId, to: RoomId) -> Result<Room, RoomError> {
        self.prune();
        if self.get(&to).is_some() {
            return Err(RoomError::AlreadyExists(to));
        }
        let room = self
            .rooms
            .remove(from)
            .filter(|r| !r.is_closed())
            .ok_or_else(|| RoomError::NotFound(from.clone()))?;
        let renamed = room.renamed(to.clone()).await?;
        self.rooms.insert(to, renamed.clone());
        Ok(renamed)
    }

    /// Leaves and forgets room `id`. Returns whether it was still open.
    pub async fn leave(&mut self, id: &RoomId) -> bool {
        self.prune();
        match self.rooms.remove(id) {
            Some(room) => {
                room.leave().await;
                true
            }
            None => false,
        }
    }

    /// Leaves every room.
    pub async fn leave_all(&mut self) {
        for (_, room) in self.rooms.drain() {
            room.leave().await;
        }
    }

    /// Ids of the rooms currently open.
    pub fn ids(&self) -> Vec<RoomId> {
        self.open().map(|(id, _)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.open().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn open(&self) -> impl Iterator<Item = (&RoomId, &Room)> {
        self.rooms.iter().filter(|(_, room)| !room.is_closed())
    }

    fn prune(&mut self) {
        self.rooms.retain(|id, room| {
            let open = !room.is_closed();
            if !open {
                tracing::debug!(room_id = %id, "forgetting closed room");
            }
            open
        });
    }
}
