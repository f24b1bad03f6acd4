//! In-process implementations of the transport traits.
//!
//! [`MemoryRendezvous`] is a hub that any number of [`MemoryEndpoint`]s can
//! join rooms on; [`memory_link_pair`] returns the two ends of a
//! chunk-limited byte link. Both support fault injection so tests can
//! exercise connection failures and mid-session disconnects.

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::mpsc;

use crate::{
    ByteLink, DeviceDiscovery, PeerId, Rendezvous, RendezvousChannel,
    RendezvousEvent, RendezvousOutbound, TransportError,
};

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Rendezvous hub
// ---------------------------------------------------------------------------

type Members = HashMap<PeerId, mpsc::UnboundedSender<RendezvousEvent>>;

struct Hub {
    rooms: HashMap<String, Members>,
    supported: bool,
    failing_joins: u32,
}

/// An in-process rendezvous service shared by every endpoint cloned from it.
#[derive(Clone)]
pub struct MemoryRendezvous {
    hub: Arc<Mutex<Hub>>,
    next_id: Arc<AtomicU64>,
}

impl MemoryRendezvous {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self {
            hub: Arc::new(Mutex::new(Hub {
                rooms: HashMap::new(),
                supported: true,
                failing_joins: 0,
            })),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Returns a new endpoint with a generated identity (`mem-1`, `mem-2`, ...).
    pub fn endpoint(&self) -> MemoryEndpoint {
        let n = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.endpoint_with_id(PeerId::new(format!("mem-{n}")))
    }

    /// Returns a new endpoint with a fixed identity.
    pub fn endpoint_with_id(&self, local_id: PeerId) -> MemoryEndpoint {
        MemoryEndpoint {
            hub: self.clone(),
            local_id,
        }
    }

    /// Marks the service as unavailable; every join fails with
    /// [`TransportError::Unsupported`].
    pub fn set_supported(&self, supported: bool) {
        lock(&self.hub).supported = supported;
    }

    /// Makes the next `n` joins fail with [`TransportError::ConnectFailed`].
    pub fn fail_next_joins(&self, n: u32) {
        lock(&self.hub).failing_joins = n;
    }

    /// Peers currently joined to `room`, sorted.
    pub fn members(&self, room: &str) -> Vec<PeerId> {
        let hub = lock(&self.hub);
        let mut ids: Vec<PeerId> = hub
            .rooms
            .get(room)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
        ids.sort();
        ids
    }

    fn route(&self, room: &str, from: &PeerId, out: RendezvousOutbound) {
        let hub = lock(&self.hub);
        let Some(members) = hub.rooms.get(room) else {
            return;
        };
        for (id, tx) in members {
            if id == from {
                continue;
            }
            if out.target.as_ref().is_some_and(|t| t != id) {
                continue;
            }
            let _ = tx.send(RendezvousEvent::Data {
                from: from.clone(),
                bytes: out.bytes.clone(),
            });
        }
    }

    fn depart(
        &self,
        room: &str,
        who: &PeerId,
        inbound: &mpsc::UnboundedSender<RendezvousEvent>,
    ) {
        let mut hub = lock(&self.hub);
        let Some(members) = hub.rooms.get_mut(room) else {
            return;
        };
        // A rejoin under the same id replaced our entry; leave it alone.
        if !members.get(who).is_some_and(|tx| tx.same_channel(inbound)) {
            return;
        }
        members.remove(who);
        for tx in members.values() {
            let _ = tx.send(RendezvousEvent::PeerLeft(who.clone()));
        }
        if members.is_empty() {
            hub.rooms.remove(room);
        }
        tracing::trace!(room, peer = %who, "memory rendezvous member left");
    }
}

impl Default for MemoryRendezvous {
    fn default() -> Self {
        Self::new()
    }
}

/// One participant of a [`MemoryRendezvous`].
#[derive(Clone)]
pub struct MemoryEndpoint {
    hub: MemoryRendezvous,
    local_id: PeerId,
}

impl MemoryEndpoint {
    /// This endpoint's identity in every room it joins.
    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }
}

impl Rendezvous for MemoryEndpoint {
    fn is_supported(&self) -> bool {
        lock(&self.hub.hub).supported
    }

    async fn join(&self, room: &str) -> Result<RendezvousChannel, TransportError> {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        {
            let mut hub = lock(&self.hub.hub);
            if !hub.supported {
                return Err(TransportError::Unsupported(
                    "memory rendezvous disabled".into(),
                ));
            }
            if hub.failing_joins > 0 {
                hub.failing_joins -= 1;
                return Err(TransportError::ConnectFailed(format!(
                    "injected join failure for room {room}"
                )));
            }
            let members = hub.rooms.entry(room.to_owned()).or_default();
            for (id, tx) in members.iter() {
                if *id == self.local_id {
                    continue;
                }
                let _ = tx.send(RendezvousEvent::PeerJoined(self.local_id.clone()));
                let _ = in_tx.send(RendezvousEvent::PeerJoined(id.clone()));
            }
            members.insert(self.local_id.clone(), in_tx.clone());
        }

        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<RendezvousOutbound>();
        let hub = self.hub.clone();
        let local = self.local_id.clone();
        let room_name = room.to_owned();
        tokio::spawn(async move {
            while let Some(out) = out_rx.recv().await {
                hub.route(&room_name, &local, out);
            }
            hub.depart(&room_name, &local, &in_tx);
        });

        tracing::debug!(room, peer = %self.local_id, "joined memory rendezvous room");
        Ok(RendezvousChannel {
            local_id: self.local_id.clone(),
            outbound: out_tx,
            inbound: in_rx,
        })
    }
}

// ---------------------------------------------------------------------------
// Byte link
// ---------------------------------------------------------------------------

struct Reader {
    rx: mpsc::UnboundedReceiver<Vec<u8>>,
    pending: Vec<u8>,
    read_size: Option<usize>,
}

impl Reader {
    fn take(&mut self) -> Vec<u8> {
        match self.read_size {
            Some(n) if n < self.pending.len() => {
                let rest = self.pending.split_off(n);
                std::mem::replace(&mut self.pending, rest)
            }
            _ => std::mem::take(&mut self.pending),
        }
    }
}

/// A handle that makes every later write on a [`MemoryLink`] fail.
#[derive(Clone)]
pub struct WriteFault(Arc<AtomicBool>);

impl WriteFault {
    /// Starts failing writes.
    pub fn trigger(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// One end of an in-process byte link created by [`memory_link_pair`].
pub struct MemoryLink {
    max_chunk: usize,
    tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    reader: tokio::sync::Mutex<Reader>,
    fail_writes: Arc<AtomicBool>,
    closed: AtomicBool,
}

impl MemoryLink {
    fn new(
        max_chunk: usize,
        tx: mpsc::UnboundedSender<Vec<u8>>,
        rx: mpsc::UnboundedReceiver<Vec<u8>>,
    ) -> Self {
        Self {
            max_chunk,
            tx: Mutex::new(Some(tx)),
            reader: tokio::sync::Mutex::new(Reader {
                rx,
                pending: Vec::new(),
                read_size: None,
            }),
            fail_writes: Arc::new(AtomicBool::new(false)),
            closed: AtomicBool::new(false),
        }
    }

    /// Re-slices inbound bytes so no read returns more than `n` bytes.
    /// `1` delivers the stream one byte at a time.
    pub fn with_read_size(mut self, n: usize) -> Self {
        self.reader.get_mut().read_size = Some(n.max(1));
        self
    }

    /// Returns a switch that makes subsequent writes fail.
    pub fn write_fault(&self) -> WriteFault {
        WriteFault(Arc::clone(&self.fail_writes))
    }
}

/// Creates two connected link ends, each accepting writes of at most
/// `max_chunk` bytes.
pub fn memory_link_pair(max_chunk: usize) -> (MemoryLink, MemoryLink) {
    let (a_tx, a_rx) = mpsc::unbounded_channel();
    let (b_tx, b_rx) = mpsc::unbounded_channel();
    (
        MemoryLink::new(max_chunk, a_tx, b_rx),
        MemoryLink::new(max_chunk, b_tx, a_rx),
    )
}

fn broken_pipe(msg: &str) -> TransportError {
    TransportError::SendFailed(io::Error::new(io::ErrorKind::BrokenPipe, msg.to_owned()))
}

impl ByteLink for MemoryLink {
    fn max_chunk(&self) -> usize {
        self.max_chunk
    }

    async fn write(&self, chunk: &[u8]) -> Result<(), TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(broken_pipe("link closed"));
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(broken_pipe("injected write failure"));
        }
        if chunk.len() > self.max_chunk {
            return Err(TransportError::SendFailed(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("chunk of {} bytes exceeds {}", chunk.len(), self.max_chunk),
            )));
        }
        let sent = match lock(&self.tx).as_ref() {
            Some(tx) => tx.send(chunk.to_vec()).is_ok(),
            None => false,
        };
        if sent {
            Ok(())
        } else {
            Err(broken_pipe("remote end dropped"))
        }
    }

    async fn read(&self) -> Result<Option<Vec<u8>>, TransportError> {
        if self.closed.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let mut reader = self.reader.lock().await;
        if reader.pending.is_empty() {
            match reader.rx.recv().await {
                Some(bytes) => reader.pending = bytes,
                None => return Ok(None),
            }
        }
        Ok(Some(reader.take()))
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.closed.store(true, Ordering::SeqCst);
        lock(&self.tx).take();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Device discovery
// ---------------------------------------------------------------------------

/// A device advertised through [`MemoryDiscovery`].
pub struct MemoryDevice {
    /// The service identifier the device advertises.
    pub service_id: String,
    link: MemoryLink,
}

/// Hands out pre-built [`MemoryLink`]s as "nearby devices".
pub struct MemoryDiscovery {
    devices: Mutex<Vec<MemoryDevice>>,
    supported: bool,
}

impl MemoryDiscovery {
    /// Creates a discovery service with no devices in range.
    pub fn new() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            supported: true,
        }
    }

    /// Creates a discovery service that reports the radio as missing.
    pub fn unsupported() -> Self {
        Self {
            devices: Mutex::new(Vec::new()),
            supported: false,
        }
    }

    /// Puts a device in range that advertises `service_id`.
    pub fn advertise(&self, service_id: &str, link: MemoryLink) {
        lock(&self.devices).push(MemoryDevice {
            service_id: service_id.to_owned(),
            link,
        });
    }
}

impl Default for MemoryDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceDiscovery for MemoryDiscovery {
    type Device = MemoryDevice;
    type Link = MemoryLink;

    fn is_supported(&self) -> bool {
        self.supported
    }

    async fn select(&self, service_id: &str) -> Result<MemoryDevice, TransportError> {
        if !self.supported {
            return Err(TransportError::Unsupported("no radio available".into()));
        }
        let mut devices = lock(&self.devices);
        let idx = devices
            .iter()
            .position(|d| d.service_id == service_id)
            .ok_or_else(|| {
                TransportError::ConnectFailed(format!(
                    "no device advertising {service_id}"
                ))
            })?;
        Ok(devices.remove(idx))
    }

    async fn open(&self, device: MemoryDevice) -> Result<MemoryLink, TransportError> {
        Ok(device.link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_link_pair_delivers_chunks_in_order() {
        let (a, b) = memory_link_pair(8);
        a.write(b"hello").await.unwrap();
        a.write(b"world").await.unwrap();
        assert_eq!(b.read().await.unwrap().unwrap(), b"hello");
        assert_eq!(b.read().await.unwrap().unwrap(), b"world");
    }

    #[tokio::test]
    async fn test_link_rejects_oversized_chunk() {
        let (a, _b) = memory_link_pair(4);
        assert!(a.write(b"too long").await.is_err());
    }

    #[tokio::test]
    async fn test_link_read_size_splits_chunks() {
        let (a, b) = memory_link_pair(16);
        let b = b.with_read_size(1);
        a.write(b"abc").await.unwrap();
        for expected in [b"a", b"b", b"c"] {
            assert_eq!(b.read().await.unwrap().unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn test_link_close_ends_remote_reads() {
        let (a, b) = memory_link_pair(16);
        a.close().await.unwrap();
        assert_eq!(b.read().await.unwrap(), None);
        assert!(a.write(b"x").await.is_err());
    }

    #[tokio::test]
    async fn test_write_fault_fails_later_writes() {
        let (a, _b) = memory_link_pair(16);
        a.write_fault().trigger();
        assert!(a.write(b"x").await.is_err());
    }

    #[tokio::test]
    async fn test_discovery_selects_by_service_id() {
        let disco = MemoryDiscovery::new();
        let (a, _b) = memory_link_pair(16);
        disco.advertise("svc-1", a);
        assert!(disco.select("svc-2").await.is_err());
        let device = disco.select("svc-1").await.unwrap();
        assert_eq!(device.service_id, "svc-1");
        assert!(disco.open(device).await.is_ok());
    }

    #[tokio::test]
    async fn test_unsupported_discovery_fails_fast() {
        let disco = MemoryDiscovery::unsupported();
        assert!(!disco.is_supported());
        assert!(matches!(
            disco.select("svc").await,
            Err(TransportError::Unsupported(_))
        ));
    }
}
