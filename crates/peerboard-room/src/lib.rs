//! Rooms and named actions for Peerboard.
//!
//! A room is a set of peers plus any number of named actions (independent
//! logical channels). The API is identical whichever transport carries the
//! room:
//!
//! - [`RendezvousCarrier`]: a wide-area rendezvous room with any number
//!   of peers.
//! - [`FramedLinkCarrier`]: one short-range byte link, so at most one peer.
//!
//! # Key types
//!
//! - [`Room`]: handle to a running room actor
//! - [`ActionSender`] / [`ActionReceiver`]: the two sides of an action
//! - [`RoomRegistry`]: explicitly owned map of open rooms
//! - [`RoomConfig`]: channel sizing and connection retry policy

mod carrier;
mod config;
mod error;
pub mod framed;
mod registry;
mod room;

pub use carrier::{Carrier, CarrierEvent, RendezvousCarrier};
pub use config::RoomConfig;
pub use error::RoomError;
pub use framed::FramedLinkCarrier;
pub use registry::RoomRegistry;
pub use room::{ActionReceiver, ActionSender, Inbound, Room};
