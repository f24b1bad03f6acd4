//! Wire protocol for Peerboard.
//!
//! Everything peers say to each other is a JSON payload on a named action.
//! This crate defines:
//!
//! - **Types** ([`Heartbeat`], [`Challenge`], [`RoleAnnounce`], ...): the
//!   payload of each action, plus identity types ([`RoomId`], [`GameId`],
//!   [`Color`]).
//! - **Actions** ([`action`]): the action names and their length bound.
//! - **Codec** ([`Codec`], [`JsonCodec`]): how an [`Envelope`] becomes
//!   bytes on the rendezvous carrier.
//! - **Framing** ([`frame`]): the length-prefixed byte format used on the
//!   short-range link.
//!
//! ```text
//! Carrier (bytes) → Protocol (action + payload) → Room listeners
//! ```

pub mod action;
mod codec;
mod error;
pub mod frame;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use frame::{chunk_frame, encode_frame, Frame, FrameDecoder};
pub use types::{
    now_millis, Challenge, ChallengeResponse, Chat, Color, Envelope, GameId,
    Heartbeat, MoveBroadcast, PeerId, PositionSync, ResponseKind, Role,
    RoleAnnounce, RoomId,
};
