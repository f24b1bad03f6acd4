//! Who plays which color.
//!
//! Roles are advertised, never assigned centrally: each peer derives its
//! own role from the lobby handshake and announces it. A [`RoleBook`]
//! collects the announcements with two rules:
//!
//! - an announcement counts only when its `peerId` is the sender's own id;
//! - the first peer seen for a color keeps it.
//!
//! First-seen-wins is a simple ordering policy, not consensus. With three
//! or more peers racing during the handshake, observers can disagree.

use std::collections::BTreeSet;

use peerboard_protocol::{Color, PeerId, Role, RoleAnnounce};

/// What a [`RoleBook`] did with an announcement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoleUpdate {
    /// The peer now holds the color.
    Assigned(Color),
    /// Already known; nothing changed.
    Unchanged,
    /// The peer is a spectator.
    Spectator,
    /// Dropped: the payload named someone other than the sender, or the
    /// color is held by another peer, or the peer already holds the other
    /// color.
    Rejected,
}

/// Color assignments as this peer has learned them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleBook {
    white: Option<PeerId>,
    black: Option<PeerId>,
    spectators: BTreeSet<PeerId>,
}

impl RoleBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records our own role. `None` means we are spectating.
    pub fn set_local(&mut self, id: &PeerId, color: Option<Color>) {
        match color {
            Some(c) => {
                let slot = self.slot_mut(c);
                if slot.is_none() {
                    *slot = Some(id.clone());
                }
            }
            None => {
                self.spectators.insert(id.clone());
            }
        }
    }

    /// Applies an announcement received from `from`.
    pub fn on_announce(&mut self, from: &PeerId, announce: &RoleAnnounce) -> RoleUpdate {
        if announce.peer_id != *from {
            return RoleUpdate::Rejected;
        }
        let color = match (announce.role, announce.claimed_color()) {
            (Role::Player, Some(c)) => c,
            // A player announcement without a color says nothing usable.
            (Role::Player, None) => return RoleUpdate::Rejected,
            (Role::Spectator, _) => {
                return if self.spectators.insert(from.clone()) {
                    RoleUpdate::Spectator
                } else {
                    RoleUpdate::Unchanged
                };
            }
        };

        if self.slot(color.opposite()) == Some(from) {
            return RoleUpdate::Rejected;
        }
        let slot = self.slot_mut(color);
        match slot.as_ref() {
            Some(holder) if holder == from => RoleUpdate::Unchanged,
            Some(_) => RoleUpdate::Rejected,
            None => {
                *slot = Some(from.clone());
                RoleUpdate::Assigned(color)
            }
        }
    }

    pub fn white(&self) -> Option<&PeerId> {
        self.white.as_ref()
    }

    pub fn black(&self) -> Option<&PeerId> {
        self.black.as_ref()
    }

    /// The color `peer` plays, if any.
    pub fn color_of(&self, peer: &PeerId) -> Option<Color> {
        if self.white.as_ref() == Some(peer) {
            Some(Color::White)
        } else if self.black.as_ref() == Some(peer) {
            Some(Color::Black)
        } else {
            None
        }
    }

    pub fn is_spectator(&self, peer: &PeerId) -> bool {
        self.spectators.contains(peer)
    }

    pub fn both_known(&self) -> bool {
        self.white.is_some() && self.black.is_some()
    }

    /// Whether a bare position broadcast from `peer` may be believed:
    /// until both players are known anyone may send one, afterwards only
    /// the players.
    pub fn may_broadcast_position(&self, peer: &PeerId) -> bool {
        !self.both_known() || self.color_of(peer).is_some()
    }

    fn slot(&self, color: Color) -> Option<&PeerId> {
        match color {
            Color::White => self.white.as_ref(),
            Color::Black => self.black.as_ref(),
        }
    }

    fn slot_mut(&mut self, color: Color) -> &mut Option<PeerId> {
        match color {
            Color::White => &mut self.white,
            Color::Black => &mut self.black,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(color: Color, id: &str) -> RoleAnnounce {
        RoleAnnounce::player(color, PeerId::from(id))
    }

    #[test]
    fn test_spoofed_announcement_is_rejected() {
        let mut book = RoleBook::new();
        let update = book.on_announce(&"mallory".into(), &player(Color::White, "alice"));
        assert_eq!(update, RoleUpdate::Rejected);
        assert!(book.white().is_none());
    }

    #[test]
    fn test_first_seen_wins_per_color() {
        let mut book = RoleBook::new();
        assert_eq!(
            book.on_announce(&"a".into(), &player(Color::White, "a")),
            RoleUpdate::Assigned(Color::White)
        );
        assert_eq!(
            book.on_announce(&"c".into(), &player(Color::White, "c")),
            RoleUpdate::Rejected
        );
        assert_eq!(
            book.on_announce(&"a".into(), &player(Color::White, "a")),
            RoleUpdate::Unchanged
        );
        assert_eq!(book.white(), Some(&PeerId::from("a")));
    }

    #[test]
    fn test_peer_cannot_hold_both_colors() {
        let mut book = RoleBook::new();
        book.on_announce(&"a".into(), &player(Color::White, "a"));
        assert_eq!(
            book.on_announce(&"a".into(), &player(Color::Black, "a")),
            RoleUpdate::Rejected
        );
        assert!(book.black().is_none());
    }

    #[test]
    fn test_observer_converges_regardless_of_order() {
        let a = player(Color::White, "a");
        let b = player(Color::Black, "b");

        let mut one = RoleBook::new();
        one.on_announce(&"a".into(), &a);
        one.on_announce(&"b".into(), &b);

        let mut two = RoleBook::new();
        two.on_announce(&"b".into(), &b);
        two.on_announce(&"a".into(), &a);

        assert_eq!(one, two);
        assert_eq!(one.color_of(&"b".into()), Some(Color::Black));
    }

    #[test]
    fn test_local_role_is_not_overridden() {
        let mut book = RoleBook::new();
        book.set_local(&"me".into(), Some(Color::Black));
        assert_eq!(
            book.on_announce(&"x".into(), &player(Color::Black, "x")),
            RoleUpdate::Rejected
        );
        assert_eq!(book.color_of(&"me".into()), Some(Color::Black));
    }

    #[test]
    fn test_position_broadcast_gate() {
        let mut book = RoleBook::new();
        assert!(book.may_broadcast_position(&"s".into()));
        book.on_announce(&"a".into(), &player(Color::White, "a"));
        book.on_announce(&"b".into(), &player(Color::Black, "b"));
        book.on_announce(&"s".into(), &RoleAnnounce::spectator("s".into()));
        assert!(book.is_spectator(&"s".into()));
        assert!(!book.may_broadcast_position(&"s".into()));
        assert!(book.may_broadcast_position(&"b".into()));
    }
}
