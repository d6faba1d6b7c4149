//! Mapping raw sender ids to peer handles.
//!
//! Resolution never fails loudly. A sender that cannot be matched yields
//! `None`, and callers treat that as "ignore this envelope".

use modlink_transport::{HostCharacter, PeerId};

use crate::Peer;

/// What to look a peer up by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerKey {
    Id(PeerId),
    /// Matched case-insensitively against the account name, then the nickname.
    Name(String),
}

impl From<PeerId> for PeerKey {
    fn from(id: PeerId) -> Self {
        Self::Id(id)
    }
}

impl From<&str> for PeerKey {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

/// Stateless lookups against a snapshot of the host's current peers.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl IdentityResolver {
    /// Finds a peer by id, exact name, or nickname.
    pub fn resolve(peers: &[HostCharacter], key: &PeerKey) -> Option<Peer> {
        let found = match key {
            PeerKey::Id(id) => peers.iter().find(|c| c.id == *id),
            PeerKey::Name(name) => {
                let wanted = name.to_lowercase();
                peers
                    .iter()
                    .find(|c| c.name.to_lowercase() == wanted)
                    .or_else(|| {
                        peers.iter().find(|c| {
                            c.nickname
                                .as_deref()
                                .is_some_and(|n| n.to_lowercase() == wanted)
                        })
                    })
            }
        };
        found.map(Peer::from)
    }

    /// Resolves the sender of an inbound envelope.
    ///
    /// A sender in `peers` resolves to its room record. Beeps can come from
    /// outside the room, so they pass the member name the host stamped on
    /// them as `beep_name`: a sender not in the room resolves to a bare
    /// handle built from that name. Chat senders pass `None` and must be in
    /// the room.
    pub fn resolve_sender(
        peers: &[HostCharacter],
        id: PeerId,
        beep_name: Option<&str>,
    ) -> Option<Peer> {
        if let Some(peer) = Self::resolve(peers, &PeerKey::Id(id)) {
            return Some(peer);
        }
        match beep_name {
            Some(name) if !name.is_empty() => Some(Peer::new(id, name)),
            _ => {
                tracing::debug!(sender = %id, "sender not resolvable");
                None
            }
        }
    }
}
