//! Peer identity for modlink.
//!
//! Inbound envelopes only carry a numeric sender id (plus a name on the
//! private channel). This crate turns that into a [`Peer`] handlers can
//! use, or into nothing at all when the sender cannot be found.
//!
//! ```text
//! RPC Layer (above)  ← hands resolved peers to request handlers
//!     ↕
//! Session Layer (this crate)  ← sender id → Peer
//!     ↕
//! Transport Layer (below)  ← provides PeerId and the host's roster
//! ```

mod peer;
mod resolver;

pub use peer::{Peer, Pronouns};
pub use resolver::{IdentityResolver, PeerKey};
