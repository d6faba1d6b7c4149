//! Wire protocol for modlink.
//!
//! This crate defines what modlink peers say to each other and how it is
//! packed into the host's records:
//!
//! - **Types** ([`Envelope`], [`RequestData`], [`CorrelationId`], [`Channel`]):
//!   the logical messages.
//! - **Codec** ([`WireCodec`]): the broadcast (hidden chat) and private
//!   (beep) encodings.
//! - **Errors** ([`ProtocolError`]): what can go wrong, including the very
//!   common "this event is not ours".
//!
//! ```text
//! Transport (host records) → Protocol (Envelope) → Session (who sent it)
//! ```

mod codec;
mod error;
mod types;

pub use codec::WireCodec;
pub use error::ProtocolError;
pub use types::{
    Channel, CorrelationId, Decoded, Envelope, REQUEST_KIND, RESPONSE_KIND, RequestData,
};
