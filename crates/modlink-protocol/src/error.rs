//! Error types for the protocol layer.
//!
//! Decoding runs on every inbound host event, most of which belong to the
//! host or to other mods. So "this is not ours" is an ordinary outcome
//! here, not a failure: callers treat every `Err` from a decode as "pass
//! the event through untouched".

/// Errors that can occur while encoding or decoding envelopes.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The event carries a foreign tag, a foreign beep type, or no
    /// discriminator at all. It belongs to someone else.
    #[error("not a modlink message")]
    NotOurs,

    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// The private-channel body is not valid JSON.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The message is ours but its shape is wrong, e.g. a request whose
    /// `requestId` is not a string, or a packet using a reserved name.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

impl ProtocolError {
    /// Returns `true` for events that simply belong to someone else.
    pub fn is_not_ours(&self) -> bool {
        matches!(self, Self::NotOurs)
    }
}
