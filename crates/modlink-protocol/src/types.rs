//! Logical envelope types.
//!
//! These are the messages modlink peers exchange, before they are squeezed
//! into the host's chat or beep records by the [`WireCodec`](crate::WireCodec).

use std::fmt;

use modlink_transport::PeerId;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Wire discriminator of a request.
pub const REQUEST_KIND: &str = "request";
/// Wire discriminator of a response to a request.
pub const RESPONSE_KIND: &str = "requestResponse";

// ---------------------------------------------------------------------------
// Channel
// ---------------------------------------------------------------------------

/// Which host channel a message travels on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    /// Hidden in-room chat. Everyone present can observe it.
    #[default]
    Broadcast,
    /// Private account beep to a single member.
    Private,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Broadcast => write!(f, "broadcast"),
            Self::Private => write!(f, "private"),
        }
    }
}

// ---------------------------------------------------------------------------
// CorrelationId
// ---------------------------------------------------------------------------

/// Pairs one request with its response.
///
/// Opaque on the wire: any string a peer sends is accepted as an id.
/// Locally generated ids are 128 random bits as 32 lowercase hex chars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generates a fresh random id.
    pub fn generate() -> Self {
        let bytes: [u8; 16] = rand::rng().random();
        Self(bytes.iter().map(|b| format!("{b:02x}")).collect())
    }

    /// Wraps an id received from a peer.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as sent on the wire.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// Body shared by requests and responses.
///
/// A response echoes the request's `request_id` and `message`; `data` is
/// the request payload on the way out and the handler's answer on the way
/// back. Modlink never looks inside `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestData {
    #[serde(rename = "requestId")]
    pub request_id: CorrelationId,
    /// The logical message name, e.g. `"ping"`.
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

/// A logical modlink message.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// Asks a peer to run the handler registered for `message`.
    Request(RequestData),
    /// Answers an earlier request.
    RequestResponse(RequestData),
    /// One-way message; nobody answers it.
    Packet { name: String, data: Option<Value> },
}

impl Envelope {
    /// The discriminator this envelope travels under.
    pub fn kind(&self) -> &str {
        match self {
            Self::Request(_) => REQUEST_KIND,
            Self::RequestResponse(_) => RESPONSE_KIND,
            Self::Packet { name, .. } => name,
        }
    }
}

/// An envelope recovered from an inbound host event, with who sent it.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub channel: Channel,
    pub sender: PeerId,
    /// Only the private channel carries the sender's name.
    pub sender_name: Option<String>,
    pub envelope: Envelope,
}
