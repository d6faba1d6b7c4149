//! Records exchanged with the host game, and the [`HostTransport`] trait.
//!
//! The host owns two one-way channels: the in-room chat stream (everyone
//! present sees it) and private account beeps (one recipient). Modlink does
//! not own either of them. It can hand a message to the host and it can
//! observe what the host delivers, nothing more. There is no delivery
//! acknowledgment on either channel.
//!
//! Field names follow the host's own JSON (PascalCase), so these structs
//! can be passed to and from the host glue without remapping.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::TransportError;

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The host's numeric member number for a participant.
///
/// Serialized as a plain number (`#[serde(transparent)]`), because that is
/// how the host carries `Sender`, `Target` and `MemberNumber`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PeerId(pub u64);

impl PeerId {
    /// Returns the underlying member number.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One character the host currently knows about (someone in the room,
/// including the local player).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct HostCharacter {
    #[serde(rename = "MemberNumber")]
    pub id: PeerId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    /// Raw pronoun description as the host reports it, e.g. `"She/Her"`.
    #[serde(default)]
    pub pronouns: String,
}

impl HostCharacter {
    /// Convenience constructor used by hosts and tests.
    pub fn new(id: u64, name: impl Into<String>, pronouns: impl Into<String>) -> Self {
        Self {
            id: PeerId(id),
            name: name.into(),
            nickname: None,
            pronouns: pronouns.into(),
        }
    }

    /// Sets the nickname.
    pub fn with_nickname(mut self, nickname: impl Into<String>) -> Self {
        self.nickname = Some(nickname.into());
        self
    }
}

// ---------------------------------------------------------------------------
// Chat channel
// ---------------------------------------------------------------------------

/// The host's chat message type.
///
/// Unknown types are kept verbatim in [`ChatKind::Other`] so an observer
/// can forward them untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ChatKind {
    Chat,
    Action,
    Emote,
    Whisper,
    /// Not rendered by the host; used for mod-to-mod traffic.
    Hidden,
    LocalMessage,
    Other(String),
}

impl From<String> for ChatKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Chat" => Self::Chat,
            "Action" => Self::Action,
            "Emote" => Self::Emote,
            "Whisper" => Self::Whisper,
            "Hidden" => Self::Hidden,
            "LocalMessage" => Self::LocalMessage,
            _ => Self::Other(value),
        }
    }
}

impl From<ChatKind> for String {
    fn from(kind: ChatKind) -> Self {
        match kind {
            ChatKind::Chat => "Chat".into(),
            ChatKind::Action => "Action".into(),
            ChatKind::Emote => "Emote".into(),
            ChatKind::Whisper => "Whisper".into(),
            ChatKind::Hidden => "Hidden".into(),
            ChatKind::LocalMessage => "LocalMessage".into(),
            ChatKind::Other(other) => other,
        }
    }
}

/// A chat message handed to the host for delivery to the room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutgoingChat {
    pub content: String,
    #[serde(rename = "Type")]
    pub kind: ChatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<Value>,
    /// Set for unicast messages; `None` broadcasts to the whole room.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<PeerId>,
}

/// A chat message the host delivered to the local player.
///
/// The host also delivers the local player's own messages back (loopback),
/// so observers must filter on `sender` themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ChatRoomMessage {
    pub sender: PeerId,
    pub content: String,
    #[serde(rename = "Type")]
    pub kind: ChatKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionary: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<PeerId>,
}

// ---------------------------------------------------------------------------
// Private (beep) channel
// ---------------------------------------------------------------------------

/// Beep type used for all modlink private traffic.
pub const LEASH_BEEP: &str = "Leash";

/// A private beep handed to the host for delivery to one member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OutgoingBeep {
    pub is_secret: bool,
    pub beep_type: String,
    /// The recipient.
    pub member_number: PeerId,
    /// The only free-form field the host carries; modlink stores JSON here.
    pub message: String,
}

/// A private beep the host delivered to the local player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AccountBeep {
    /// The sender.
    pub member_number: PeerId,
    #[serde(default)]
    pub member_name: String,
    pub beep_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Local log
// ---------------------------------------------------------------------------

/// A styled line appended to the local player's own message log.
/// Never transmitted to anyone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalLine {
    /// HTML body of the line.
    pub html: String,
    /// Always the local player.
    pub sender: PeerId,
    pub background: String,
    pub color: String,
    pub font_family: Option<String>,
}

// ---------------------------------------------------------------------------
// HostTransport
// ---------------------------------------------------------------------------

/// What modlink needs from the host environment.
///
/// Implemented by the glue that talks to the real game, and by
/// [`LoopbackHost`](crate::LoopbackHost) for tests.
///
/// Inbound traffic does not come through this trait: the host glue feeds
/// every delivered event into [`ModSdk::dispatch_chat`](crate::ModSdk::dispatch_chat)
/// and [`ModSdk::dispatch_beep`](crate::ModSdk::dispatch_beep).
pub trait HostTransport: Send + Sync + 'static {
    /// Hands a chat message to the host. No delivery confirmation.
    fn send_chat(&self, message: OutgoingChat) -> Result<(), TransportError>;

    /// Hands a private beep to the host. No delivery confirmation.
    fn send_beep(&self, beep: OutgoingBeep) -> Result<(), TransportError>;

    /// Appends a line to the local player's log.
    fn append_local(&self, line: LocalLine) -> Result<(), TransportError>;

    /// Everyone currently addressable in the room, the local player included.
    fn current_peers(&self) -> Vec<HostCharacter>;

    /// The local player's member number.
    fn self_id(&self) -> PeerId;

    /// Whether the local player is currently inside a chat room.
    fn in_chat_room(&self) -> bool;
}
