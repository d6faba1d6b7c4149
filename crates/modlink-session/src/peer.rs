//! Peer handles: who sent an envelope, in a form handlers can use.
//!
//! The host reports characters as raw records ([`HostCharacter`]); a
//! [`Peer`] is the resolved, owned view of one of them, with the pronoun
//! description already parsed.

use std::fmt;

use modlink_transport::{HostCharacter, PeerId};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Pronouns
// ---------------------------------------------------------------------------

/// The pronoun set used when rendering action text.
///
/// The host stores a free-form description. Only the exact string
/// `"She/Her"` maps to [`Pronouns::SheHer`]; everything else, including an
/// empty description, falls back to [`Pronouns::HeHim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Pronouns {
    SheHer,
    #[default]
    HeHim,
}

impl Pronouns {
    /// Parses the host's pronoun description.
    pub fn from_description(description: &str) -> Self {
        if description == "She/Her" {
            Self::SheHer
        } else {
            Self::HeHim
        }
    }

    /// "Her" / "His".
    pub fn possessive(self) -> &'static str {
        match self {
            Self::SheHer => "Her",
            Self::HeHim => "His",
        }
    }

    /// "Her" / "Him".
    pub fn intensive(self) -> &'static str {
        match self {
            Self::SheHer => "Her",
            Self::HeHim => "Him",
        }
    }

    /// "Herself" / "Himself".
    pub fn self_intensive(self) -> &'static str {
        match self {
            Self::SheHer => "Herself",
            Self::HeHim => "Himself",
        }
    }

    /// "She" / "He".
    pub fn subject(self) -> &'static str {
        match self {
            Self::SheHer => "She",
            Self::HeHim => "He",
        }
    }
}

// ---------------------------------------------------------------------------
// Peer
// ---------------------------------------------------------------------------

/// A resolved message sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Peer {
    pub id: PeerId,
    pub name: String,
    pub nickname: Option<String>,
    pub pronouns: Pronouns,
}

impl Peer {
    /// Builds a handle for a sender we only know by id and name.
    pub fn new(id: PeerId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            nickname: None,
            pronouns: Pronouns::default(),
        }
    }

    /// The nickname when one is set, otherwise the account name.
    pub fn display_name(&self) -> &str {
        match self.nickname.as_deref() {
            Some(nick) if !nick.is_empty() => nick,
            _ => &self.name,
        }
    }
}

impl From<&HostCharacter> for Peer {
    fn from(character: &HostCharacter) -> Self {
        Self {
            id: character.id,
            name: character.name.clone(),
            nickname: character.nickname.clone(),
            pronouns: Pronouns::from_description(&character.pronouns),
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.display_name(), self.id)
    }
}
