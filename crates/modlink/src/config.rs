//! Mod metadata and messenger configuration.

use modlink_rpc::RpcConfig;
use modlink_transport::ModInfo;
use serde::{Deserialize, Serialize};

use crate::ModlinkError;

/// Background of local log lines when the mod sets none.
pub const DEFAULT_MESSAGE_BACKGROUND: &str = "#ED55E890";
/// Text color of local log lines when the mod sets none.
pub const DEFAULT_MESSAGE_COLOR: &str = "black";

// ---------------------------------------------------------------------------
// ModData
// ---------------------------------------------------------------------------

/// Everything a mod tells modlink about itself at registration.
///
/// Field names follow the camelCase layout mods already ship in their
/// manifests, so a manifest can be deserialized directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModData {
    /// Short unique name, used with the mod registry.
    pub name: String,
    pub full_name: String,
    /// Tag that marks this mod's traffic on the wire. Peers must agree on it.
    pub key: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_message_background: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_message_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub font_family: Option<String>,
}

impl ModData {
    /// Creates mod data with no styling overrides.
    pub fn new(
        name: impl Into<String>,
        full_name: impl Into<String>,
        key: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            key: key.into(),
            version: version.into(),
            repository: None,
            chat_message_background: None,
            chat_message_color: None,
            font_family: None,
        }
    }

    /// Checks the fields modlink cannot work without.
    ///
    /// # Errors
    /// [`ModlinkError::Config`] if `name` or `key` is blank.
    pub fn validated(self) -> Result<Self, ModlinkError> {
        if self.name.trim().is_empty() {
            return Err(ModlinkError::Config("mod name must not be empty".into()));
        }
        if self.key.trim().is_empty() {
            return Err(ModlinkError::Config("mod key must not be empty".into()));
        }
        Ok(self)
    }

    /// Local line background, falling back to [`DEFAULT_MESSAGE_BACKGROUND`].
    pub fn message_background(&self) -> &str {
        self.chat_message_background
            .as_deref()
            .unwrap_or(DEFAULT_MESSAGE_BACKGROUND)
    }

    /// Local line text color, falling back to [`DEFAULT_MESSAGE_COLOR`].
    pub fn message_color(&self) -> &str {
        self.chat_message_color.as_deref().unwrap_or(DEFAULT_MESSAGE_COLOR)
    }

    /// The registry entry for this mod.
    pub fn mod_info(&self) -> ModInfo {
        ModInfo {
            name: self.name.clone(),
            full_name: self.full_name.clone(),
            version: self.version.clone(),
            repository: self.repository.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// MessengerConfig
// ---------------------------------------------------------------------------

/// Tunables for a [`Messenger`](crate::Messenger).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessengerConfig {
    pub rpc: RpcConfig,
}

impl MessengerConfig {
    pub fn validated(self) -> Self {
        Self {
            rpc: self.rpc.validated(),
        }
    }
}
