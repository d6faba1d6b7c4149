//! The page-wide mod registry.
//!
//! Every mod loaded into the same page shares one [`ModSdk`]: the list of
//! registered mods and one [`HookChain`] per observable host event. A mod
//! gets a [`ModApi`] by registering, and only a `ModApi` can hook events,
//! so "hooking before registration" cannot happen through the typed API.
//! Callers that only hold a mod name go through [`ModSdk::api`], which
//! fails immediately with [`TransportError::NotRegistered`].

use std::sync::{Arc, Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::hooks::{HookChain, HookHandle, HookPriority, HostEvent, Next};
use crate::{AccountBeep, ChatRoomMessage, TransportError};

/// Metadata a mod registers under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModInfo {
    /// Short unique name.
    pub name: String,
    /// Human-readable name.
    pub full_name: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
}

struct SdkInner {
    mods: Mutex<Vec<ModInfo>>,
    chat: HookChain<ChatRoomMessage>,
    beeps: HookChain<AccountBeep>,
}

/// Shared registry of mods and host event hooks. Cheap to clone.
#[derive(Clone)]
pub struct ModSdk {
    inner: Arc<SdkInner>,
}

impl ModSdk {
    /// Creates an empty registry. One per page.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(SdkInner {
                mods: Mutex::new(Vec::new()),
                chat: HookChain::new(HostEvent::ChatRoomMessage),
                beeps: HookChain::new(HostEvent::AccountBeep),
            }),
        }
    }

    /// Registers a mod and returns its API handle.
    ///
    /// # Errors
    /// - [`TransportError::InvalidModInfo`] if the name is blank.
    /// - [`TransportError::AlreadyRegistered`] if the name is taken.
    pub fn register_mod(&self, info: ModInfo) -> Result<ModApi, TransportError> {
        if info.name.trim().is_empty() {
            return Err(TransportError::InvalidModInfo("name must not be empty".into()));
        }

        let mut mods = self.inner.mods.lock().unwrap_or_else(PoisonError::into_inner);
        if mods.iter().any(|m| m.name == info.name) {
            return Err(TransportError::AlreadyRegistered(info.name));
        }
        mods.push(info.clone());
        drop(mods);

        tracing::info!(name = %info.name, version = %info.version, "mod registered");
        Ok(ModApi {
            info,
            sdk: self.clone(),
        })
    }

    /// Returns the API handle of an already registered mod.
    ///
    /// # Errors
    /// [`TransportError::NotRegistered`] if no mod has that name.
    pub fn api(&self, name: &str) -> Result<ModApi, TransportError> {
        let mods = self.inner.mods.lock().unwrap_or_else(PoisonError::into_inner);
        mods.iter()
            .find(|m| m.name == name)
            .cloned()
            .map(|info| ModApi {
                info,
                sdk: self.clone(),
            })
            .ok_or_else(|| TransportError::NotRegistered(name.to_string()))
    }

    /// Every mod registered so far, in registration order.
    pub fn loaded_mods(&self) -> Vec<ModInfo> {
        self.inner.mods.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns `true` if a mod with this name is registered.
    pub fn find_mod(&self, name: &str) -> bool {
        self.inner
            .mods
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|m| m.name == name)
    }

    /// Feeds a delivered chat message through every observer, then `original`.
    pub fn dispatch_chat(&self, message: &ChatRoomMessage, original: impl Fn(&ChatRoomMessage)) {
        self.inner.chat.dispatch(message, original);
    }

    /// Feeds a delivered beep through every observer, then `original`.
    pub fn dispatch_beep(&self, beep: &AccountBeep, original: impl Fn(&AccountBeep)) {
        self.inner.beeps.dispatch(beep, original);
    }

    /// Number of observers on a chain. Mostly useful in tests.
    pub fn hook_count(&self, event: HostEvent) -> usize {
        match event {
            HostEvent::ChatRoomMessage => self.inner.chat.len(),
            HostEvent::AccountBeep => self.inner.beeps.len(),
        }
    }
}

impl Default for ModSdk {
    fn default() -> Self {
        Self::new()
    }
}

/// A registered mod's view of the [`ModSdk`].
#[derive(Clone)]
pub struct ModApi {
    info: ModInfo,
    sdk: ModSdk,
}

impl ModApi {
    /// The metadata this mod registered with.
    pub fn info(&self) -> &ModInfo {
        &self.info
    }

    /// The shared registry this mod belongs to.
    pub fn sdk(&self) -> &ModSdk {
        &self.sdk
    }

    /// Observes delivered chat messages.
    pub fn hook_chat<F>(&self, priority: HookPriority, observer: F) -> HookHandle
    where
        F: Fn(&ChatRoomMessage, Next<'_, ChatRoomMessage>) + Send + Sync + 'static,
    {
        tracing::debug!(name = %self.info.name, ?priority, "hooking ChatRoomMessage");
        self.sdk.inner.chat.hook(priority, observer)
    }

    /// Observes delivered private beeps.
    pub fn hook_beep<F>(&self, priority: HookPriority, observer: F) -> HookHandle
    where
        F: Fn(&AccountBeep, Next<'_, AccountBeep>) + Send + Sync + 'static,
    {
        tracing::debug!(name = %self.info.name, ?priority, "hooking AccountBeep");
        self.sdk.inner.beeps.hook(priority, observer)
    }

    /// Removes an observer. Returns `false` if it was already gone.
    pub fn unhook(&self, handle: HookHandle) -> bool {
        match handle.event() {
            HostEvent::ChatRoomMessage => self.sdk.inner.chat.remove(handle),
            HostEvent::AccountBeep => self.sdk.inner.beeps.remove(handle),
        }
    }
}
