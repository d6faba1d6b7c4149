//! Page-wide state and per-mod registration.
//!
//! A page hosts one [`HostEnv`]: the mod registry, the popup surface and
//! the host connection. Each mod calls [`HostEnv::register_core`] once and
//! gets back its own [`Core`].
//!
//! ```text
//! HostEnv ──(register_core)──→ Core { ModApi, Messenger, PopupSurface }
//!    │                             ↑
//!    └──── shared ModSdk / PopupSurface / host ────┘
//! ```

use std::sync::Arc;

use modlink_transport::{HostTransport, ModApi, ModSdk};
use tracing::info;

use crate::popups::{DialogStore, PopupSurface, Toasts};
use crate::{Messenger, MessengerConfig, ModData, ModlinkError};

/// Process-scoped state shared by every mod on the page.
pub struct HostEnv<H: HostTransport> {
    sdk: ModSdk,
    popups: PopupSurface,
    host: Arc<H>,
}

impl<H: HostTransport> HostEnv<H> {
    /// Creates the page state around `host`.
    pub fn new(host: H) -> Self {
        Self::with_sdk(ModSdk::new(), Arc::new(host))
    }

    /// Uses an existing registry and host handle.
    pub fn with_sdk(sdk: ModSdk, host: Arc<H>) -> Self {
        Self {
            sdk,
            popups: PopupSurface::new(),
            host,
        }
    }

    pub fn sdk(&self) -> &ModSdk {
        &self.sdk
    }

    pub fn popups(&self) -> &PopupSurface {
        &self.popups
    }

    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Registers a mod with default messenger settings.
    ///
    /// # Errors
    /// - [`ModlinkError::Config`] if the mod data is invalid.
    /// - [`ModlinkError::Transport`] if the name is already registered.
    pub fn register_core(&self, mod_data: ModData) -> Result<Core<H>, ModlinkError> {
        self.register_core_with(mod_data, MessengerConfig::default())
    }

    /// Registers a mod with explicit messenger settings.
    pub fn register_core_with(
        &self,
        mod_data: ModData,
        config: MessengerConfig,
    ) -> Result<Core<H>, ModlinkError> {
        let mod_data = Arc::new(mod_data.validated()?);
        let api = self.sdk.register_mod(mod_data.mod_info())?;
        let messenger = Messenger::new(
            api.clone(),
            Arc::clone(&self.host),
            Arc::clone(&mod_data),
            config,
        );

        info!(name = %mod_data.name, version = %mod_data.version, "core registered");
        Ok(Core {
            mod_data,
            api,
            messenger,
            popups: self.popups.clone(),
        })
    }
}

/// One registered mod's handle on modlink.
pub struct Core<H: HostTransport> {
    mod_data: Arc<ModData>,
    api: ModApi,
    messenger: Messenger<H>,
    popups: PopupSurface,
}

impl<H: HostTransport> Core<H> {
    pub fn mod_data(&self) -> &ModData {
        &self.mod_data
    }

    /// The registry handle, for hooking host events directly.
    pub fn api(&self) -> &ModApi {
        &self.api
    }

    pub fn messenger(&self) -> &Messenger<H> {
        &self.messenger
    }

    pub fn toasts(&self) -> Toasts {
        self.popups.toasts()
    }

    pub fn dialogs(&self) -> &DialogStore {
        self.popups.dialogs()
    }

    pub fn popups(&self) -> &PopupSurface {
        &self.popups
    }
}
