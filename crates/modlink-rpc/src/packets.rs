//! One-way packet listeners.
//!
//! Unlike request handlers, packet listeners accumulate: every listener
//! registered for a name runs, in registration order, and none of them can
//! answer.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use modlink_protocol::{REQUEST_KIND, RESPONSE_KIND};
use serde_json::Value;
use tracing::{debug, error};

use crate::dispatch::panic_message;
use crate::{PayloadValidator, RequestContext, RpcError};

/// A packet listener. Absent payloads arrive as `Value::Null`.
pub type PacketListener = dyn Fn(&Value, &RequestContext) + Send + Sync;

#[derive(Clone)]
struct ListenerEntry {
    validator: PayloadValidator,
    listener: Arc<PacketListener>,
}

/// Listeners keyed by packet name. Cheap to clone.
#[derive(Clone, Default)]
pub struct PacketListeners {
    listeners: Arc<Mutex<HashMap<String, Vec<ListenerEntry>>>>,
}

impl PacketListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a listener for `name`.
    ///
    /// # Errors
    /// - [`RpcError::EmptyName`] for an empty name.
    /// - [`RpcError::ReservedName`] for the request and response discriminators.
    pub fn add<F>(&self, name: &str, validator: PayloadValidator, listener: F) -> Result<(), RpcError>
    where
        F: Fn(&Value, &RequestContext) + Send + Sync + 'static,
    {
        if name.is_empty() {
            return Err(RpcError::EmptyName);
        }
        if name == REQUEST_KIND || name == RESPONSE_KIND {
            return Err(RpcError::ReservedName(name.to_string()));
        }

        let mut listeners = self.lock();
        let list = listeners.entry(name.to_string()).or_default();
        list.push(ListenerEntry {
            validator,
            listener: Arc::new(listener),
        });
        debug!(name, count = list.len(), "packet listener added");
        Ok(())
    }

    /// Number of listeners for `name`.
    pub fn count(&self, name: &str) -> usize {
        self.lock().get(name).map_or(0, Vec::len)
    }

    /// Runs every listener for `name` whose validator accepts `payload`.
    /// Returns how many ran to completion.
    pub fn notify(&self, name: &str, payload: &Value, ctx: &RequestContext) -> usize {
        let Some(entries) = self.lock().get(name).cloned() else {
            return 0;
        };

        let mut ran = 0;
        for entry in &entries {
            if let Err(errors) = entry.validator.validate(payload) {
                debug!(name, sender = %ctx.sender.id, ?errors, "packet payload rejected");
                continue;
            }
            let listener = &entry.listener;
            match catch_unwind(AssertUnwindSafe(|| listener(payload, ctx))) {
                Ok(()) => ran += 1,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    error!(name, sender = %ctx.sender.id, %message, "packet listener panicked");
                }
            }
        }
        ran
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Vec<ListenerEntry>>> {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
