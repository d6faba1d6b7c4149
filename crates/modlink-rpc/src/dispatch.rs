//! Answering inbound requests.
//!
//! The [`Responder`] maps a logical message name to one [`Registration`].
//! Dispatching a request runs, in order:
//!
//! ```text
//! lookup by name ──→ validate payload ──→ run handler ──→ Some(v)? respond
//!      │                   │                  │
//!      ▼                   ▼                  ▼
//!  NoHandler           Rejected            Panicked
//! ```
//!
//! Every branch except `Respond` means "send nothing back"; the requester
//! sees a timeout. Registering a name twice replaces the first handler.
//! A handler panic is caught, logged and reported as [`DispatchOutcome::Panicked`],
//! so one faulty handler cannot tear down the shared inbound hook.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use modlink_protocol::{Channel, RequestData};
use modlink_session::Peer;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::{PayloadValidator, RpcError};

// ---------------------------------------------------------------------------
// RequestContext
// ---------------------------------------------------------------------------

/// Who sent a request, and how it arrived.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub sender: Peer,
    /// The name the host attached to a private beep, if any.
    pub sender_name: Option<String>,
    /// Responses go back on the channel the request came in on.
    pub channel: Channel,
}

// ---------------------------------------------------------------------------
// Registration
// ---------------------------------------------------------------------------

/// A request handler. Returning `None` sends no response.
pub type RequestHandler = dyn Fn(Value, &RequestContext) -> Option<Value> + Send + Sync;

/// A handler plus the validator that guards it.
#[derive(Clone)]
pub struct Registration {
    validator: PayloadValidator,
    handler: Arc<RequestHandler>,
}

impl Registration {
    /// A handler that sees every payload.
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(Value, &RequestContext) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            validator: PayloadValidator::AlwaysValid,
            handler: Arc::new(handler),
        }
    }

    /// A handler that only runs when `schema` accepts the payload.
    pub fn with_schema<F>(schema: PayloadValidator, handler: F) -> Self
    where
        F: Fn(Value, &RequestContext) -> Option<Value> + Send + Sync + 'static,
    {
        Self {
            validator: schema,
            handler: Arc::new(handler),
        }
    }

    pub fn validator(&self) -> &PayloadValidator {
        &self.validator
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("validator", &self.validator)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// DispatchOutcome
// ---------------------------------------------------------------------------

/// What happened to one inbound request.
#[derive(Debug, Clone, PartialEq)]
pub enum DispatchOutcome {
    /// Send this payload back to the requester.
    Respond(Value),
    /// The handler ran and chose not to answer.
    NoResponse,
    /// Nothing is registered under the request's name.
    NoHandler,
    /// The payload failed validation; the handler did not run.
    Rejected(Vec<String>),
    /// The handler panicked.
    Panicked(String),
}

impl DispatchOutcome {
    /// The payload to send back, if any.
    pub fn response(self) -> Option<Value> {
        match self {
            Self::Respond(value) => Some(value),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Responder
// ---------------------------------------------------------------------------

/// Handler map for inbound requests. Cheap to clone.
#[derive(Clone, Default)]
pub struct Responder {
    handlers: Arc<Mutex<HashMap<String, Registration>>>,
}

impl Responder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `registration` under `name`, replacing any earlier one.
    ///
    /// # Errors
    /// [`RpcError::EmptyName`] if `name` is empty.
    pub fn register(&self, name: &str, registration: Registration) -> Result<(), RpcError> {
        if name.is_empty() {
            return Err(RpcError::EmptyName);
        }
        let previous = self.lock().insert(name.to_string(), registration);
        if previous.is_some() {
            warn!(name, "request handler replaced");
        } else {
            debug!(name, "request handler registered");
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Runs the handler registered for `request.message`.
    ///
    /// The map lock is released before the handler runs, so a handler may
    /// register further handlers.
    pub fn dispatch(&self, request: &RequestData, ctx: &RequestContext) -> DispatchOutcome {
        let name = request.message.as_str();
        let Some(registration) = self.lock().get(name).cloned() else {
            debug!(name, sender = %ctx.sender.id, "no handler for request");
            return DispatchOutcome::NoHandler;
        };

        if let Err(errors) = registration.validator.validate(&request.data) {
            debug!(name, sender = %ctx.sender.id, ?errors, "request payload rejected");
            return DispatchOutcome::Rejected(errors);
        }

        let handler = &registration.handler;
        match catch_unwind(AssertUnwindSafe(|| handler(request.data.clone(), ctx))) {
            Ok(Some(value)) => DispatchOutcome::Respond(value),
            Ok(None) => DispatchOutcome::NoResponse,
            Err(panic) => {
                let message = panic_message(panic.as_ref());
                error!(name, sender = %ctx.sender.id, %message, "request handler panicked");
                DispatchOutcome::Panicked(message)
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Registration>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Extracts the message from a caught panic payload.
pub(crate) fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}
