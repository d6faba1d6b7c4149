//! Error types for the RPC layer.
//!
//! Inbound problems (unknown ids, missing handlers, failed validation) are
//! never errors here: they are absorbed and logged. These variants only
//! cover misuse of the registration API and a request that got no answer.

/// Errors that can occur while registering handlers or reading outcomes.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Handlers and listeners must have a non-empty name.
    #[error("message name must not be empty")]
    EmptyName,

    /// The name collides with a wire discriminator.
    #[error("message name {0:?} is reserved")]
    ReservedName(String),

    /// The request timed out, or was dropped at teardown. The peer may
    /// still have acted on it.
    #[error("no response received")]
    NoResponse,
}
