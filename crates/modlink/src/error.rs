//! Unified error type for modlink.

use modlink_protocol::ProtocolError;
use modlink_rpc::RpcError;
use modlink_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// The `#[from]` conversions let `?` lift a sub-crate error into this one.
/// Inbound traffic never produces these; they only come back from calls
/// the mod makes itself.
#[derive(Debug, thiserror::Error)]
pub enum ModlinkError {
    /// The host refused a send, or the mod is not registered.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// An envelope could not be encoded, e.g. a reserved packet name.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A registration was rejected.
    #[error(transparent)]
    Rpc(#[from] RpcError),

    /// Mod data failed validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}
