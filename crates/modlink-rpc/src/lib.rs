//! Request/response bookkeeping for modlink.
//!
//! Two halves, one per side of a request:
//!
//! - **Caller side**: [`PendingRequests`] tracks outstanding requests by
//!   correlation id and delivers exactly one [`RequestOutcome`] per request,
//!   either the response payload or a timeout.
//! - **Responder side**: [`Responder`] maps logical message names to
//!   handlers, validates payloads ([`PayloadValidator`]) and decides what
//!   to send back ([`DispatchOutcome`]). [`PacketListeners`] does the same
//!   for one-way packets, without answers.
//!
//! Nothing here touches the host. The `modlink` crate wires these pieces
//! to the codec and the transport.

mod config;
mod dispatch;
mod error;
mod packets;
mod pending;
mod validate;

pub use config::{REQUEST_TIMEOUT, RpcConfig};
pub use dispatch::{DispatchOutcome, Registration, RequestContext, RequestHandler, Responder};
pub use error::RpcError;
pub use packets::{PacketListener, PacketListeners};
pub use pending::{PendingRequests, PendingTicket, RequestOutcome};
pub use validate::{PayloadSchema, PayloadValidator, SchemaFn, TypedSchema};
