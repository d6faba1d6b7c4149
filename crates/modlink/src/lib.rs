//! # Modlink
//!
//! Request/response messaging for browser game mods, carried over the
//! host's own chat and beep channels.
//!
//! Mods loaded into the same page cannot open sockets to each other's
//! players. What they can do is hide data in chat messages and private
//! beeps. Modlink turns that into a small RPC layer: tagged envelopes,
//! correlation ids, a 6000 ms timeout, and handlers that answer on the
//! channel a request came in on.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use modlink::prelude::*;
//!
//! let env = HostEnv::new(my_host);
//! let core = env.register_core(ModData::new("mymod", "My Mod", "MYMOD", "1.0.0"))?;
//!
//! core.messenger().on_request("ping", |_, _| Some(json!({ "pong": true })))?;
//!
//! let outcome = core
//!     .messenger()
//!     .send_request("ping", json!({}), PeerId(42), Channel::Broadcast)
//!     .await;
//! ```

mod action;
mod config;
mod env;
mod error;
mod logging;
mod messenger;
pub mod popups;
pub mod util;

pub use action::{ACTION_CONTENT, ACTION_TAG, action_message, local_line, substitute_pronouns};
pub use config::{DEFAULT_MESSAGE_BACKGROUND, DEFAULT_MESSAGE_COLOR, MessengerConfig, ModData};
pub use env::{Core, HostEnv};
pub use error::ModlinkError;
pub use logging::init_tracing;
pub use messenger::Messenger;

pub use modlink_poll as poll;
pub use modlink_protocol as protocol;
pub use modlink_rpc as rpc;
pub use modlink_session as session;
pub use modlink_transport as transport;

/// The types most mods need.
pub mod prelude {
    pub use crate::popups::{DialogOutcome, DialogSpec, ToastSpec};
    pub use crate::{Core, HostEnv, Messenger, MessengerConfig, ModData, ModlinkError};
    pub use modlink_poll::{PollConfig, Poller, StartDelay, wait_for_start};
    pub use modlink_protocol::Channel;
    pub use modlink_rpc::{PayloadValidator, RequestContext, RequestOutcome};
    pub use modlink_session::{Peer, Pronouns};
    pub use modlink_transport::{HostCharacter, HostTransport, PeerId};
    pub use serde_json::{Value, json};
}
