//! Host surface for modlink.
//!
//! Modlink rides on two channels the host game owns: the in-room chat
//! stream and private account beeps. This crate describes them:
//!
//! - **Host records** ([`OutgoingChat`], [`ChatRoomMessage`], [`OutgoingBeep`],
//!   [`AccountBeep`], [`HostCharacter`]) in the host's own field layout.
//! - **[`HostTransport`]**: the outbound primitives plus the few queries
//!   (who is here, who am I) the rest of modlink needs.
//! - **Hook chains** ([`HookChain`], [`HookPriority`], [`Next`]): how several
//!   mods observe every inbound event without stepping on each other.
//! - **[`ModSdk`]**: the page-wide registry that owns those chains.
//!
//! # Feature Flags
//!
//! - `loopback` (default): [`LoopbackRoom`], an in-process host for tests
//!   and demos

mod error;
mod hooks;
mod host;
#[cfg(feature = "loopback")]
mod loopback;
mod sdk;

pub use error::TransportError;
pub use hooks::{HookChain, HookHandle, HookPriority, HostEvent, Next, Observer};
pub use host::{
    AccountBeep, ChatKind, ChatRoomMessage, HostCharacter, HostTransport, LEASH_BEEP, LocalLine,
    OutgoingBeep, OutgoingChat, PeerId,
};
#[cfg(feature = "loopback")]
pub use loopback::{InboundEvent, LoopbackHost, LoopbackRoom, spawn_delivery};
pub use sdk::{ModApi, ModInfo, ModSdk};
