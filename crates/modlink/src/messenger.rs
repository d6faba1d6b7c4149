//! The messaging API a mod talks to.
//!
//! A [`Messenger`] owns one mod's pending requests, request handlers and
//! packet listeners, and installs exactly two observers on the page's hook
//! chains: one for chat, one for beeps. Every inbound event goes through:
//!
//! ```text
//! host event ──→ decode ──→ self? ──→ kind
//!                  │          │         ├─ requestResponse → PendingRequests::resolve
//!                  │          │         ├─ request         → resolve sender → Responder → reply
//!                  ▼          ▼         └─ packet          → resolve sender → PacketListeners
//!               not ours    ignored
//! ```
//!
//! Whatever happens, the observer forwards the event to the next one, so
//! other mods and the host still see it.

use std::sync::{Arc, Mutex, PoisonError};

use modlink_protocol::{Channel, Decoded, Envelope, ProtocolError, RequestData, WireCodec};
use modlink_rpc::{
    DispatchOutcome, PacketListeners, PayloadValidator, PendingRequests, Registration,
    RequestContext, RequestOutcome, Responder,
};
use modlink_session::{IdentityResolver, PeerKey, Pronouns};
use modlink_transport::{
    AccountBeep, ChatKind, ChatRoomMessage, HookHandle, HookPriority, HostTransport, LEASH_BEEP,
    ModApi, OutgoingBeep, OutgoingChat, PeerId,
};
use serde_json::Value;
use tracing::{debug, info, trace, warn};

use crate::action::{action_message, local_line, substitute_pronouns};
use crate::{MessengerConfig, ModData, ModlinkError};

struct Inner<H: HostTransport> {
    api: ModApi,
    host: Arc<H>,
    mod_data: Arc<ModData>,
    codec: WireCodec,
    config: MessengerConfig,
    pending: PendingRequests,
    responder: Responder,
    packets: PacketListeners,
    hooks: Mutex<Vec<HookHandle>>,
}

/// One mod's messaging endpoint. Cheap to clone.
pub struct Messenger<H: HostTransport> {
    inner: Arc<Inner<H>>,
}

impl<H: HostTransport> Clone for Messenger<H> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<H: HostTransport> Messenger<H> {
    /// Creates the messenger and hooks it into the page's event chains.
    pub fn new(
        api: ModApi,
        host: Arc<H>,
        mod_data: Arc<ModData>,
        config: MessengerConfig,
    ) -> Self {
        let inner = Arc::new(Inner {
            codec: WireCodec::new(mod_data.key.clone()),
            config: config.validated(),
            api,
            host,
            mod_data,
            pending: PendingRequests::new(),
            responder: Responder::new(),
            packets: PacketListeners::new(),
            hooks: Mutex::new(Vec::new()),
        });

        // The chains hold the observers for as long as the SDK lives, so
        // they only keep a weak reference back.
        let weak = Arc::downgrade(&inner);
        let chat = inner.api.hook_chat(HookPriority::AddBehavior, move |message, next| {
            if let Some(inner) = weak.upgrade() {
                inner.on_chat(message);
            }
            next.call(message);
        });
        let weak = Arc::downgrade(&inner);
        let beep = inner.api.hook_beep(HookPriority::AddBehavior, move |beep, next| {
            if let Some(inner) = weak.upgrade() {
                inner.on_beep(beep);
            }
            next.call(beep);
        });
        inner
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend([chat, beep]);

        debug!(name = %inner.mod_data.name, key = %inner.mod_data.key, "messenger ready");
        Self { inner }
    }

    pub fn mod_data(&self) -> &ModData {
        &self.inner.mod_data
    }

    pub fn host(&self) -> &Arc<H> {
        &self.inner.host
    }

    /// Requests still waiting for a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    // -----------------------------------------------------------------------
    // Requests
    // -----------------------------------------------------------------------

    /// Sends a request to `target` and waits for its response.
    ///
    /// Resolves to `is_error: true` when no response arrives within the
    /// configured timeout (6000 ms by default), or when the host refuses
    /// the message outright. The error outcome means "unknown": the peer
    /// may still have acted.
    pub async fn send_request(
        &self,
        name: &str,
        payload: Value,
        target: PeerId,
        channel: Channel,
    ) -> RequestOutcome {
        let inner = &self.inner;
        let ticket = inner.pending.begin(name, channel, target);
        let envelope = Envelope::Request(RequestData {
            request_id: ticket.id().clone(),
            message: name.to_string(),
            data: payload,
        });

        if let Err(e) = inner.send_envelope(&envelope, channel, Some(target)) {
            warn!(name, %target, %channel, error = %e, "request not sent");
            inner.pending.cancel(ticket);
            return RequestOutcome::timed_out();
        }
        inner.pending.wait(ticket, inner.config.rpc.request_timeout).await
    }

    /// Answers requests named `name`. Replaces any earlier handler.
    ///
    /// The handler's `Some(value)` is sent back on the channel the request
    /// came in on; `None` sends nothing.
    pub fn on_request<F>(&self, name: &str, handler: F) -> Result<(), ModlinkError>
    where
        F: Fn(Value, &RequestContext) -> Option<Value> + Send + Sync + 'static,
    {
        self.inner.responder.register(name, Registration::new(handler))?;
        Ok(())
    }

    /// Like [`on_request`](Self::on_request), but requests whose payload
    /// fails `schema` are dropped without running the handler.
    pub fn on_request_validated<F>(
        &self,
        name: &str,
        schema: PayloadValidator,
        handler: F,
    ) -> Result<(), ModlinkError>
    where
        F: Fn(Value, &RequestContext) -> Option<Value> + Send + Sync + 'static,
    {
        self.inner
            .responder
            .register(name, Registration::with_schema(schema, handler))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Packets
    // -----------------------------------------------------------------------

    /// Sends a one-way packet over the room chat. `target` makes it unicast.
    pub fn send_packet(
        &self,
        name: &str,
        payload: Option<Value>,
        target: Option<PeerId>,
    ) -> Result<(), ModlinkError> {
        let envelope = Envelope::Packet {
            name: name.to_string(),
            data: payload,
        };
        self.inner.send_envelope(&envelope, Channel::Broadcast, target)
    }

    /// Adds a listener for packets named `name`. Listeners accumulate.
    pub fn on_packet<F>(&self, name: &str, listener: F) -> Result<(), ModlinkError>
    where
        F: Fn(&Value, &RequestContext) + Send + Sync + 'static,
    {
        self.inner
            .packets
            .add(name, PayloadValidator::AlwaysValid, listener)?;
        Ok(())
    }

    /// Adds a listener that only sees payloads accepted by `schema`.
    pub fn on_packet_validated<F>(
        &self,
        name: &str,
        schema: PayloadValidator,
        listener: F,
    ) -> Result<(), ModlinkError>
    where
        F: Fn(&Value, &RequestContext) + Send + Sync + 'static,
    {
        self.inner.packets.add(name, schema, listener)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Plain messages
    // -----------------------------------------------------------------------

    /// Sends `payload` as a private beep, with no correlation.
    pub fn send_beep(&self, payload: &Value, target: PeerId) -> Result<(), ModlinkError> {
        let message = serde_json::to_string(payload).map_err(ProtocolError::Encode)?;
        self.inner.host.send_beep(OutgoingBeep {
            is_secret: true,
            beep_type: LEASH_BEEP.to_string(),
            member_number: target,
            message,
        })?;
        Ok(())
    }

    /// Says `text` in the room.
    pub fn send_chat(&self, text: &str) -> Result<(), ModlinkError> {
        self.inner.host.send_chat(OutgoingChat {
            content: text.to_string(),
            kind: ChatKind::Chat,
            dictionary: None,
            target: None,
        })?;
        Ok(())
    }

    /// Appends a styled line to the local player's own log.
    /// Does nothing outside a chat room.
    pub fn send_local(&self, html: &str) -> Result<(), ModlinkError> {
        let host = &self.inner.host;
        if !host.in_chat_room() {
            trace!("not in a chat room, local line skipped");
            return Ok(());
        }
        host.append_local(local_line(html, host.self_id(), &self.inner.mod_data))?;
        Ok(())
    }

    /// Sends an action line, with pronoun tokens replaced using the local
    /// player's pronouns. Does nothing for empty text or outside a room.
    pub fn send_action(
        &self,
        template: &str,
        target: Option<PeerId>,
        extra: Vec<Value>,
    ) -> Result<(), ModlinkError> {
        let host = &self.inner.host;
        if template.is_empty() || !host.in_chat_room() {
            trace!("action skipped");
            return Ok(());
        }

        let pronouns =
            IdentityResolver::resolve(&host.current_peers(), &PeerKey::Id(host.self_id()))
                .map_or(Pronouns::default(), |me| me.pronouns);
        let text = substitute_pronouns(template, pronouns);
        host.send_chat(action_message(&text, target, extra))?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Removes both observers and fails every pending request.
    pub fn shutdown(&self) {
        let removed = self.inner.unhook_all();
        self.inner.pending.clear();
        info!(name = %self.inner.mod_data.name, removed, "messenger shut down");
    }
}

impl<H: HostTransport> Inner<H> {
    fn on_chat(&self, message: &ChatRoomMessage) {
        match self.codec.decode_chat(message) {
            Ok(decoded) => self.handle(decoded),
            Err(e) if e.is_not_ours() => {}
            Err(e) => debug!(sender = %message.sender, error = %e, "malformed envelope ignored"),
        }
    }

    fn on_beep(&self, beep: &AccountBeep) {
        match self.codec.decode_beep(beep) {
            Ok(decoded) => self.handle(decoded),
            Err(e) if e.is_not_ours() => {}
            Err(e) => debug!(sender = %beep.member_number, error = %e, "malformed beep ignored"),
        }
    }

    fn handle(&self, decoded: Decoded) {
        let Decoded {
            channel,
            sender,
            sender_name,
            envelope,
        } = decoded;

        if sender == self.host.self_id() {
            trace!(kind = envelope.kind(), "own message ignored");
            return;
        }

        match envelope {
            Envelope::RequestResponse(data) => {
                self.pending.resolve(&data.request_id, data.data);
            }
            Envelope::Request(data) => {
                let Some(ctx) = self.context(channel, sender, sender_name) else {
                    return;
                };
                match self.responder.dispatch(&data, &ctx) {
                    DispatchOutcome::Respond(payload) => {
                        let response = Envelope::RequestResponse(RequestData {
                            request_id: data.request_id,
                            message: data.message,
                            data: payload,
                        });
                        if let Err(e) = self.send_envelope(&response, channel, Some(sender)) {
                            warn!(to = %sender, %channel, error = %e, "response not sent");
                        }
                    }
                    outcome => trace!(name = %data.message, ?outcome, "no response sent"),
                }
            }
            Envelope::Packet { name, data } => {
                let Some(ctx) = self.context(channel, sender, sender_name) else {
                    return;
                };
                let ran = self.packets.notify(&name, &data.unwrap_or(Value::Null), &ctx);
                trace!(%name, ran, "packet delivered");
            }
        }
    }

    fn context(
        &self,
        channel: Channel,
        sender: PeerId,
        sender_name: Option<String>,
    ) -> Option<RequestContext> {
        let peers = self.host.current_peers();
        // Only beeps reach us from outside the room.
        let beep_name = match channel {
            Channel::Private => sender_name.as_deref(),
            Channel::Broadcast => None,
        };
        let peer = IdentityResolver::resolve_sender(&peers, sender, beep_name)?;
        Some(RequestContext {
            sender: peer,
            sender_name,
            channel,
        })
    }

    fn send_envelope(
        &self,
        envelope: &Envelope,
        channel: Channel,
        target: Option<PeerId>,
    ) -> Result<(), ModlinkError> {
        match channel {
            Channel::Broadcast => {
                let chat = self.codec.encode_chat(envelope, target)?;
                self.host.send_chat(chat)?;
            }
            Channel::Private => {
                let target = target.ok_or_else(|| {
                    ProtocolError::InvalidMessage("private messages need a target".into())
                })?;
                let beep = self.codec.encode_beep(envelope, target)?;
                self.host.send_beep(beep)?;
            }
        }
        Ok(())
    }

    fn unhook_all(&self) -> usize {
        let handles: Vec<HookHandle> = self
            .hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain(..)
            .collect();
        handles.into_iter().filter(|h| self.api.unhook(*h)).count()
    }
}

impl<H: HostTransport> Drop for Inner<H> {
    fn drop(&mut self) {
        self.unhook_all();
    }
}
