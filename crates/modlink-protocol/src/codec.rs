//! Translating envelopes to and from the host's chat and beep records.
//!
//! The two channels carry very different shapes, so each gets its own
//! encoding:
//!
//! **Broadcast** (hidden chat). The host gives us a `Content` string and a
//! free-form `Dictionary`. `Content` holds the mod key, which tells our
//! traffic apart from everything else in the room:
//!
//! ```text
//! { Content: "<key>", Type: "Hidden", Target?: 42,
//!   Dictionary: { msg: "request", data: { requestId, message, data } } }
//! ```
//!
//! **Private** (beep). Only one string field is free, so the key moves into
//! the discriminator as a prefix and the whole body is JSON in `Message`:
//!
//! ```text
//! { BeepType: "Leash", IsSecret: true, MemberNumber: 42,
//!   Message: "{\"type\":\"<key>_request\",\"requestId\":...,\"message\":...,\"data\":...}" }
//! ```
//!
//! Beep packets share the `<key>_` prefix space with requests and
//! responses, so a packet name may not end in `_request` or
//! `_requestResponse`: `"ZC_X_request"` is a request for the mod keyed
//! `ZC_X`, never a packet named `X_request` for the mod keyed `ZC`.
//!
//! Decoding is best effort and never panics. Anything that does not parse
//! comes back as an `Err`, and the caller lets the host event continue on
//! its way.

use modlink_transport::{
    AccountBeep, ChatKind, ChatRoomMessage, LEASH_BEEP, OutgoingBeep, OutgoingChat, PeerId,
};
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::types::{REQUEST_KIND, RESPONSE_KIND};
use crate::{Channel, CorrelationId, Decoded, Envelope, ProtocolError, RequestData};

/// Encodes and decodes envelopes for one mod key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireCodec {
    key: String,
}

impl WireCodec {
    /// Creates a codec that tags traffic with `key`.
    pub fn new(key: impl Into<String>) -> Self {
        Self { key: key.into() }
    }

    /// The mod key used as the broadcast tag and beep prefix.
    pub fn key(&self) -> &str {
        &self.key
    }

    // -----------------------------------------------------------------------
    // Broadcast channel
    // -----------------------------------------------------------------------

    /// Builds a hidden chat message. `target` is set only for unicast.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidMessage`] for packets with an empty or
    /// reserved name.
    pub fn encode_chat(
        &self,
        envelope: &Envelope,
        target: Option<PeerId>,
    ) -> Result<OutgoingChat, ProtocolError> {
        check_packet_name(envelope)?;

        let mut dictionary = Map::new();
        dictionary.insert("msg".into(), Value::String(envelope.kind().to_string()));
        match envelope {
            Envelope::Request(data) | Envelope::RequestResponse(data) => {
                let nested = serde_json::to_value(data).map_err(ProtocolError::Encode)?;
                dictionary.insert("data".into(), nested);
            }
            Envelope::Packet { data: Some(data), .. } => {
                dictionary.insert("data".into(), data.clone());
            }
            Envelope::Packet { data: None, .. } => {}
        }

        Ok(OutgoingChat {
            content: self.key.clone(),
            kind: ChatKind::Hidden,
            dictionary: Some(Value::Object(dictionary)),
            target,
        })
    }

    /// Recovers an envelope from a delivered chat message.
    pub fn decode_chat(&self, message: &ChatRoomMessage) -> Result<Decoded, ProtocolError> {
        if message.content != self.key {
            return Err(ProtocolError::NotOurs);
        }
        let dictionary = message
            .dictionary
            .as_ref()
            .and_then(Value::as_object)
            .ok_or(ProtocolError::NotOurs)?;
        let kind = dictionary
            .get("msg")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::NotOurs)?;

        let envelope = match kind {
            REQUEST_KIND | RESPONSE_KIND => {
                let data = request_data(dictionary.get("data")).inspect_err(|e| {
                    debug!(sender = %message.sender, kind, error = %e, "bad chat request body");
                })?;
                if kind == REQUEST_KIND {
                    Envelope::Request(data)
                } else {
                    Envelope::RequestResponse(data)
                }
            }
            "" => return Err(ProtocolError::NotOurs),
            name => Envelope::Packet {
                name: name.to_string(),
                data: dictionary.get("data").cloned(),
            },
        };

        Ok(Decoded {
            channel: Channel::Broadcast,
            sender: message.sender,
            sender_name: None,
            envelope,
        })
    }

    // -----------------------------------------------------------------------
    // Private channel
    // -----------------------------------------------------------------------

    /// Builds a private beep to `target`.
    ///
    /// # Errors
    /// - [`ProtocolError::InvalidMessage`] for empty or reserved packet names.
    /// - [`ProtocolError::Encode`] if the body cannot be serialized.
    pub fn encode_beep(
        &self,
        envelope: &Envelope,
        target: PeerId,
    ) -> Result<OutgoingBeep, ProtocolError> {
        check_packet_name(envelope)?;
        if let Envelope::Packet { name, .. } = envelope {
            if has_reserved_suffix(name) {
                return Err(ProtocolError::InvalidMessage(format!(
                    "beep packet name {name:?} ends in a reserved kind"
                )));
            }
        }

        let mut body = Map::new();
        body.insert(
            "type".into(),
            Value::String(self.beep_tag(envelope.kind())),
        );
        match envelope {
            Envelope::Request(data) | Envelope::RequestResponse(data) => {
                body.insert("requestId".into(), Value::String(data.request_id.to_string()));
                body.insert("message".into(), Value::String(data.message.clone()));
                body.insert("data".into(), data.data.clone());
            }
            Envelope::Packet { data: Some(data), .. } => {
                body.insert("data".into(), data.clone());
            }
            Envelope::Packet { data: None, .. } => {}
        }

        let message = serde_json::to_string(&Value::Object(body)).map_err(ProtocolError::Encode)?;
        Ok(OutgoingBeep {
            is_secret: true,
            beep_type: LEASH_BEEP.to_string(),
            member_number: target,
            message,
        })
    }

    /// `"<key>_<kind>"`, the beep discriminator.
    fn beep_tag(&self, kind: &str) -> String {
        format!("{}_{kind}", self.key)
    }

    /// Recovers an envelope from a delivered beep.
    pub fn decode_beep(&self, beep: &AccountBeep) -> Result<Decoded, ProtocolError> {
        if beep.beep_type != LEASH_BEEP {
            return Err(ProtocolError::NotOurs);
        }
        let raw = beep.message.as_deref().ok_or(ProtocolError::NotOurs)?;
        let body: Value = serde_json::from_str(raw).map_err(ProtocolError::Decode)?;
        let body = body.as_object().ok_or(ProtocolError::NotOurs)?;

        let tag = body
            .get("type")
            .and_then(Value::as_str)
            .ok_or(ProtocolError::NotOurs)?;

        let exact = if tag == self.beep_tag(REQUEST_KIND) {
            Some(REQUEST_KIND)
        } else if tag == self.beep_tag(RESPONSE_KIND) {
            Some(RESPONSE_KIND)
        } else {
            None
        };

        let envelope = if let Some(kind) = exact {
            let data = request_fields(body).inspect_err(|e| {
                debug!(sender = %beep.member_number, tag, error = %e, "bad beep request body");
            })?;
            if kind == REQUEST_KIND {
                Envelope::Request(data)
            } else {
                Envelope::RequestResponse(data)
            }
        } else {
            let name = tag
                .strip_prefix(self.beep_tag("").as_str())
                .filter(|name| !name.is_empty())
                .ok_or(ProtocolError::NotOurs)?;
            if has_reserved_suffix(name) {
                trace!(tag, key = %self.key, "beep belongs to a longer key");
                return Err(ProtocolError::NotOurs);
            }
            Envelope::Packet {
                name: name.to_string(),
                data: body.get("data").cloned(),
            }
        };

        Ok(Decoded {
            channel: Channel::Private,
            sender: beep.member_number,
            sender_name: (!beep.member_name.is_empty()).then(|| beep.member_name.clone()),
            envelope,
        })
    }
}

/// Whether a beep packet name would read as another key's request or
/// response.
fn has_reserved_suffix(name: &str) -> bool {
    [REQUEST_KIND, RESPONSE_KIND].iter().any(|kind| {
        name.strip_suffix(kind)
            .is_some_and(|rest| rest.ends_with('_'))
    })
}

/// Rejects packets that would be mistaken for requests or responses.
fn check_packet_name(envelope: &Envelope) -> Result<(), ProtocolError> {
    if let Envelope::Packet { name, .. } = envelope {
        if name.is_empty() {
            return Err(ProtocolError::InvalidMessage("packet name is empty".into()));
        }
        if name == REQUEST_KIND || name == RESPONSE_KIND {
            return Err(ProtocolError::InvalidMessage(format!(
                "packet name {name:?} is reserved"
            )));
        }
    }
    Ok(())
}

/// Reads the nested `data` object of a broadcast request or response.
fn request_data(nested: Option<&Value>) -> Result<RequestData, ProtocolError> {
    let fields = nested
        .and_then(Value::as_object)
        .ok_or_else(|| ProtocolError::InvalidMessage("request body must be an object".into()))?;
    request_fields(fields)
}

/// Checks field types by hand so a wrong type is reported precisely
/// instead of as a generic deserialization failure.
fn request_fields(fields: &Map<String, Value>) -> Result<RequestData, ProtocolError> {
    let request_id = fields
        .get("requestId")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::InvalidMessage("requestId must be a string".into()))?;
    let message = fields
        .get("message")
        .and_then(Value::as_str)
        .ok_or_else(|| ProtocolError::InvalidMessage("message must be a string".into()))?;

    Ok(RequestData {
        request_id: CorrelationId::new(request_id),
        message: message.to_string(),
        data: fields.get("data").cloned().unwrap_or(Value::Null),
    })
}
