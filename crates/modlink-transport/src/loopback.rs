//! In-process stand-in for the host game, used by tests and the demo.
//!
//! A [`LoopbackRoom`] plays the role of the game server: every joined
//! character gets a [`LoopbackHost`] (its outbound side) and a queue of
//! [`InboundEvent`]s (its inbound side). [`spawn_delivery`] drains that queue
//! into a page's [`ModSdk`] on the tokio runtime, one event at a time, so
//! the order a channel was written in is the order observers see.
//!
//! Delivery rules mirror the real host:
//! - chat without `Target` reaches every member, the sender included;
//! - chat with `Target` reaches the target and the sender;
//! - a beep reaches its target only, stamped with the sender's number and name.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::{
    AccountBeep, ChatRoomMessage, HostCharacter, HostTransport, LocalLine, ModSdk, OutgoingBeep,
    OutgoingChat, PeerId, TransportError,
};

/// Something the host delivers to one member.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Chat(ChatRoomMessage),
    Beep(AccountBeep),
}

struct Member {
    character: HostCharacter,
    tx: mpsc::UnboundedSender<InboundEvent>,
}

/// A simulated chat room plus the beep relay. Cheap to clone.
#[derive(Clone, Default)]
pub struct LoopbackRoom {
    members: Arc<Mutex<Vec<Member>>>,
}

impl LoopbackRoom {
    /// Creates an empty room.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a character and returns its host handle and inbound queue.
    ///
    /// Joining again with the same member number replaces the old entry.
    pub fn join(
        &self,
        character: HostCharacter,
    ) -> (LoopbackHost, mpsc::UnboundedReceiver<InboundEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut members = self.lock();
        members.retain(|m| m.character.id != character.id);
        members.push(Member {
            character: character.clone(),
            tx,
        });
        drop(members);

        tracing::debug!(peer = %character.id, name = %character.name, "joined loopback room");
        let host = LoopbackHost {
            character,
            room: self.clone(),
            sent_chat: Mutex::new(Vec::new()),
            sent_beeps: Mutex::new(Vec::new()),
            local: Mutex::new(Vec::new()),
        };
        (host, rx)
    }

    /// Removes a member. Returns `false` if it was not present.
    pub fn leave(&self, id: PeerId) -> bool {
        let mut members = self.lock();
        let before = members.len();
        members.retain(|m| m.character.id != id);
        members.len() != before
    }

    /// Everyone currently in the room.
    pub fn members(&self) -> Vec<HostCharacter> {
        self.lock().iter().map(|m| m.character.clone()).collect()
    }

    /// Delivers a raw chat event to one member, bypassing any sender.
    /// Lets tests feed malformed or foreign traffic.
    pub fn inject_chat(&self, to: PeerId, message: ChatRoomMessage) -> bool {
        self.deliver(to, InboundEvent::Chat(message))
    }

    /// Delivers a raw beep to one member.
    pub fn inject_beep(&self, to: PeerId, beep: AccountBeep) -> bool {
        self.deliver(to, InboundEvent::Beep(beep))
    }

    fn contains(&self, id: PeerId) -> bool {
        self.lock().iter().any(|m| m.character.id == id)
    }

    fn deliver(&self, to: PeerId, event: InboundEvent) -> bool {
        let members = self.lock();
        match members.iter().find(|m| m.character.id == to) {
            Some(member) => member.tx.send(event).is_ok(),
            None => false,
        }
    }

    fn relay_chat(&self, from: PeerId, message: OutgoingChat) {
        let inbound = ChatRoomMessage {
            sender: from,
            content: message.content,
            kind: message.kind,
            dictionary: message.dictionary,
            target: message.target,
        };

        let members = self.lock();
        for member in members.iter() {
            let id = member.character.id;
            let wanted = match inbound.target {
                Some(target) => id == target || id == from,
                None => true,
            };
            // A closed queue means that page is gone; nothing to do.
            if wanted && member.tx.send(InboundEvent::Chat(inbound.clone())).is_err() {
                tracing::trace!(peer = %id, "dropping chat for closed queue");
            }
        }
    }

    fn relay_beep(&self, from: &HostCharacter, beep: OutgoingBeep) {
        let to = beep.member_number;
        let inbound = AccountBeep {
            member_number: from.id,
            member_name: from.name.clone(),
            beep_type: beep.beep_type,
            message: Some(beep.message),
        };
        if !self.deliver(to, InboundEvent::Beep(inbound)) {
            tracing::debug!(from = %from.id, %to, "beep target unreachable, dropped");
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Member>> {
        self.members.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One member's outbound side. Records everything it sends.
pub struct LoopbackHost {
    character: HostCharacter,
    room: LoopbackRoom,
    sent_chat: Mutex<Vec<OutgoingChat>>,
    sent_beeps: Mutex<Vec<OutgoingBeep>>,
    local: Mutex<Vec<LocalLine>>,
}

impl LoopbackHost {
    /// The character this host plays.
    pub fn character(&self) -> &HostCharacter {
        &self.character
    }

    /// Every chat message this host has sent.
    pub fn sent_chat(&self) -> Vec<OutgoingChat> {
        self.sent_chat.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Every beep this host has sent.
    pub fn sent_beeps(&self) -> Vec<OutgoingBeep> {
        self.sent_beeps.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Every local line appended so far.
    pub fn local_lines(&self) -> Vec<LocalLine> {
        self.local.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl HostTransport for LoopbackHost {
    fn send_chat(&self, message: OutgoingChat) -> Result<(), TransportError> {
        if !self.in_chat_room() {
            return Err(TransportError::SendFailed("not in a chat room".into()));
        }
        self.sent_chat
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());
        self.room.relay_chat(self.character.id, message);
        Ok(())
    }

    fn send_beep(&self, beep: OutgoingBeep) -> Result<(), TransportError> {
        self.sent_beeps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(beep.clone());
        self.room.relay_beep(&self.character, beep);
        Ok(())
    }

    fn append_local(&self, line: LocalLine) -> Result<(), TransportError> {
        self.local.lock().unwrap_or_else(PoisonError::into_inner).push(line);
        Ok(())
    }

    fn current_peers(&self) -> Vec<HostCharacter> {
        if self.in_chat_room() {
            self.room.members()
        } else {
            Vec::new()
        }
    }

    fn self_id(&self) -> PeerId {
        self.character.id
    }

    fn in_chat_room(&self) -> bool {
        self.room.contains(self.character.id)
    }
}

/// Drains a member's inbound queue into its page's hook chains.
///
/// Runs until the room drops the queue's sender (the member left and the
/// room was dropped) or the task is aborted.
pub fn spawn_delivery(
    mut rx: mpsc::UnboundedReceiver<InboundEvent>,
    sdk: ModSdk,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                InboundEvent::Chat(message) => sdk.dispatch_chat(&message, |m| {
                    tracing::trace!(sender = %m.sender, "chat reached host handler");
                }),
                InboundEvent::Beep(beep) => sdk.dispatch_beep(&beep, |b| {
                    tracing::trace!(sender = %b.member_number, "beep reached host handler");
                }),
            }
        }
    })
}
