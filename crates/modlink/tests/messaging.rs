//! End-to-end messaging tests over the loopback host.
//!
//! Every test runs on paused time: deliveries between pages happen on
//! spawned tasks without touching the clock, so a full request round trip
//! completes at virtual time zero, and the 6000 ms timeout only elapses
//! when nothing else is left to run.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use modlink::prelude::*;
use modlink::transport::{
    AccountBeep, ChatKind, ChatRoomMessage, LEASH_BEEP, LoopbackHost, LoopbackRoom, spawn_delivery,
};
use modlink::{ACTION_TAG, ModlinkError};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;

// =========================================================================
// Helpers
// =========================================================================

const KEY: &str = "ZC";

struct Page {
    env: HostEnv<LoopbackHost>,
    core: Core<LoopbackHost>,
    delivery: JoinHandle<()>,
}

impl Page {
    fn join(room: &LoopbackRoom, id: u64, name: &str, pronouns: &str) -> Self {
        let (host, rx) = room.join(HostCharacter::new(id, name, pronouns));
        let env = HostEnv::new(host);
        let delivery = spawn_delivery(rx, env.sdk().clone());
        let core = env
            .register_core(ModData::new("zc", "Zois Core", KEY, "1.0.0"))
            .unwrap();
        Self {
            env,
            core,
            delivery,
        }
    }

    fn messenger(&self) -> &Messenger<LoopbackHost> {
        self.core.messenger()
    }

    fn host(&self) -> &LoopbackHost {
        self.env.host()
    }

    /// Correlation ids of every request this page has broadcast.
    fn sent_request_ids(&self) -> Vec<String> {
        self.host()
            .sent_chat()
            .iter()
            .filter_map(|c| c.dictionary.as_ref())
            .filter(|d| d["msg"] == "request")
            .filter_map(|d| d["data"]["requestId"].as_str().map(str::to_string))
            .collect()
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        self.delivery.abort();
    }
}

fn hidden(sender: u64, dictionary: Value) -> ChatRoomMessage {
    ChatRoomMessage {
        sender: PeerId(sender),
        content: KEY.into(),
        kind: ChatKind::Hidden,
        dictionary: Some(dictionary),
        target: None,
    }
}

/// Lets every queued delivery run.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// =========================================================================
// Round trips
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_broadcast_request_round_trip() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    let bob = Page::join(&room, 42, "Bob", "He/Him");

    bob.messenger()
        .on_request("ping", |_, _| Some(json!({ "pong": true })))
        .unwrap();

    let start = Instant::now();
    let outcome = ann
        .messenger()
        .send_request("ping", json!({}), PeerId(42), Channel::Broadcast)
        .await;

    assert_eq!(outcome.payload, Some(json!({ "pong": true })));
    assert!(!outcome.is_error);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(ann.messenger().pending_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_private_request_round_trip() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    let bob = Page::join(&room, 2, "Bob", "He/Him");

    bob.messenger()
        .on_request("whoami", |_, ctx| {
            Some(json!({ "you": ctx.sender.name, "via": ctx.channel.to_string() }))
        })
        .unwrap();

    let outcome = ann
        .messenger()
        .send_request("whoami", json!(null), PeerId(2), Channel::Private)
        .await;

    assert_eq!(outcome.payload, Some(json!({ "you": "Ann", "via": "private" })));
    // Both legs went over beeps, none over chat.
    assert!(ann.host().sent_chat().is_empty());
    assert_eq!(bob.host().sent_beeps().len(), 1);
    assert!(bob.host().sent_beeps()[0].is_secret);
}

#[tokio::test(start_paused = true)]
async fn test_handler_receives_payload() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    let bob = Page::join(&room, 2, "Bob", "He/Him");

    bob.messenger()
        .on_request("add", |p, _| {
            let sum = p["a"].as_i64()? + p["b"].as_i64()?;
            Some(json!(sum))
        })
        .unwrap();

    let outcome = ann
        .messenger()
        .send_request("add", json!({ "a": 2, "b": 3 }), PeerId(2), Channel::Broadcast)
        .await;
    assert_eq!(outcome.into_result().unwrap(), json!(5));
}

// =========================================================================
// Timeouts
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_request_without_handler_times_out() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    let _bob = Page::join(&room, 2, "Bob", "He/Him");

    let start = Instant::now();
    let outcome = ann
        .messenger()
        .send_request("nobody-home", json!({}), PeerId(2), Channel::Broadcast)
        .await;

    assert_eq!(outcome, RequestOutcome::timed_out());
    assert_eq!(start.elapsed(), Duration::from_millis(6000));
}

#[tokio::test(start_paused = true)]
async fn test_handler_returning_none_leads_to_timeout() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    let bob = Page::join(&room, 2, "Bob", "He/Him");

    let calls = Arc::new(AtomicUsize::new(0));
    {
        let calls = Arc::clone(&calls);
        bob.messenger()
            .on_request("notify", move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                None
            })
            .unwrap();
    }

    let outcome = ann
        .messenger()
        .send_request("notify", json!({}), PeerId(2), Channel::Broadcast)
        .await;

    assert!(outcome.is_error);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(bob.host().sent_chat().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_custom_timeout_from_config() {
    let room = LoopbackRoom::new();
    let (host, rx) = room.join(HostCharacter::new(1, "Ann", "She/Her"));
    let env = HostEnv::new(host);
    let _delivery = spawn_delivery(rx, env.sdk().clone());

    let mut config = MessengerConfig::default();
    config.rpc.request_timeout = Duration::from_millis(500);
    let core = env
        .register_core_with(ModData::new("zc", "Zois Core", KEY, "1.0.0"), config)
        .unwrap();

    let start = Instant::now();
    let outcome = core
        .messenger()
        .send_request("x", json!({}), PeerId(9), Channel::Broadcast)
        .await;
    assert!(outcome.is_error);
    assert_eq!(start.elapsed(), Duration::from_millis(500));
}

#[tokio::test(start_paused = true)]
async fn test_late_response_is_dropped() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    let _bob = Page::join(&room, 2, "Bob", "He/Him");

    let outcome = ann
        .messenger()
        .send_request("slow", json!({}), PeerId(2), Channel::Broadcast)
        .await;
    assert!(outcome.is_error);

    let id = ann.sent_request_ids().pop().unwrap();
    room.inject_chat(
        PeerId(1),
        hidden(
            2,
            json!({
                "msg": "requestResponse",
                "data": { "requestId": id, "message": "slow", "data": "finally" }
            }),
        ),
    );
    settle().await;

    assert_eq!(ann.messenger().pending_requests(), 0);
}

// =========================================================================
// Correlation
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_out_of_order_responses_resolve_their_own_requests() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    let _bob = Page::join(&room, 2, "Bob", "He/Him");
    let messenger = ann.messenger();

    let respond = async {
        settle().await;
        let ids = ann.sent_request_ids();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);

        // Answer the second request first.
        for (id, answer) in [(&ids[1], "second"), (&ids[0], "first")] {
            room.inject_chat(
                PeerId(1),
                hidden(
                    2,
                    json!({
                        "msg": "requestResponse",
                        "data": { "requestId": id, "message": "status", "data": answer }
                    }),
                ),
            );
            settle().await;
        }
    };

    let (first, second, ()) = tokio::join!(
        messenger.send_request("status", json!(1), PeerId(2), Channel::Broadcast),
        messenger.send_request("status", json!(2), PeerId(2), Channel::Broadcast),
        respond,
    );

    assert_eq!(first.payload, Some(json!("first")));
    assert_eq!(second.payload, Some(json!("second")));
}

#[tokio::test(start_paused = true)]
async fn test_wrong_id_type_is_ignored() {
    let room = LoopbackRoom::new();
    let _ann = Page::join(&room, 1, "Ann", "She/Her");
    let bob = Page::join(&room, 2, "Bob", "He/Him");

    let calls = Arc::new(AtomicUsize::new(0));
    {
        let calls = Arc::clone(&calls);
        bob.messenger()
            .on_request("ping", move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Some(json!("pong"))
            })
            .unwrap();
    }

    room.inject_chat(
        PeerId(2),
        hidden(
            1,
            json!({
                "msg": "request",
                "data": { "requestId": 12345, "message": "ping", "data": {} }
            }),
        ),
    );
    settle().await;

    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert!(bob.host().sent_chat().is_empty());
}

// =========================================================================
// Dispatch policy
// =========================================================================

#[derive(Deserialize)]
#[allow(dead_code)]
struct Greeting {
    name: String,
}

#[tokio::test(start_paused = true)]
async fn test_schema_rejection_skips_handler_and_times_out() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    let bob = Page::join(&room, 2, "Bob", "He/Him");

    let calls = Arc::new(AtomicUsize::new(0));
    {
        let calls = Arc::clone(&calls);
        bob.messenger()
            .on_request_validated("greet", PayloadValidator::typed::<Greeting>(), move |p, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Some(json!(format!("hello {}", p["name"].as_str().unwrap_or_default())))
            })
            .unwrap();
    }

    let bad = ann
        .messenger()
        .send_request("greet", json!({ "nom": 1 }), PeerId(2), Channel::Broadcast)
        .await;
    assert!(bad.is_error);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let good = ann
        .messenger()
        .send_request("greet", json!({ "name": "Ann" }), PeerId(2), Channel::Broadcast)
        .await;
    assert_eq!(good.payload, Some(json!("hello Ann")));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_panicking_handler_does_not_break_messenger() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    let bob = Page::join(&room, 2, "Bob", "He/Him");

    bob.messenger()
        .on_request("boom", |_, _| panic!("handler bug"))
        .unwrap();
    bob.messenger().on_request("ok", |_, _| Some(json!(true))).unwrap();

    let boom = ann
        .messenger()
        .send_request("boom", json!({}), PeerId(2), Channel::Broadcast)
        .await;
    assert!(boom.is_error);

    let ok = ann
        .messenger()
        .send_request("ok", json!({}), PeerId(2), Channel::Broadcast)
        .await;
    assert_eq!(ok.payload, Some(json!(true)));
}

#[tokio::test(start_paused = true)]
async fn test_later_registration_replaces_handler() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    let bob = Page::join(&room, 2, "Bob", "He/Him");

    bob.messenger().on_request("v", |_, _| Some(json!(1))).unwrap();
    bob.messenger().on_request("v", |_, _| Some(json!(2))).unwrap();

    let outcome = ann
        .messenger()
        .send_request("v", json!({}), PeerId(2), Channel::Broadcast)
        .await;
    assert_eq!(outcome.payload, Some(json!(2)));
    // One response, not one per registration.
    assert_eq!(bob.host().sent_chat().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_own_requests_are_not_dispatched() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");

    let calls = Arc::new(AtomicUsize::new(0));
    {
        let calls = Arc::clone(&calls);
        ann.messenger()
            .on_request("echo", move |_, _| {
                calls.fetch_add(1, Ordering::SeqCst);
                Some(json!("self"))
            })
            .unwrap();
    }

    let outcome = ann
        .messenger()
        .send_request("echo", json!({}), PeerId(1), Channel::Broadcast)
        .await;
    assert!(outcome.is_error);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unresolvable_broadcast_sender_is_ignored() {
    let room = LoopbackRoom::new();
    let bob = Page::join(&room, 2, "Bob", "He/Him");
    bob.messenger().on_request("ping", |_, _| Some(json!("pong"))).unwrap();

    room.inject_chat(
        PeerId(2),
        hidden(
            99,
            json!({
                "msg": "request",
                "data": { "requestId": "r1", "message": "ping", "data": {} }
            }),
        ),
    );
    settle().await;

    assert!(bob.host().sent_chat().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_private_request_from_outside_room_is_answered() {
    let room = LoopbackRoom::new();
    let bob = Page::join(&room, 2, "Bob", "He/Him");
    bob.messenger()
        .on_request("hi", |_, ctx| Some(json!(ctx.sender.display_name())))
        .unwrap();

    let body = json!({ "type": "ZC_request", "requestId": "r7", "message": "hi", "data": {} });
    room.inject_beep(
        PeerId(2),
        AccountBeep {
            member_number: PeerId(77),
            member_name: "Zed".into(),
            beep_type: LEASH_BEEP.into(),
            message: Some(body.to_string()),
        },
    );
    settle().await;

    let sent = bob.host().sent_beeps();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].member_number, PeerId(77));
    let reply: Value = serde_json::from_str(&sent[0].message).unwrap();
    assert_eq!(reply["type"], "ZC_requestResponse");
    assert_eq!(reply["requestId"], "r7");
    assert_eq!(reply["data"], "Zed");
}

#[tokio::test(start_paused = true)]
async fn test_other_mod_keys_do_not_cross() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");

    let (host, rx) = room.join(HostCharacter::new(2, "Bob", "He/Him"));
    let env = HostEnv::new(host);
    let _delivery = spawn_delivery(rx, env.sdk().clone());
    let other = env
        .register_core(ModData::new("other", "Other Mod", "OTHER", "1.0.0"))
        .unwrap();
    other.messenger().on_request("ping", |_, _| Some(json!("pong"))).unwrap();

    let outcome = ann
        .messenger()
        .send_request("ping", json!({}), PeerId(2), Channel::Broadcast)
        .await;
    assert!(outcome.is_error);
}

// =========================================================================
// Packets
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_packet_listeners_accumulate() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    let bob = Page::join(&room, 2, "Bob", "He/Him");

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    for tag in ["first", "second"] {
        let seen = Arc::clone(&seen);
        bob.messenger()
            .on_packet("sync", move |payload, ctx| {
                seen.lock().unwrap().push((tag, payload.clone(), ctx.sender.id));
            })
            .unwrap();
    }

    ann.messenger()
        .send_packet("sync", Some(json!({ "n": 1 })), None)
        .unwrap();
    settle().await;

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], ("first", json!({ "n": 1 }), PeerId(1)));
    assert_eq!(seen[1].0, "second");
}

#[tokio::test(start_paused = true)]
async fn test_packet_without_payload_arrives_as_null() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    let bob = Page::join(&room, 2, "Bob", "He/Him");

    let got = Arc::new(std::sync::Mutex::new(None));
    {
        let got = Arc::clone(&got);
        bob.messenger()
            .on_packet("hello", move |p, _| *got.lock().unwrap() = Some(p.clone()))
            .unwrap();
    }

    ann.messenger().send_packet("hello", None, Some(PeerId(2))).unwrap();
    settle().await;

    assert_eq!(*got.lock().unwrap(), Some(Value::Null));
    assert_eq!(ann.host().sent_chat()[0].target, Some(PeerId(2)));
}

#[tokio::test]
async fn test_reserved_packet_names_are_rejected() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");

    let err = ann.messenger().send_packet("request", None, None).unwrap_err();
    assert!(matches!(err, ModlinkError::Protocol(_)));
    let err = ann
        .messenger()
        .on_packet("requestResponse", |_, _| {})
        .unwrap_err();
    assert!(matches!(err, ModlinkError::Rpc(_)));
    assert!(ann.host().sent_chat().is_empty());
}

// =========================================================================
// Action, local and plain messages
// =========================================================================

#[tokio::test]
async fn test_action_substitutes_own_pronouns() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");

    ann.messenger()
        .send_action("<Pronoun> nods <selfIntensive>ly", None, vec![])
        .unwrap();

    let sent = ann.host().sent_chat();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, ChatKind::Action);
    assert_eq!(sent[0].content, "ZC_CUSTOM_ACTION");
    let dict = sent[0].dictionary.as_ref().unwrap();
    assert_eq!(dict[0]["Tag"], ACTION_TAG);
    assert_eq!(dict[0]["Text"], "She nods herselfly");
}

#[tokio::test]
async fn test_action_and_local_skipped_outside_room() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    room.leave(PeerId(1));

    ann.messenger().send_action("<Pronoun> waves", None, vec![]).unwrap();
    ann.messenger().send_local("hello").unwrap();

    assert!(ann.host().sent_chat().is_empty());
    assert!(ann.host().local_lines().is_empty());
}

#[tokio::test]
async fn test_empty_action_is_noop() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    ann.messenger().send_action("", Some(PeerId(2)), vec![]).unwrap();
    assert!(ann.host().sent_chat().is_empty());
}

#[tokio::test]
async fn test_local_line_is_not_transmitted() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");

    ann.messenger().send_local("<i>saved</i>").unwrap();

    let lines = ann.host().local_lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0].html, "<i>saved</i>");
    assert_eq!(lines[0].background, "#ED55E890");
    assert_eq!(lines[0].sender, PeerId(1));
    assert!(ann.host().sent_chat().is_empty());
}

#[tokio::test]
async fn test_send_beep_carries_raw_payload() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");

    ann.messenger().send_beep(&json!({ "hug": true }), PeerId(2)).unwrap();
    ann.messenger().send_chat("hi all").unwrap();

    let beep = &ann.host().sent_beeps()[0];
    assert_eq!(beep.beep_type, "Leash");
    assert_eq!(beep.member_number, PeerId(2));
    assert_eq!(beep.message, r#"{"hug":true}"#);

    let chat = &ann.host().sent_chat()[0];
    assert_eq!(chat.kind, ChatKind::Chat);
    assert_eq!(chat.content, "hi all");
}

// =========================================================================
// Lifecycle
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_shutdown_fails_pending_requests() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    let _bob = Page::join(&room, 2, "Bob", "He/Him");
    let messenger = ann.messenger();

    let start = Instant::now();
    let (outcome, ()) = tokio::join!(
        messenger.send_request("ping", json!({}), PeerId(2), Channel::Broadcast),
        async {
            tokio::time::sleep(Duration::from_millis(100)).await;
            messenger.shutdown();
        },
    );

    assert!(outcome.is_error);
    assert_eq!(start.elapsed(), Duration::from_millis(100));
    assert_eq!(messenger.pending_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_request_leaves_no_pending_entry() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    let _bob = Page::join(&room, 2, "Bob", "He/Him");

    let cut_short = tokio::time::timeout(
        Duration::from_millis(100),
        ann.messenger()
            .send_request("nobody", json!({}), PeerId(2), Channel::Broadcast),
    )
    .await;
    assert!(cut_short.is_err());
    assert_eq!(ann.messenger().pending_requests(), 0);

    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert_eq!(ann.messenger().pending_requests(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_request_refused_by_host_fails_fast() {
    let room = LoopbackRoom::new();
    let ann = Page::join(&room, 1, "Ann", "She/Her");
    room.leave(PeerId(1));

    let start = Instant::now();
    let outcome = ann
        .messenger()
        .send_request("ping", json!({}), PeerId(2), Channel::Broadcast)
        .await;

    assert!(outcome.is_error);
    assert_eq!(start.elapsed(), Duration::ZERO);
    assert_eq!(ann.messenger().pending_requests(), 0);
}
