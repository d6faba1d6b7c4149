use std::time::Duration;

use modlink::prelude::*;
use modlink::transport::{LoopbackHost, LoopbackRoom, spawn_delivery};
use modlink::util::random_in_range;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::info;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct Ping {
    seq: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct Pong {
    seq: u32,
    from: String,
}

// ---------------------------------------------------------------------------
// Players
// ---------------------------------------------------------------------------

struct Player {
    env: HostEnv<LoopbackHost>,
    core: Core<LoopbackHost>,
    _delivery: JoinHandle<()>,
}

fn join(room: &LoopbackRoom, id: u64, name: &str, pronouns: &str) -> Result<Player, ModlinkError> {
    let (host, rx) = room.join(HostCharacter::new(id, name, pronouns));
    let env = HostEnv::new(host);
    let delivery = spawn_delivery(rx, env.sdk().clone());
    let core = env.register_core(ModData::new("pingpong", "Ping Pong", "PP", "1.0.0"))?;
    Ok(Player {
        env,
        core,
        _delivery: delivery,
    })
}

/// Answers pings and dice rolls.
fn serve(player: &Player) -> Result<(), ModlinkError> {
    let messenger = player.core.messenger();

    messenger.on_request_validated("ping", PayloadValidator::typed::<Ping>(), |payload, ctx| {
        let ping: Ping = serde_json::from_value(payload).ok()?;
        info!(seq = ping.seq, from = %ctx.sender, channel = %ctx.channel, "ping");
        serde_json::to_value(Pong {
            seq: ping.seq,
            from: ctx.sender.display_name().to_string(),
        })
        .ok()
    })?;

    messenger.on_request("roll", |_, _| Some(json!(random_in_range(1, 6))))?;

    messenger.on_packet("wave", |_, ctx| {
        info!(from = %ctx.sender, "waved at");
    })?;
    Ok(())
}

async fn play(player: &Player, target: PeerId) -> Result<Vec<RequestOutcome>, ModlinkError> {
    let messenger = player.core.messenger();
    let toasts = player.core.toasts();

    let mut outcomes = Vec::new();
    for (seq, channel) in [(1, Channel::Broadcast), (2, Channel::Private)] {
        let outcome = messenger
            .send_request("ping", json!(Ping { seq }), target, channel)
            .await;
        if outcome.is_error {
            toasts.error(ToastSpec::new("no pong", Duration::from_secs(3)));
        } else {
            toasts.success(ToastSpec::new(format!("pong {seq}"), Duration::from_secs(3)));
        }
        outcomes.push(outcome);
    }

    outcomes.push(
        messenger
            .send_request("roll", Value::Null, target, Channel::Broadcast)
            .await,
    );
    messenger.send_packet("wave", None, Some(target))?;
    messenger.send_action("<Pronoun> bows to the table", None, vec![])?;
    Ok(outcomes)
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    modlink::init_tracing();

    let room = LoopbackRoom::new();
    let ann = join(&room, 1, "Ann", "She/Her")?;
    let bob = join(&room, 2, "Bob", "He/Him")?;
    serve(&bob)?;

    let poller = Poller::new(PollConfig::default());
    let host = ann.env.host();
    wait_for_start(
        &poller,
        || host.in_chat_room(),
        StartDelay::fixed(Duration::from_millis(100)),
        || info!("ann is in the room"),
    )
    .await;

    for outcome in play(&ann, PeerId(2)).await? {
        match outcome.into_result() {
            Ok(payload) => println!("ok: {payload}"),
            Err(e) => println!("failed: {e}"),
        }
    }
    println!("{} toasts shown", ann.core.popups().toast_store().len());

    ann.core.messenger().shutdown();
    bob.core.messenger().shutdown();
    Ok(())
}
