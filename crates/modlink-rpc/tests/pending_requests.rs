//! Integration tests for the pending request registry.
//!
//! Time is paused, so the 6000 ms deadline elapses on virtual time and
//! elapsed durations can be asserted exactly.

use std::time::Duration;

use modlink_protocol::Channel;
use modlink_rpc::{PendingRequests, REQUEST_TIMEOUT, RequestOutcome};
use modlink_transport::PeerId;
use serde_json::json;
use tokio::time::Instant;

// =========================================================================
// Timeout
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_unanswered_request_times_out_after_deadline() {
    let pending = PendingRequests::new();
    let ticket = pending.begin("ping", Channel::Broadcast, PeerId(42));
    let start = Instant::now();

    let outcome = pending.wait(ticket, REQUEST_TIMEOUT).await;

    assert_eq!(outcome, RequestOutcome::timed_out());
    assert_eq!(start.elapsed(), Duration::from_millis(6000));
    assert!(pending.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_late_response_after_timeout_is_dropped() {
    let pending = PendingRequests::new();
    let ticket = pending.begin("ping", Channel::Private, PeerId(42));
    let id = ticket.id().clone();

    let outcome = pending.wait(ticket, REQUEST_TIMEOUT).await;
    assert!(outcome.is_error);

    assert!(!pending.resolve(&id, json!({ "late": true })));
}

// =========================================================================
// Resolution
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_response_before_deadline_resolves_once() {
    let pending = PendingRequests::new();
    let ticket = pending.begin("ping", Channel::Broadcast, PeerId(42));
    let id = ticket.id().clone();

    let resolver = pending.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(resolver.resolve(&id, json!({ "pong": true })));
        assert!(!resolver.resolve(&id, json!({ "pong": "again" })));
    });

    let start = Instant::now();
    let outcome = pending.wait(ticket, REQUEST_TIMEOUT).await;

    assert_eq!(outcome, RequestOutcome::success(json!({ "pong": true })));
    assert_eq!(start.elapsed(), Duration::from_millis(50));

    // Letting the deadline pass changes nothing.
    tokio::time::sleep(REQUEST_TIMEOUT).await;
    assert!(pending.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_resolved_before_wait_is_still_delivered() {
    let pending = PendingRequests::new();
    let ticket = pending.begin("ping", Channel::Broadcast, PeerId(1));
    assert!(pending.resolve(ticket.id(), json!(1)));

    let outcome = pending.wait(ticket, REQUEST_TIMEOUT).await;
    assert_eq!(outcome.payload, Some(json!(1)));
}

#[tokio::test(start_paused = true)]
async fn test_out_of_order_responses_match_by_id() {
    let pending = PendingRequests::new();
    let first = pending.begin("status", Channel::Broadcast, PeerId(7));
    let second = pending.begin("status", Channel::Broadcast, PeerId(7));
    let (first_id, second_id) = (first.id().clone(), second.id().clone());

    let resolver = pending.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(10)).await;
        resolver.resolve(&second_id, json!("second"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        resolver.resolve(&first_id, json!("first"));
    });

    let (a, b) = tokio::join!(
        pending.wait(first, REQUEST_TIMEOUT),
        pending.wait(second, REQUEST_TIMEOUT),
    );

    assert_eq!(a.payload, Some(json!("first")));
    assert_eq!(b.payload, Some(json!("second")));
    assert!(!a.is_error && !b.is_error);
}

// =========================================================================
// Teardown
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_clear_fails_waiters_immediately() {
    let pending = PendingRequests::new();
    let ticket = pending.begin("ping", Channel::Broadcast, PeerId(1));

    let clearer = pending.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(5)).await;
        clearer.clear();
    });

    let start = Instant::now();
    let outcome = pending.wait(ticket, REQUEST_TIMEOUT).await;
    assert!(outcome.is_error);
    assert_eq!(start.elapsed(), Duration::from_millis(5));
}

#[tokio::test(start_paused = true)]
async fn test_custom_timeout_is_honoured() {
    let pending = PendingRequests::new();
    let ticket = pending.begin("ping", Channel::Broadcast, PeerId(1));
    let start = Instant::now();

    pending.wait(ticket, Duration::from_millis(250)).await;
    assert_eq!(start.elapsed(), Duration::from_millis(250));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_wait_removes_entry() {
    let pending = PendingRequests::new();
    let ticket = pending.begin("nobody", Channel::Broadcast, PeerId(2));
    let id = ticket.id().clone();

    let cut_short =
        tokio::time::timeout(Duration::from_millis(100), pending.wait(ticket, REQUEST_TIMEOUT))
            .await;
    assert!(cut_short.is_err());

    assert!(!pending.is_pending(&id));
    assert!(pending.is_empty());
    tokio::time::sleep(Duration::from_secs(3600)).await;
    assert!(pending.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_aborted_waiter_task_removes_entry() {
    let pending = PendingRequests::new();
    let ticket = pending.begin("nobody", Channel::Private, PeerId(2));

    let waiter = pending.clone();
    let task = tokio::spawn(async move { waiter.wait(ticket, REQUEST_TIMEOUT).await });
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(pending.len(), 1);

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());
    assert!(pending.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unpolled_wait_dropped_removes_entry() {
    let pending = PendingRequests::new();
    let ticket = pending.begin("nobody", Channel::Broadcast, PeerId(2));

    let wait = pending.wait(ticket, REQUEST_TIMEOUT);
    assert_eq!(pending.len(), 1);
    drop(wait);
    assert!(pending.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_settled_wait_leaves_other_entries_alone() {
    let pending = PendingRequests::new();
    let kept = pending.begin("kept", Channel::Broadcast, PeerId(2));
    let short = pending.begin("short", Channel::Broadcast, PeerId(2));

    let outcome = pending.wait(short, Duration::from_millis(10)).await;
    assert!(outcome.is_error);
    assert!(pending.is_pending(kept.id()));
    assert_eq!(pending.len(), 1);
}
