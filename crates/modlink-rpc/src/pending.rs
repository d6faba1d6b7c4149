//! The pending request registry.
//!
//! Each outbound request gets an entry keyed by its [`CorrelationId`] and a
//! oneshot channel for its outcome. Two paths race to finish an entry:
//!
//! - **resolve**: a matching response arrives. The entry is removed and the
//!   payload sent on the channel, both under the lock.
//! - **timeout**: the waiter's deadline passes. It takes the lock and tries
//!   to remove the entry itself.
//!
//! Whoever removes the entry wins. If the timeout path finds the entry
//! already gone, the resolver has already sent, so the value is sitting in
//! the channel and `try_recv` picks it up. Either way the caller sees
//! exactly one outcome.
//!
//! A ticket dropped before it settles (an outer timeout, `select!`, an
//! aborted task) removes its entry on the way out.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use modlink_protocol::{Channel, CorrelationId};
use modlink_transport::PeerId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::RpcError;

// ---------------------------------------------------------------------------
// RequestOutcome
// ---------------------------------------------------------------------------

/// What the caller of a request eventually receives.
///
/// `is_error: true` means "response unknown", not "operation failed": the
/// responder may have acted without its answer reaching us.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestOutcome {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(rename = "isError")]
    pub is_error: bool,
}

impl RequestOutcome {
    /// A response arrived.
    pub fn success(payload: Value) -> Self {
        Self {
            payload: Some(payload),
            is_error: false,
        }
    }

    /// No response arrived in time.
    pub fn timed_out() -> Self {
        Self {
            payload: None,
            is_error: true,
        }
    }

    /// Converts to a `Result`, for callers that prefer `?`.
    pub fn into_result(self) -> Result<Value, RpcError> {
        if self.is_error {
            Err(RpcError::NoResponse)
        } else {
            Ok(self.payload.unwrap_or(Value::Null))
        }
    }
}

// ---------------------------------------------------------------------------
// PendingRequests
// ---------------------------------------------------------------------------

struct PendingEntry {
    name: String,
    channel: Channel,
    target: PeerId,
    created_at: Instant,
    tx: oneshot::Sender<RequestOutcome>,
}

/// The waiting half of a request, returned by [`PendingRequests::begin`].
///
/// Dropping a ticket that has not completed (including dropping a
/// [`wait`](PendingRequests::wait) future part way) withdraws its entry.
#[must_use = "dropping a ticket withdraws its request"]
pub struct PendingTicket {
    id: CorrelationId,
    rx: oneshot::Receiver<RequestOutcome>,
    registry: PendingRequests,
    settled: bool,
}

impl PendingTicket {
    /// The correlation id to put on the wire.
    pub fn id(&self) -> &CorrelationId {
        &self.id
    }
}

impl fmt::Debug for PendingTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTicket")
            .field("id", &self.id)
            .field("settled", &self.settled)
            .finish()
    }
}

impl Drop for PendingTicket {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(entry) = self.registry.lock().remove(&self.id) {
            debug!(request_id = %self.id, name = %entry.name, "waiter dropped, request abandoned");
        }
    }
}

/// Process-scoped set of outstanding requests. Cheap to clone.
#[derive(Clone, Default)]
pub struct PendingRequests {
    entries: Arc<Mutex<HashMap<CorrelationId, PendingEntry>>>,
}

impl PendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new request and returns its ticket.
    ///
    /// The id is fresh: it does not collide with any request still pending.
    pub fn begin(&self, name: &str, channel: Channel, target: PeerId) -> PendingTicket {
        let (tx, rx) = oneshot::channel();
        let mut entries = self.lock();

        let mut id = CorrelationId::generate();
        while entries.contains_key(&id) {
            id = CorrelationId::generate();
        }

        entries.insert(
            id.clone(),
            PendingEntry {
                name: name.to_string(),
                channel,
                target,
                created_at: Instant::now(),
                tx,
            },
        );
        debug!(request_id = %id, name, %channel, %target, "request pending");

        PendingTicket {
            id,
            rx,
            registry: self.clone(),
            settled: false,
        }
    }

    /// Completes a pending request with a response payload.
    ///
    /// Returns `false` for unknown ids: a duplicate response, a response
    /// after the timeout, or an id we never issued. None of these is an
    /// error.
    pub fn resolve(&self, id: &CorrelationId, payload: Value) -> bool {
        let mut entries = self.lock();
        let Some(entry) = entries.remove(id) else {
            debug!(request_id = %id, "response for unknown request id, dropping");
            return false;
        };
        debug!(
            request_id = %id,
            name = %entry.name,
            channel = %entry.channel,
            elapsed_ms = entry.created_at.elapsed().as_millis() as u64,
            "request resolved"
        );
        // The receiver is gone only if the waiter was dropped.
        let _ = entry.tx.send(RequestOutcome::success(payload));
        true
    }

    /// Waits for the ticket's outcome, at most `timeout`.
    pub async fn wait(&self, mut ticket: PendingTicket, timeout: Duration) -> RequestOutcome {
        let result = tokio::time::timeout(timeout, &mut ticket.rx).await;
        ticket.settled = true;
        let id = &ticket.id;

        match result {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => {
                debug!(request_id = %id, "request dropped before completion");
                RequestOutcome::timed_out()
            }
            Err(_) => {
                let removed = self.lock().remove(id);
                match removed {
                    Some(entry) => {
                        warn!(
                            request_id = %id,
                            name = %entry.name,
                            target = %entry.target,
                            timeout_ms = timeout.as_millis() as u64,
                            "request timed out"
                        );
                        RequestOutcome::timed_out()
                    }
                    None => ticket
                        .rx
                        .try_recv()
                        .unwrap_or_else(|_| RequestOutcome::timed_out()),
                }
            }
        }
    }

    /// Withdraws a request whose envelope never left, e.g. because the
    /// host refused it. Returns `false` if it had already completed.
    pub fn cancel(&self, mut ticket: PendingTicket) -> bool {
        ticket.settled = true;
        let removed = self.lock().remove(&ticket.id).is_some();
        if removed {
            debug!(request_id = %ticket.id, "request cancelled");
        }
        removed
    }

    /// Number of requests still pending.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Whether `id` is still waiting for a response.
    pub fn is_pending(&self, id: &CorrelationId) -> bool {
        self.lock().contains_key(id)
    }

    /// Drops every pending request. Their waiters complete immediately
    /// with an error outcome.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.lock());
        if !drained.is_empty() {
            debug!(count = drained.len(), "clearing pending requests");
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CorrelationId, PendingEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
