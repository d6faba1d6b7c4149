//! Ordered observer chains over named host events.
//!
//! Several independently loaded mods want to see every chat message and
//! every beep the host delivers. Each mod registers an observer on a
//! [`HookChain`]. When the host delivers an event, the chain calls the
//! observers one after another, highest [`HookPriority`] first. Every
//! observer gets a [`Next`] continuation: calling it passes the event on to
//! the rest of the chain and finally to the host's own handler. An observer
//! that does not call `next` swallows the event.
//!
//! ```text
//! host delivers ─→ [Top] ─→ [AddBehavior] ─→ [Observe] ─→ host handler
//!                    │ next      │ next         │ next
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// Relative ordering of observers on a chain. Higher runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HookPriority {
    /// Only looks, never changes behavior.
    Observe = 0,
    /// Adds behavior alongside the host's. Modlink's own observers use this.
    AddBehavior = 1,
    ModifyBehavior = 5,
    OverrideBehavior = 10,
    Top = 100,
}

/// The host events modlink can observe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostEvent {
    /// An in-room chat message.
    ChatRoomMessage,
    /// A private account beep.
    AccountBeep,
}

impl fmt::Display for HostEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChatRoomMessage => write!(f, "ChatRoomMessage"),
            Self::AccountBeep => write!(f, "AccountBeep"),
        }
    }
}

/// Identifies one registered observer so it can be removed later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookHandle {
    event: HostEvent,
    id: u64,
}

impl HookHandle {
    /// The event this observer is attached to.
    pub fn event(&self) -> HostEvent {
        self.event
    }
}

/// An observer callback.
pub type Observer<E> = dyn Fn(&E, Next<'_, E>) + Send + Sync;

struct Entry<E> {
    id: u64,
    priority: HookPriority,
    observer: Arc<Observer<E>>,
}

/// Continuation handed to each observer.
///
/// Consumed by [`call`](Next::call), so an observer forwards an event at
/// most once.
pub struct Next<'a, E> {
    rest: &'a [Arc<Entry<E>>],
    terminal: &'a dyn Fn(&E),
}

impl<E> Next<'_, E> {
    /// Forwards the event to the remaining observers, then the host handler.
    pub fn call(self, event: &E) {
        match self.rest.split_first() {
            Some((first, rest)) => (first.observer)(
                event,
                Next {
                    rest,
                    terminal: self.terminal,
                },
            ),
            None => (self.terminal)(event),
        }
    }
}

/// The observers registered against one host event.
pub struct HookChain<E> {
    event: HostEvent,
    next_id: AtomicU64,
    // Kept sorted: descending priority, then registration order.
    entries: Mutex<Vec<Arc<Entry<E>>>>,
}

impl<E> HookChain<E> {
    /// Creates an empty chain for `event`.
    pub fn new(event: HostEvent) -> Self {
        Self {
            event,
            next_id: AtomicU64::new(1),
            entries: Mutex::new(Vec::new()),
        }
    }

    /// The event this chain belongs to.
    pub fn event(&self) -> HostEvent {
        self.event
    }

    /// Registers an observer and returns a handle that removes it.
    pub fn hook<F>(&self, priority: HookPriority, observer: F) -> HookHandle
    where
        F: Fn(&E, Next<'_, E>) + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Arc::new(Entry {
            id,
            priority,
            observer: Arc::new(observer),
        });

        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let at = entries
            .iter()
            .position(|e| e.priority < priority)
            .unwrap_or(entries.len());
        entries.insert(at, entry);

        tracing::trace!(event = %self.event, id, ?priority, "observer hooked");
        HookHandle {
            event: self.event,
            id,
        }
    }

    /// Removes an observer. Returns `false` if it was not on this chain.
    pub fn remove(&self, handle: HookHandle) -> bool {
        if handle.event != self.event {
            return false;
        }
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let before = entries.len();
        entries.retain(|e| e.id != handle.id);
        let removed = entries.len() != before;
        if removed {
            tracing::trace!(event = %self.event, id = handle.id, "observer removed");
        }
        removed
    }

    /// Number of registered observers.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns `true` if no observers are registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Runs `event` through the chain, ending at `terminal`.
    ///
    /// The chain is snapshotted first, so observers may hook or unhook
    /// (themselves included) while the event is in flight. Changes take
    /// effect from the next event.
    pub fn dispatch(&self, event: &E, terminal: impl Fn(&E)) {
        let snapshot: Vec<Arc<Entry<E>>> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        Next {
            rest: &snapshot,
            terminal: &terminal,
        }
        .call(event);
    }
}
