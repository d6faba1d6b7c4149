//! Toast and dialog state shared by every mod on the page.
//!
//! Only the state lives here. Whatever renders popups subscribes to these
//! stores (via [`ToastStore::snapshot`] and [`DialogStore::current`]) and
//! reports user choices back with [`DialogStore::choose`].
//!
//! All mods registered through the same [`HostEnv`](crate::HostEnv) share
//! one [`PopupSurface`], so their toasts stack in one place and only one
//! dialog is ever open.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::debug;

/// Extra time a toast stays in the store after its duration, so the exit
/// animation can finish.
pub const TOAST_EXIT_GRACE: Duration = Duration::from_millis(300);

// ---------------------------------------------------------------------------
// Toasts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToastKind {
    Info,
    Success,
    Warning,
    Error,
}

/// What a mod asks for when raising a toast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToastSpec {
    pub title: Option<String>,
    pub message: String,
    pub duration: Duration,
}

impl ToastSpec {
    pub fn new(message: impl Into<String>, duration: Duration) -> Self {
        Self {
            title: None,
            message: message.into(),
            duration,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

/// A toast currently on screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Toast {
    pub id: String,
    pub title: Option<String>,
    pub message: String,
    pub kind: ToastKind,
    #[serde(serialize_with = "as_millis")]
    pub duration: Duration,
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// The list of visible toasts. Cheap to clone.
#[derive(Clone, Default)]
pub struct ToastStore {
    toasts: Arc<Mutex<Vec<Toast>>>,
}

impl ToastStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, toast: Toast) {
        self.lock().push(toast);
    }

    /// Returns `false` if no toast had this id.
    pub fn remove(&self, id: &str) -> bool {
        let mut toasts = self.lock();
        let before = toasts.len();
        toasts.retain(|t| t.id != id);
        toasts.len() != before
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// The visible toasts, oldest first.
    pub fn snapshot(&self) -> Vec<Toast> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// `"<unix-ms>:<count + 1>"`.
    fn next_id(&self) -> String {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_millis());
        format!("{now}:{}", self.len() + 1)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Toast>> {
        self.toasts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Raises toasts that remove themselves after `duration + 300 ms`.
#[derive(Clone)]
pub struct Toasts {
    store: ToastStore,
}

impl Toasts {
    pub fn new(store: ToastStore) -> Self {
        Self { store }
    }

    pub fn info(&self, spec: ToastSpec) -> String {
        self.show(ToastKind::Info, spec)
    }

    pub fn success(&self, spec: ToastSpec) -> String {
        self.show(ToastKind::Success, spec)
    }

    pub fn warn(&self, spec: ToastSpec) -> String {
        self.show(ToastKind::Warning, spec)
    }

    pub fn error(&self, spec: ToastSpec) -> String {
        self.show(ToastKind::Error, spec)
    }

    /// Adds the toast and schedules its removal. Returns its id.
    ///
    /// Outside a tokio runtime the toast is added but never removed
    /// automatically.
    fn show(&self, kind: ToastKind, spec: ToastSpec) -> String {
        let id = self.store.next_id();
        self.store.add(Toast {
            id: id.clone(),
            title: spec.title,
            message: spec.message,
            kind,
            duration: spec.duration,
        });

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let store = self.store.clone();
                let expire = spec.duration + TOAST_EXIT_GRACE;
                let toast_id = id.clone();
                handle.spawn(async move {
                    tokio::time::sleep(expire).await;
                    store.remove(&toast_id);
                });
            }
            Err(_) => debug!(%id, "no runtime, toast will not expire"),
        }
        id
    }
}

// ---------------------------------------------------------------------------
// Dialogs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogKind {
    ChoiceOne,
    ChoiceMultiple,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ButtonDirection {
    #[default]
    Row,
    Column,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogButton {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

/// A dialog to show.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DialogSpec {
    /// Width relative to the game canvas.
    pub width: f64,
    pub kind: DialogKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
    #[serde(default)]
    pub direction: ButtonDirection,
    pub buttons: Vec<DialogButton>,
}

/// How a dialog ended.
#[derive(Debug, Clone, PartialEq)]
pub enum DialogOutcome {
    /// The values of the picked buttons. One for `ChoiceOne`.
    Chosen(Vec<Value>),
    /// Cleared or replaced before the user chose.
    Dismissed,
}

/// Resolves when the dialog it came from ends.
#[derive(Debug)]
pub struct DialogReply {
    rx: oneshot::Receiver<Vec<Value>>,
}

impl Future for DialogReply {
    type Output = DialogOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<DialogOutcome> {
        Pin::new(&mut self.rx).poll(cx).map(|result| match result {
            Ok(values) => DialogOutcome::Chosen(values),
            Err(_) => DialogOutcome::Dismissed,
        })
    }
}

struct ActiveDialog {
    spec: DialogSpec,
    tx: oneshot::Sender<Vec<Value>>,
}

/// The single open dialog, if any. Cheap to clone.
#[derive(Clone, Default)]
pub struct DialogStore {
    active: Arc<Mutex<Option<ActiveDialog>>>,
}

impl DialogStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens `spec`, dismissing whatever was open before.
    pub fn show(&self, spec: DialogSpec) -> DialogReply {
        let (tx, rx) = oneshot::channel();
        let previous = self.lock().replace(ActiveDialog { spec, tx });
        if previous.is_some() {
            debug!("dialog replaced, previous one dismissed");
        }
        DialogReply { rx }
    }

    /// The open dialog, for rendering.
    pub fn current(&self) -> Option<DialogSpec> {
        self.lock().as_ref().map(|d| d.spec.clone())
    }

    pub fn is_open(&self) -> bool {
        self.lock().is_some()
    }

    /// Closes the dialog with `values`. Returns `false` if none was open.
    pub fn choose(&self, values: Vec<Value>) -> bool {
        match self.lock().take() {
            Some(active) => {
                // The reply may have been dropped by an impatient caller.
                let _ = active.tx.send(values);
                true
            }
            None => false,
        }
    }

    /// Closes the dialog with the values of the buttons at `indices`.
    /// Buttons without a value contribute `null`; bad indices are skipped.
    pub fn pick(&self, indices: &[usize]) -> bool {
        let values = {
            let active = self.lock();
            let Some(dialog) = active.as_ref() else {
                return false;
            };
            indices
                .iter()
                .filter_map(|&i| dialog.spec.buttons.get(i))
                .map(|b| b.value.clone().unwrap_or(Value::Null))
                .collect()
        };
        self.choose(values)
    }

    /// Closes the dialog without a choice.
    pub fn clear(&self) {
        self.lock().take();
    }

    fn lock(&self) -> MutexGuard<'_, Option<ActiveDialog>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ---------------------------------------------------------------------------
// PopupSurface
// ---------------------------------------------------------------------------

/// The one popup root of a page.
#[derive(Clone, Default)]
pub struct PopupSurface {
    toasts: ToastStore,
    dialogs: DialogStore,
}

impl PopupSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toast_store(&self) -> &ToastStore {
        &self.toasts
    }

    pub fn toasts(&self) -> Toasts {
        Toasts::new(self.toasts.clone())
    }

    pub fn dialogs(&self) -> &DialogStore {
        &self.dialogs
    }
}
