use std::cell::Cell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use stepwatch_core::Session;

thread_local! {
    // Set while this thread runs a session callback.
    static IN_CALLBACK: Cell<bool> = const { Cell::new(false) };
}

struct CallbackScope;

impl CallbackScope {
    fn enter() -> Self {
        IN_CALLBACK.with(|c| c.set(true));
        CallbackScope
    }
}

impl Drop for CallbackScope {
    fn drop(&mut self) {
        IN_CALLBACK.with(|c| c.set(false));
    }
}

/// State shared between a running session task and its handle.
pub(crate) struct Shared {
    cancelled: AtomicBool,
    /// Held across each callback so `cancel` cannot return mid-delivery.
    gate: Mutex<()>,
    snapshot: Mutex<Session>,
}

impl Shared {
    pub(crate) fn new(session: Session) -> Self {
        Self {
            cancelled: AtomicBool::new(false),
            gate: Mutex::new(()),
            snapshot: Mutex::new(session),
        }
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Run `f` unless the session was cancelled. Returns whether it ran.
    pub(crate) fn deliver(&self, f: impl FnOnce()) -> bool {
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        if self.is_cancelled() {
            return false;
        }
        let _scope = CallbackScope::enter();
        f();
        true
    }

    /// Returns true on the first call only.
    fn cancel(&self) -> bool {
        // A callback cancelling its own session already holds the gate.
        if IN_CALLBACK.with(Cell::get) {
            return !self.cancelled.swap(true, Ordering::SeqCst);
        }
        let _gate = self.gate.lock().unwrap_or_else(PoisonError::into_inner);
        !self.cancelled.swap(true, Ordering::SeqCst)
    }

    pub(crate) fn store(&self, session: &Session) {
        *self.snapshot.lock().unwrap_or_else(PoisonError::into_inner) = session.clone();
    }

    fn load(&self) -> Session {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// Owner of one running session. Dropping the handle cancels the session.
pub struct SessionHandle {
    id: Uuid,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    task: Option<JoinHandle<Session>>,
}

impl SessionHandle {
    pub(crate) fn new(
        id: Uuid,
        shared: Arc<Shared>,
        cancel: CancellationToken,
        task: JoinHandle<Session>,
    ) -> Self {
        Self {
            id,
            shared,
            cancel,
            task: Some(task),
        }
    }

    /// Identifier used in this session's log lines.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Stop monitoring and tear the transport down.
    ///
    /// Waits for a callback that is already running, so no callback starts
    /// after this returns. Safe to call from inside a callback. A no-op once
    /// the session has ended on its own.
    pub fn cancel(&self) {
        if self.shared.cancel() {
            debug!(session = %self.id, "session cancelled by caller");
        }
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.shared.is_cancelled()
    }

    /// True once the session task has exited (terminal, exhausted or cancelled).
    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Latest session state.
    pub fn snapshot(&self) -> Session {
        self.shared.load()
    }

    /// Wait for the session task to exit and return the final state.
    pub async fn finished(mut self) -> Session {
        match self.task.take() {
            Some(task) => match task.await {
                Ok(session) => session,
                Err(e) => {
                    debug!(session = %self.id, error = %e, "session task did not finish cleanly");
                    self.shared.load()
                }
            },
            None => self.shared.load(),
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        if !self.is_finished() {
            self.cancel();
        }
    }
}
