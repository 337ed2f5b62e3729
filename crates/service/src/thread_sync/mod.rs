//! Follow-up thread synchronizer.
//!
//! Keeps an in-memory mirror of every open thread and reconciles it with the
//! [`ThreadStore`]. Local appends are visible immediately; persistence runs
//! strictly in order behind a per-thread sync lock, one insert in flight at a
//! time. Each remote call is bounded by a timeout and aborted when the thread
//! is detached.

mod state;

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use analysis_console_core::{MAX_MESSAGE_LEN, MessageRole};
use analysis_console_storage::{StorageError, ThreadStore};
use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::ServiceError;
use crate::events::{ConsoleEvent, publish};
use state::ThreadState;
pub use state::{ThreadMessageView, ThreadView};

/// Outcome of one reconcile pass.
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Messages inserted during this pass.
    pub persisted: usize,
    /// Shared flags mirrored during this pass.
    pub flags_synced: usize,
    /// Flags dropped because their row was deleted elsewhere. The thread
    /// reloads on its next `ensure_loaded`.
    pub flags_dropped: usize,
    /// Cursor after the pass.
    pub cursor: usize,
}

struct ThreadHandle {
    state: Mutex<ThreadState>,
    /// Serializes load, reconcile and clear for one thread.
    sync_lock: tokio::sync::Mutex<()>,
    cancel: CancellationToken,
}

impl ThreadHandle {
    fn new() -> Self {
        Self {
            state: Mutex::new(ThreadState::default()),
            sync_lock: tokio::sync::Mutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, ThreadState> {
        // State is only touched by short non-panicking sections.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct ThreadSynchronizer {
    store: Arc<dyn ThreadStore>,
    call_timeout: Duration,
    event_tx: Option<broadcast::Sender<String>>,
    threads: Mutex<HashMap<String, Arc<ThreadHandle>>>,
}

impl ThreadSynchronizer {
    #[must_use]
    pub fn new(store: Arc<dyn ThreadStore>, call_timeout: Duration) -> Self {
        Self { store, call_timeout, event_tx: None, threads: Mutex::new(HashMap::new()) }
    }

    #[must_use]
    pub fn with_events(mut self, event_tx: broadcast::Sender<String>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    #[must_use]
    pub const fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    fn threads(&self) -> MutexGuard<'_, HashMap<String, Arc<ThreadHandle>>> {
        self.threads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, analysis_id: &str) -> Arc<ThreadHandle> {
        let handle = Arc::clone(
            self.threads()
                .entry(analysis_id.to_owned())
                .or_insert_with(|| Arc::new(ThreadHandle::new())),
        );
        handle.state().touched = Some(Instant::now());
        handle
    }

    /// Number of threads currently mirrored.
    #[must_use]
    pub fn open_threads(&self) -> usize {
        self.threads().len()
    }

    /// Drop mirrors untouched for `idle` that have nothing left to sync and
    /// no call in flight. A dropped thread reloads on its next use.
    pub fn evict_idle(&self, idle: Duration) -> usize {
        let now = Instant::now();
        let mut threads = self.threads();
        let before = threads.len();
        threads.retain(|_, handle| {
            // The map holds the only reference unless an operation is running.
            if Arc::strong_count(handle) > 1 {
                return true;
            }
            let state = handle.state();
            let fresh = state.touched.is_some_and(|t| now.saturating_duration_since(t) < idle);
            fresh || !state.is_synced()
        });
        let evicted = before.saturating_sub(threads.len());
        if evicted > 0 {
            tracing::debug!(evicted, open = threads.len(), "idle threads evicted");
        }
        evicted
    }

    fn existing(&self, analysis_id: &str) -> Option<Arc<ThreadHandle>> {
        self.threads().get(analysis_id).cloned()
    }

    /// Run one store call under the call timeout, aborting on detach.
    async fn remote<T>(
        &self,
        handle: &ThreadHandle,
        analysis_id: &str,
        operation: &'static str,
        call: impl Future<Output = Result<T, StorageError>>,
    ) -> Result<T, ServiceError> {
        tokio::select! {
            biased;
            () = handle.cancel.cancelled() => Err(ServiceError::Cancelled(analysis_id.to_owned())),
            result = tokio::time::timeout(self.call_timeout, call) => match result {
                Ok(inner) => inner.map_err(ServiceError::from),
                Err(_) => Err(ServiceError::Timeout { operation, after: self.call_timeout }),
            },
        }
    }

    /// Fetch the persisted thread and replace the local mirror with it.
    ///
    /// Never fails: on a fetch error the thread keeps whatever it held
    /// locally (empty for a fresh thread) and the error is reported in
    /// [`ThreadView::load_error`].
    pub async fn load_thread(&self, analysis_id: &str) -> ThreadView {
        let handle = self.handle(analysis_id);
        let _sync = handle.sync_lock.lock().await;
        let fetched = self
            .remote(&handle, analysis_id, "list_messages", self.store.list_messages(analysis_id))
            .await;

        let mut state = handle.state();
        match fetched {
            Ok(rows) => {
                state.replace_with_remote(&rows);
                tracing::debug!(
                    analysis_id,
                    rows = rows.len(),
                    pending = state.messages.len().saturating_sub(state.cursor),
                    "thread loaded"
                );
            },
            Err(e) => {
                tracing::warn!(analysis_id, error = %e, "thread load failed");
                state.load_error = Some(e.to_string());
            },
        }
        state.view(analysis_id)
    }

    /// Load the thread unless it has already been loaded successfully.
    pub async fn ensure_loaded(&self, analysis_id: &str) -> ThreadView {
        if self.is_loaded(analysis_id) {
            return self.view(analysis_id);
        }
        self.load_thread(analysis_id).await
    }

    #[must_use]
    pub fn is_loaded(&self, analysis_id: &str) -> bool {
        self.existing(analysis_id).is_some_and(|h| h.state().loaded)
    }

    /// Current local view. Unknown threads are reported empty and unloaded.
    #[must_use]
    pub fn view(&self, analysis_id: &str) -> ThreadView {
        match self.existing(analysis_id) {
            Some(handle) => handle.state().view(analysis_id),
            None => ThreadState::default().view(analysis_id),
        }
    }

    /// Push a message onto the local thread without touching the store.
    ///
    /// Returns the index of the new message. The length limit applies to user
    /// messages only; assistant replies are kept verbatim.
    pub fn append_local(
        &self,
        analysis_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<usize, ServiceError> {
        if content.trim().is_empty() {
            return Err(ServiceError::InvalidInput("message content is empty".to_owned()));
        }
        if role == MessageRole::User && content.len() > MAX_MESSAGE_LEN {
            return Err(ServiceError::InvalidInput(format!(
                "message content exceeds {MAX_MESSAGE_LEN} bytes"
            )));
        }
        let handle = self.handle(analysis_id);
        let index = handle.state().push(role, content.to_owned());
        tracing::debug!(analysis_id, index, role = %role, "message appended locally");
        Ok(index)
    }

    /// Like [`Self::append_local`], but returns the index of the last message
    /// instead of appending when it is an identical unpersisted copy. Lets a
    /// caller retry after a failed reconcile without duplicating the message.
    pub fn append_local_once(
        &self,
        analysis_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<usize, ServiceError> {
        if let Some(handle) = self.existing(analysis_id) {
            let pending = handle.state().pending_tail(role, content);
            if let Some(index) = pending {
                tracing::debug!(analysis_id, index, "reusing pending message");
                return Ok(index);
            }
        }
        self.append_local(analysis_id, role, content)
    }

    /// Append locally, then reconcile.
    pub async fn append(
        &self,
        analysis_id: &str,
        role: MessageRole,
        content: &str,
    ) -> Result<ThreadView, ServiceError> {
        self.append_local(analysis_id, role, content)?;
        self.reconcile(analysis_id).await?;
        Ok(self.view(analysis_id))
    }

    /// Persist every message past the cursor in order, then mirror pending
    /// shared flags.
    ///
    /// Stops at the first failure with the cursor on the failed message, so a
    /// later call resumes exactly there.
    pub async fn reconcile(&self, analysis_id: &str) -> Result<ReconcileReport, ServiceError> {
        let handle = self.handle(analysis_id);
        let _sync = handle.sync_lock.lock().await;
        self.reconcile_locked(&handle, analysis_id).await
    }

    async fn reconcile_locked(
        &self,
        handle: &ThreadHandle,
        analysis_id: &str,
    ) -> Result<ReconcileReport, ServiceError> {
        let mut report = ReconcileReport::default();

        loop {
            let job = {
                let state = handle.state();
                state.next_unsynced(analysis_id).map(|(idx, msg)| (idx, msg, state.generation))
            };
            let Some((index, message, generation)) = job else { break };

            let row = self
                .remote(handle, analysis_id, "insert_message", self.store.insert_message(&message))
                .await
                .inspect_err(|e| {
                    tracing::warn!(analysis_id, index, error = %e, "reconcile stopped");
                })?;

            if !handle.state().confirm_persisted(index, generation, &row) {
                tracing::warn!(analysis_id, index, message_id = row.id, "stale insert result dropped");
                return Err(ServiceError::Superseded(analysis_id.to_owned()));
            }
            report.persisted = report.persisted.saturating_add(1);
            publish(
                self.event_tx.as_ref(),
                &ConsoleEvent::MessagePersisted {
                    analysis_id: analysis_id.to_owned(),
                    message_id: row.id,
                    role: row.role.to_string(),
                },
            );
        }

        loop {
            let job = handle.state().next_flag_job();
            let Some((index, message_id, shared)) = job else { break };

            let found = self
                .remote(
                    handle,
                    analysis_id,
                    "set_message_shared",
                    self.store.set_message_shared(message_id, shared),
                )
                .await?;
            if !found {
                tracing::warn!(analysis_id, index, message_id, "row deleted elsewhere, flag dropped");
                if !handle.state().mark_row_gone(index, message_id) {
                    return Err(ServiceError::Superseded(analysis_id.to_owned()));
                }
                report.flags_dropped = report.flags_dropped.saturating_add(1);
                continue;
            }
            if !handle.state().confirm_flag(index, message_id, shared) {
                return Err(ServiceError::Superseded(analysis_id.to_owned()));
            }
            report.flags_synced = report.flags_synced.saturating_add(1);
            publish(
                self.event_tx.as_ref(),
                &ConsoleEvent::MessageShared {
                    analysis_id: analysis_id.to_owned(),
                    message_id,
                    shared,
                },
            );
        }

        report.cursor = handle.state().cursor;
        if report.persisted > 0 || report.flags_synced > 0 || report.flags_dropped > 0 {
            tracing::info!(
                analysis_id,
                persisted = report.persisted,
                flags = report.flags_synced,
                flags_dropped = report.flags_dropped,
                cursor = report.cursor,
                "thread reconciled"
            );
        }
        Ok(report)
    }

    /// Mark the assistant message with the given ordinal shared or private.
    ///
    /// The local flag changes first; a persisted message has it mirrored by
    /// the reconcile that follows, an unpersisted one carries it into its row.
    pub async fn set_shared(
        &self,
        analysis_id: &str,
        assistant_ordinal: usize,
        shared: bool,
    ) -> Result<ReconcileReport, ServiceError> {
        let handle = self.handle(analysis_id);
        if handle.state().set_shared(assistant_ordinal, shared).is_none() {
            return Err(ServiceError::InvalidInput(format!(
                "no assistant message with ordinal {assistant_ordinal}"
            )));
        }
        self.reconcile(analysis_id).await
    }

    /// Delete the persisted thread, then drop it locally.
    ///
    /// Local state is left untouched when the remote delete fails. Messages
    /// appended while the delete is in flight survive as unpersisted.
    pub async fn clear_thread(&self, analysis_id: &str) -> Result<usize, ServiceError> {
        let handle = self.handle(analysis_id);
        let _sync = handle.sync_lock.lock().await;
        let keys: HashSet<Uuid> = handle.state().messages.iter().map(|m| m.client_key).collect();

        let removed = self
            .remote(&handle, analysis_id, "delete_thread", self.store.delete_thread(analysis_id))
            .await
            .inspect_err(|e| tracing::warn!(analysis_id, error = %e, "thread clear failed"))?;

        handle.state().clear(&keys);
        tracing::info!(analysis_id, removed, "thread cleared");
        publish(
            self.event_tx.as_ref(),
            &ConsoleEvent::ThreadCleared { analysis_id: analysis_id.to_owned(), removed },
        );
        Ok(removed)
    }

    /// Forget the local mirror and cancel any call in flight for it.
    ///
    /// Returns `false` if the thread was not open.
    pub fn detach(&self, analysis_id: &str) -> bool {
        let Some(handle) = self.threads().remove(analysis_id) else { return false };
        handle.cancel.cancel();
        tracing::debug!(analysis_id, "thread detached");
        true
    }
}
