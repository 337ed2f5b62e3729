//! In-memory mirror of one follow-up thread.
//!
//! Invariant: every slot before `cursor` has a remote id, no slot at or after
//! `cursor` has one. The cursor only moves forward through
//! [`ThreadState::confirm_persisted`] and is only reset by a load or a clear.

use std::collections::{HashMap, HashSet};

use analysis_console_core::{
    FollowUpMessage, MessageRole, NewFollowUpMessage, assistant_index, assistant_ordinals,
};
use serde::Serialize;
use tokio::time::Instant;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub(crate) struct ThreadMessage {
    pub role: MessageRole,
    pub content: String,
    pub client_key: Uuid,
    pub remote_id: Option<i64>,
    /// Flag the user asked for.
    pub shared: bool,
    /// Flag last confirmed by the store. `None` until persisted.
    pub remote_shared: Option<bool>,
    /// The row behind `remote_id` was deleted by someone else.
    pub row_gone: bool,
}

impl ThreadMessage {
    fn local(role: MessageRole, content: String) -> Self {
        Self {
            role,
            content,
            client_key: Uuid::new_v4(),
            remote_id: None,
            shared: false,
            remote_shared: None,
            row_gone: false,
        }
    }

    fn from_row(row: &FollowUpMessage) -> Self {
        Self {
            role: row.role,
            content: row.content.clone(),
            client_key: row.client_key,
            remote_id: Some(row.id),
            shared: row.shared,
            remote_shared: Some(row.shared),
            row_gone: false,
        }
    }

    fn flag_pending(&self) -> bool {
        self.remote_id.is_some() && !self.row_gone && self.remote_shared != Some(self.shared)
    }

    /// Flag intent that a reload must not drop.
    fn unsynced_intent(&self) -> Option<bool> {
        (self.remote_id.is_none() || self.flag_pending()).then_some(self.shared)
    }
}

#[derive(Debug, Default)]
pub(crate) struct ThreadState {
    pub messages: Vec<ThreadMessage>,
    pub cursor: usize,
    pub loaded: bool,
    pub load_error: Option<String>,
    /// Bumped by every load and clear.
    pub generation: u64,
    /// Last time a caller touched this thread.
    pub touched: Option<Instant>,
}

impl ThreadState {
    pub fn push(&mut self, role: MessageRole, content: String) -> usize {
        self.messages.push(ThreadMessage::local(role, content));
        self.messages.len().saturating_sub(1)
    }

    /// Index of the last message if it is unpersisted and identical.
    pub fn pending_tail(&self, role: MessageRole, content: &str) -> Option<usize> {
        let last = self.messages.len().checked_sub(1)?;
        let slot = self.messages.get(last)?;
        (last >= self.cursor && slot.role == role && slot.content == content).then_some(last)
    }

    /// Nothing waits to be inserted or mirrored.
    pub fn is_synced(&self) -> bool {
        self.cursor == self.messages.len() && !self.messages.iter().any(ThreadMessage::flag_pending)
    }

    /// The message at the cursor, as the row that should be inserted for it.
    pub fn next_unsynced(&self, analysis_id: &str) -> Option<(usize, NewFollowUpMessage)> {
        let slot = self.messages.get(self.cursor)?;
        Some((
            self.cursor,
            NewFollowUpMessage {
                analysis_id: analysis_id.to_owned(),
                client_key: slot.client_key,
                role: slot.role,
                content: slot.content.clone(),
                shared: slot.shared,
            },
        ))
    }

    /// Attach the stored row to slot `index` and advance the cursor past it.
    ///
    /// Returns `false` (and changes nothing) if the thread was reloaded or
    /// cleared since `generation`, or the slot no longer holds the message the
    /// row was created for.
    pub fn confirm_persisted(
        &mut self,
        index: usize,
        generation: u64,
        row: &FollowUpMessage,
    ) -> bool {
        if generation != self.generation || index != self.cursor {
            return false;
        }
        let Some(slot) = self.messages.get_mut(index) else { return false };
        if slot.client_key != row.client_key {
            return false;
        }
        slot.remote_id = Some(row.id);
        slot.remote_shared = Some(row.shared);
        self.cursor = index.saturating_add(1);
        true
    }

    /// First persisted message whose shared flag differs from the store.
    pub fn next_flag_job(&self) -> Option<(usize, i64, bool)> {
        self.messages.iter().enumerate().find_map(|(idx, m)| {
            if m.flag_pending() { m.remote_id.map(|id| (idx, id, m.shared)) } else { None }
        })
    }

    /// The row of slot `index` no longer exists. Its flag job is dropped and
    /// the thread is marked for a reload.
    pub fn mark_row_gone(&mut self, index: usize, remote_id: i64) -> bool {
        match self.messages.get_mut(index) {
            Some(slot) if slot.remote_id == Some(remote_id) => {
                slot.row_gone = true;
                self.loaded = false;
                true
            },
            _ => false,
        }
    }

    pub fn confirm_flag(&mut self, index: usize, remote_id: i64, shared: bool) -> bool {
        match self.messages.get_mut(index) {
            Some(slot) if slot.remote_id == Some(remote_id) => {
                slot.remote_shared = Some(shared);
                true
            },
            _ => false,
        }
    }

    /// Replace the mirror with the rows fetched from the store.
    ///
    /// Unpersisted local messages whose key is not among the rows are kept
    /// after them, still unpersisted. Flag intent not yet confirmed by the
    /// store is carried onto the matching row.
    pub fn replace_with_remote(&mut self, rows: &[FollowUpMessage]) {
        let fetched: HashSet<Uuid> = rows.iter().map(|r| r.client_key).collect();
        let intent: HashMap<Uuid, bool> = self
            .messages
            .iter()
            .filter_map(|m| m.unsynced_intent().map(|s| (m.client_key, s)))
            .collect();
        let carried: Vec<ThreadMessage> = self
            .messages
            .iter()
            .skip(self.cursor)
            .filter(|m| !fetched.contains(&m.client_key))
            .cloned()
            .collect();

        let mut messages: Vec<ThreadMessage> = rows
            .iter()
            .map(|row| {
                let mut slot = ThreadMessage::from_row(row);
                if let Some(shared) = intent.get(&row.client_key) {
                    slot.shared = *shared;
                }
                slot
            })
            .collect();
        self.cursor = messages.len();
        messages.extend(carried);
        self.messages = messages;
        self.loaded = true;
        self.load_error = None;
        self.generation = self.generation.wrapping_add(1);
    }

    /// Drop the given messages after their rows were deleted remotely.
    pub fn clear(&mut self, removed: &HashSet<Uuid>) {
        self.messages.retain(|m| !removed.contains(&m.client_key));
        // Anything left was appended during the delete and never persisted.
        for slot in &mut self.messages {
            slot.remote_id = None;
            slot.remote_shared = None;
            slot.row_gone = false;
        }
        self.cursor = 0;
        self.loaded = true;
        self.load_error = None;
        self.generation = self.generation.wrapping_add(1);
    }

    pub fn set_shared(&mut self, ordinal: usize, shared: bool) -> Option<usize> {
        let idx = assistant_index(&self.messages, ordinal, |m| m.role)?;
        let slot = self.messages.get_mut(idx)?;
        slot.shared = shared;
        Some(idx)
    }

    pub fn view(&self, analysis_id: &str) -> ThreadView {
        let ordinals = assistant_ordinals(&self.messages, |m| m.role);
        let messages = self
            .messages
            .iter()
            .zip(ordinals)
            .enumerate()
            .map(|(index, (m, assistant_ordinal))| ThreadMessageView {
                index,
                assistant_ordinal,
                role: m.role,
                content: m.content.clone(),
                remote_id: m.remote_id,
                shared: m.shared,
                synced: m.remote_id.is_some() && !m.row_gone && !m.flag_pending(),
            })
            .collect();
        ThreadView {
            analysis_id: analysis_id.to_owned(),
            messages,
            synced: self.cursor,
            pending_messages: self.messages.len().saturating_sub(self.cursor),
            pending_flags: self.messages.iter().filter(|m| m.flag_pending()).count(),
            loaded: self.loaded,
            load_error: self.load_error.clone(),
        }
    }
}

/// Snapshot of a thread as seen by callers.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ThreadView {
    pub analysis_id: String,
    pub messages: Vec<ThreadMessageView>,
    /// Number of messages confirmed persisted (the synchronization cursor).
    pub synced: usize,
    pub pending_messages: usize,
    pub pending_flags: usize,
    pub loaded: bool,
    /// Set when the last load failed and the thread is shown without remote rows.
    pub load_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ThreadMessageView {
    pub index: usize,
    /// Position among assistant messages; the address used for sharing.
    pub assistant_ordinal: Option<usize>,
    pub role: MessageRole,
    pub content: String,
    pub remote_id: Option<i64>,
    pub shared: bool,
    /// Persisted with the current shared flag.
    pub synced: bool,
}
