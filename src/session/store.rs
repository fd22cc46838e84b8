//! Concurrency-safe registry of live transfer sessions.
//!
//! Every status change goes through a compare-and-set under the DashMap
//! shard lock, so a timeout and a claim racing on one key have exactly one
//! winner.

use dashmap::{mapref::entry::Entry, DashMap};
use serde::Serialize;
use std::sync::Mutex;
use tokio::sync::watch;

use crate::common::TransferError;

/// Lifecycle of a session.
///
/// `Waiting -> InProgress -> Done` or `Waiting -> TimedOut`. Both `Done`
/// and `TimedOut` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    Waiting,
    InProgress,
    TimedOut,
    Done,
}

impl TransferStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TransferStatus::TimedOut | TransferStatus::Done)
    }

    /// Whether `self -> next` is an edge of the state machine.
    pub fn can_transition_to(self, next: TransferStatus) -> bool {
        use TransferStatus::*;
        matches!(
            (self, next),
            (Waiting, InProgress) | (Waiting, TimedOut) | (InProgress, Done)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Waiting => "waiting",
            TransferStatus::InProgress => "in_progress",
            TransferStatus::TimedOut => "timed_out",
            TransferStatus::Done => "done",
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One key's worth of coordination state.
///
/// `source` is the uploader's stream; it leaves the session exactly once,
/// when a downloader claims it.
pub struct Session<S> {
    key: String,
    status: TransferStatus,
    // Mutex only so the store is Sync for any Send source
    source: Mutex<Option<S>>,
    // Broadcasts every accepted transition to the blocked uploader
    status_tx: watch::Sender<TransferStatus>,
}

impl<S> Session<S> {
    fn new(key: String, source: S) -> Self {
        let (status_tx, _) = watch::channel(TransferStatus::Waiting);
        Self {
            key,
            status: TransferStatus::Waiting,
            source: Mutex::new(Some(source)),
            status_tx,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    fn take_source(&mut self) -> Option<S> {
        match self.source.get_mut() {
            Ok(source) => source.take(),
            Err(poisoned) => {
                tracing::error!(key = %self.key, "Session source lock poisoned, recovering");
                poisoned.into_inner().take()
            }
        }
    }

    fn transition(&mut self, next: TransferStatus) {
        tracing::debug!(key = %self.key, from = %self.status, to = %next, "session transition");
        self.status = next;
        self.status_tx.send_replace(next);
    }
}

/// Thread-safe map from key to [`Session`].
pub struct SessionStore<S> {
    sessions: DashMap<String, Session<S>>,
}

impl<S> Default for SessionStore<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> SessionStore<S> {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    /// Registers a `Waiting` session holding `source`.
    ///
    /// The existence check and the insert happen under one shard lock.
    /// Returns a receiver that observes every later status change.
    pub fn create(
        &self,
        key: &str,
        source: S,
    ) -> Result<watch::Receiver<TransferStatus>, TransferError> {
        match self.sessions.entry(key.to_string()) {
            Entry::Occupied(_) => Err(TransferError::KeyAlreadyExists),
            Entry::Vacant(slot) => {
                let session = Session::new(key.to_string(), source);
                let rx = session.status_tx.subscribe();
                slot.insert(session);
                tracing::debug!(key = %key, "session created");
                Ok(rx)
            }
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.sessions.contains_key(key)
    }

    /// Read-only status lookup.
    pub fn get(&self, key: &str) -> Option<TransferStatus> {
        self.sessions.get(key).map(|session| session.status())
    }

    /// Compare-and-set transition. Returns false when the current status is
    /// not `expected`, the key is gone, or the edge is not part of the state
    /// machine.
    pub fn update_status(
        &self,
        key: &str,
        expected: TransferStatus,
        next: TransferStatus,
    ) -> bool {
        if !expected.can_transition_to(next) {
            tracing::warn!(key = %key, from = %expected, to = %next, "rejected illegal transition");
            return false;
        }

        let Some(mut session) = self.sessions.get_mut(key) else {
            return false;
        };
        if session.status != expected {
            return false;
        }
        session.transition(next);
        true
    }

    /// Moves a `Waiting` session to `InProgress` and hands its source to the
    /// caller. Only the first claim on a key can succeed.
    pub fn claim(&self, key: &str) -> Result<S, TransferError> {
        let mut session = self
            .sessions
            .get_mut(key)
            .ok_or(TransferError::NoSuchTransfer)?;
        if session.status != TransferStatus::Waiting {
            return Err(TransferError::NoSuchTransfer);
        }
        let source = session.take_source().ok_or(TransferError::NoSuchTransfer)?;
        session.transition(TransferStatus::InProgress);
        Ok(source)
    }

    pub fn delete(&self, key: &str) {
        self.sessions.remove(key);
    }

    /// Removes every session whose status satisfies `predicate`, returning
    /// how many were removed.
    pub fn sweep<F>(&self, predicate: F) -> usize
    where
        F: Fn(TransferStatus) -> bool,
    {
        let mut removed = 0usize;
        self.sessions.retain(|key, session| {
            if predicate(session.status) {
                tracing::debug!(key = %key, status = %session.status, "session swept");
                removed += 1;
                false
            } else {
                true
            }
        });
        removed
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
