//! Owner of every PTY-backed process, keyed by session id.
//!
//! Session records never hold a PTY handle; they look it up here by id.

use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

use super::session::{PtyEvent, PtySession};
use crate::SessionId;

/// Process supervisor for PTY sessions
pub struct ProcessSupervisor {
    sessions: HashMap<SessionId, PtySession>,
    events: UnboundedSender<PtyEvent>,
}

impl ProcessSupervisor {
    /// Create a supervisor that streams PTY events to `events`
    pub fn new(events: UnboundedSender<PtyEvent>) -> Self {
        Self {
            sessions: HashMap::new(),
            events,
        }
    }

    /// Sender to hand to [`PtySession::spawn`] for sessions owned here
    pub fn event_sender(&self) -> UnboundedSender<PtyEvent> {
        self.events.clone()
    }

    /// Take ownership of a spawned session
    pub fn insert(&mut self, session: PtySession) {
        self.sessions.insert(session.session_id.clone(), session);
    }

    pub fn contains(&self, session_id: &str) -> bool {
        self.sessions.contains_key(session_id)
    }

    pub fn get(&self, session_id: &str) -> Option<&PtySession> {
        self.sessions.get(session_id)
    }

    /// Write bytes to a session's terminal.
    ///
    /// Returns `false` when the session has no PTY here.
    pub fn write(&self, session_id: &str, data: &[u8]) -> std::io::Result<bool> {
        match self.sessions.get(session_id) {
            Some(session) => session.write(data).map(|_| true),
            None => Ok(false),
        }
    }

    pub fn resize(&self, session_id: &str, cols: u16, rows: u16) -> anyhow::Result<bool> {
        match self.sessions.get(session_id) {
            Some(session) => session.resize(cols, rows).map(|_| true),
            None => Ok(false),
        }
    }

    pub fn pid(&self, session_id: &str) -> Option<u32> {
        self.sessions.get(session_id).and_then(|s| s.pid())
    }

    pub fn is_running(&self, session_id: &str) -> Option<bool> {
        self.sessions.get(session_id).map(|s| s.is_running())
    }

    /// Drop the PTY handle for a session, closing the master side
    pub fn remove(&mut self, session_id: &str) -> Option<PtySession> {
        self.sessions.remove(session_id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
