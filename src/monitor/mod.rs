//! Per-session readiness monitor
//!
//! A [`SessionMonitor`] turns a session's raw output stream into a
//! deduplicated stream of waiting/running [`StateChange`]s. Output is buffered
//! and classified once it has been quiet for the debounce interval; hooks can
//! force a value directly. Every candidate, whatever its source, goes through
//! the same transition rule:
//!
//! 1. inside the suppress-all window: discarded
//! 2. waiting while inside the suppress-waiting window: discarded
//! 3. equal to the last delivered value: discarded
//! 4. otherwise delivered to the state-change callback
//!
//! The debounce timer is a tokio task. Re-arming aborts the previous task and
//! bumps a generation counter so that a timer which already woke up cannot
//! apply a stale classification after a newer decision.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::buffer::TailBuffer;
use crate::classifier;
use crate::config::MonitorSettings;
use crate::SessionId;


/// A committed readiness change for one session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateChange {
    pub session_id: SessionId,
    pub waiting: bool,
}

/// Receiver of committed state changes
pub type StateCallback = Box<dyn Fn(StateChange) + Send + Sync>;

/// What happened to a candidate state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Delivered to the callback
    Committed,
    /// Same as the last delivered value
    Unchanged,
    /// Blocked by the suppress-waiting window
    WaitingSuppressed,
    /// Blocked by the suppress-all window
    AllSuppressed,
    /// The monitor has been shut down
    Detached,
}

struct MonitorState {
    buffer: TailBuffer,
    last_notified: bool,
    hook_managed: bool,
    suppress_waiting_until: Option<Instant>,
    suppress_all_until: Option<Instant>,
    /// Bumped whenever a pending classification must not be applied anymore
    generation: u64,
    callback: Option<StateCallback>,
}

impl MonitorState {
    fn evaluate(&mut self, session_id: &str, candidate: bool, now: Instant) -> Transition {
        if self.suppress_all_until.is_some_and(|until| now < until) {
            trace!("[agentwatch:monitor] {} all-suppressed: {}", session_id, candidate);
            return Transition::AllSuppressed;
        }
        if candidate && self.suppress_waiting_until.is_some_and(|until| now < until) {
            trace!("[agentwatch:monitor] {} waiting-suppressed", session_id);
            return Transition::WaitingSuppressed;
        }
        self.commit(session_id, candidate)
    }

    fn commit(&mut self, session_id: &str, candidate: bool) -> Transition {
        if candidate == self.last_notified {
            return Transition::Unchanged;
        }
        let Some(callback) = self.callback.as_ref() else {
            return Transition::Detached;
        };
        self.last_notified = candidate;
        debug!(
            "[agentwatch:monitor] {} -> {}",
            session_id,
            if candidate { "waiting" } else { "running" }
        );
        callback(StateChange {
            session_id: session_id.to_string(),
            waiting: candidate,
        });
        Transition::Committed
    }
}

/// Output monitor for one session
pub struct SessionMonitor {
    session_id: SessionId,
    settings: MonitorSettings,
    state: Arc<Mutex<MonitorState>>,
    debounce: Option<JoinHandle<()>>,
    runtime: Handle,
}

fn lock(state: &Mutex<MonitorState>) -> MutexGuard<'_, MonitorState> {
    state.lock().unwrap_or_else(|e| e.into_inner())
}

impl SessionMonitor {
    /// Create a monitor delivering committed changes to `callback`.
    ///
    /// Timers are spawned on `runtime`, so the monitor can be driven from
    /// threads outside the runtime (PTY readers, the hook server).
    pub fn new(
        session_id: impl Into<SessionId>,
        settings: MonitorSettings,
        runtime: Handle,
        callback: StateCallback,
    ) -> Self {
        let state = MonitorState {
            buffer: TailBuffer::new(settings.buffer_capacity),
            last_notified: false,
            hook_managed: false,
            suppress_waiting_until: None,
            suppress_all_until: None,
            generation: 0,
            callback: Some(callback),
        };
        Self {
            session_id: session_id.into(),
            settings,
            state: Arc::new(Mutex::new(state)),
            debounce: None,
            runtime,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Append output and re-arm the debounce timer
    pub fn process_output(&mut self, text: &str) {
        let (generation, delay) = {
            let mut state = lock(&self.state);
            if state.callback.is_none() {
                return;
            }
            state.buffer.push(text);
            state.generation += 1;
            let delay = if state.hook_managed {
                self.settings.hook_managed_debounce()
            } else {
                self.settings.debounce()
            };
            (state.generation, delay)
        };
        self.arm_debounce(generation, delay);
    }

    fn arm_debounce(&mut self, generation: u64, delay: Duration) {
        self.cancel_debounce();
        let state = self.state.clone();
        let session_id = self.session_id.clone();
        self.debounce = Some(self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            let mut state = lock(&state);
            if state.generation != generation {
                return;
            }
            let candidate = classifier::classify_waiting(state.buffer.as_str());
            state.evaluate(&session_id, candidate, Instant::now());
        }));
    }

    fn cancel_debounce(&mut self) {
        if let Some(handle) = self.debounce.take() {
            handle.abort();
        }
    }

    /// Feed a literal candidate through the transition rule.
    ///
    /// Cancels any pending output classification first, so a debounce that
    /// was armed before this call can never override it.
    pub fn force_set_waiting(&mut self, waiting: bool) -> Transition {
        self.cancel_debounce();
        let mut state = lock(&self.state);
        state.generation += 1;
        state.evaluate(&self.session_id, waiting, Instant::now())
    }

    /// Discard waiting candidates for `duration` (replaces any previous window)
    pub fn suppress_waiting_detection(&self, duration: Duration) {
        lock(&self.state).suppress_waiting_until = Some(Instant::now() + duration);
    }

    /// Discard every candidate for `duration` (replaces any previous window)
    pub fn suppress_all_detection(&self, duration: Duration) {
        lock(&self.state).suppress_all_until = Some(Instant::now() + duration);
    }

    /// Mark the session as hook-driven; never cleared
    pub fn set_hook_managed(&self) {
        let mut state = lock(&self.state);
        if !state.hook_managed {
            debug!("[agentwatch:monitor] {} is now hook-managed", self.session_id);
            state.hook_managed = true;
        }
    }

    pub fn is_hook_managed(&self) -> bool {
        lock(&self.state).hook_managed
    }

    /// The user typed and submitted something.
    ///
    /// Drops stale prompt text and commits `running`, ignoring suppression.
    pub fn user_provided_input(&mut self) -> Transition {
        self.cancel_debounce();
        let mut state = lock(&self.state);
        state.generation += 1;
        state.buffer.truncate_to_tail(self.settings.input_tail_chars);
        state.commit(&self.session_id, false)
    }

    /// Drop buffered output without touching the notified state
    pub fn clear_buffer(&mut self) {
        self.cancel_debounce();
        let mut state = lock(&self.state);
        state.generation += 1;
        state.buffer.clear();
    }

    /// Overwrite the last delivered value without invoking the callback.
    ///
    /// Used when the owner changed the state itself, so the next genuine
    /// transition is not mistaken for a duplicate.
    pub fn sync_notified(&mut self, waiting: bool) {
        self.cancel_debounce();
        let mut state = lock(&self.state);
        state.generation += 1;
        state.last_notified = waiting;
    }

    /// Clear buffer and notified state; suppression windows are kept
    pub fn reset(&mut self) {
        self.cancel_debounce();
        let mut state = lock(&self.state);
        state.generation += 1;
        state.buffer.clear();
        state.last_notified = false;
    }

    /// Stop timers and detach the callback. Nothing is delivered afterwards.
    pub fn shutdown(&mut self) {
        self.cancel_debounce();
        let mut state = lock(&self.state);
        state.generation += 1;
        state.callback = None;
    }

    pub fn is_detached(&self) -> bool {
        lock(&self.state).callback.is_none()
    }

    /// Last value delivered to the callback
    pub fn last_notified(&self) -> bool {
        lock(&self.state).last_notified
    }

    /// Snapshot of the buffered output
    pub fn buffer(&self) -> String {
        lock(&self.state).buffer.as_str().to_string()
    }

    pub fn has_pending_check(&self) -> bool {
        self.debounce.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for SessionMonitor {
    fn drop(&mut self) {
        self.cancel_debounce();
    }
}

impl std::fmt::Debug for SessionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.state);
        f.debug_struct("SessionMonitor")
            .field("session_id", &self.session_id)
            .field("last_notified", &state.last_notified)
            .field("hook_managed", &state.hook_managed)
            .field("buffered_chars", &state.buffer.len())
            .finish()
    }
}
