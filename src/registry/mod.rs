//! Session registry: the single source of truth for supervised sessions.
//!
//! The registry maps session ids to their record and [`SessionMonitor`], owns
//! the [`ProcessSupervisor`] holding every PTY, and arbitrates between hook
//! events and output classification.
//!
//! # Update path
//!
//! Monitors never touch session records. Committed state changes are sent on
//! the registry's event channel and applied by a single pump task through
//! [`SessionRegistry::update_waiting_state`]'s internal path, which is the only
//! code that flips `is_waiting` and the only code that emits or cancels
//! notifications. Hooks force-set the monitor, so their changes travel the
//! same channel and are ordered after any output change already queued.
//!
//! # Teardown
//!
//! While any teardown is in progress a registry-wide cleanup flag is raised.
//! State changes the pump receives meanwhile are held back and replayed once
//! the flag drops: changes for removed sessions then hit nothing, changes for
//! surviving sessions are applied late instead of being lost. A change whose
//! value no longer matches the monitor's last delivered value was superseded
//! (by a manual override or a later commit) and is skipped.

mod groups;
mod hooks;
mod matching;
mod teardown;


use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::monitor::{SessionMonitor, StateChange};
use crate::notify::{Notification, NotificationRequest, Notifier};
use crate::process::ProcessLocator;
use crate::pty::{ProcessSupervisor, PtyEvent, PtySession, SpawnError};
use crate::{repo_name_for, GroupLayout, SessionGroup, SessionGroupId, SessionId, SessionInfo};

pub use groups::GroupManager;

/// Registry operation failures
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("Session already registered: {0}")]
    SessionExists(SessionId),

    #[error("Session group not found: {0}")]
    GroupNotFound(SessionGroupId),

    #[error("A session group needs at least one path")]
    EmptyGroup,

    #[error("Session {0} has no terminal attached")]
    NoTerminal(SessionId),

    #[error("Failed to resize terminal: {0}")]
    Resize(String),

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Messages consumed by the registry pump
#[derive(Debug)]
enum RegistryEvent {
    StateChanged(StateChange),
    CleanupFinished,
    Flush(oneshot::Sender<()>),
}

/// Live record of one session
struct Session {
    /// Registration order, used for deterministic hook matching
    seq: u64,
    id: SessionId,
    working_directory: PathBuf,
    repo_name: String,
    sub_session_id: Option<String>,
    is_running: bool,
    is_waiting: bool,
    group_id: Option<SessionGroupId>,
    created_at: DateTime<Utc>,
    monitor: SessionMonitor,
}

impl Session {
    fn info(&self) -> SessionInfo {
        SessionInfo {
            id: self.id.clone(),
            working_directory: self.working_directory.clone(),
            repo_name: self.repo_name.clone(),
            sub_session_id: self.sub_session_id.clone(),
            is_running: self.is_running,
            is_waiting: self.is_waiting,
            group_id: self.group_id,
            hook_managed: self.monitor.is_hook_managed(),
            created_at: self.created_at,
        }
    }
}

struct RegistryState {
    sessions: HashMap<SessionId, Session>,
    groups: GroupManager,
    supervisor: ProcessSupervisor,
    next_seq: u64,
}

struct Shared {
    state: Mutex<RegistryState>,
    config: Config,
    notifier: Arc<dyn Notifier>,
    locator: Arc<dyn ProcessLocator>,
    cleanup_depth: AtomicUsize,
    events: UnboundedSender<RegistryEvent>,
    runtime: Handle,
}

/// Handle to the session registry. Cheap to clone; all clones share state.
#[derive(Clone)]
pub struct SessionRegistry {
    shared: Arc<Shared>,
}

impl SessionRegistry {
    /// Create a registry and start its background tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(config: Config, notifier: Arc<dyn Notifier>, locator: Arc<dyn ProcessLocator>) -> Self {
        let runtime = Handle::current();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (pty_tx, pty_rx) = mpsc::unbounded_channel();

        let shared = Arc::new(Shared {
            state: Mutex::new(RegistryState {
                sessions: HashMap::new(),
                groups: GroupManager::new(),
                supervisor: ProcessSupervisor::new(pty_tx),
                next_seq: 0,
            }),
            config,
            notifier,
            locator,
            cleanup_depth: AtomicUsize::new(0),
            events: events_tx,
            runtime: runtime.clone(),
        });

        runtime.spawn(run_pump(Arc::downgrade(&shared), events_rx));
        runtime.spawn(forward_pty_events(Arc::downgrade(&shared), pty_rx));

        Self { shared }
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    fn lock(&self) -> MutexGuard<'_, RegistryState> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Whether a teardown is currently in progress
    pub fn is_cleaning_up(&self) -> bool {
        self.shared.cleanup_depth.load(Ordering::SeqCst) > 0
    }

    /// Register a session for a process started elsewhere
    pub fn register_session(
        &self,
        id: impl Into<SessionId>,
        working_directory: impl Into<PathBuf>,
        group_id: Option<SessionGroupId>,
    ) -> Result<(), RegistryError> {
        let id = id.into();
        let working_directory = working_directory.into();
        let mut state = self.lock();
        if state.sessions.contains_key(&id) {
            return Err(RegistryError::SessionExists(id));
        }

        let events = self.shared.events.clone();
        let monitor = SessionMonitor::new(
            id.clone(),
            self.shared.config.monitor.clone(),
            self.shared.runtime.clone(),
            Box::new(move |change| {
                let _ = events.send(RegistryEvent::StateChanged(change));
            }),
        );

        let seq = state.next_seq;
        state.next_seq += 1;
        info!(
            "[agentwatch:registry] Registered session {} at {}",
            id,
            working_directory.display()
        );
        state.sessions.insert(
            id.clone(),
            Session {
                seq,
                id,
                repo_name: repo_name_for(&working_directory),
                working_directory,
                sub_session_id: None,
                is_running: true,
                is_waiting: false,
                group_id,
                created_at: Utc::now(),
                monitor,
            },
        );
        Ok(())
    }

    /// Register a session and launch the configured agent CLI for it.
    ///
    /// On spawn failure the session stays registered but not running, and
    /// the error is returned; nothing is retried.
    pub async fn spawn_session(
        &self,
        working_directory: impl Into<PathBuf>,
        group_id: Option<SessionGroupId>,
    ) -> Result<SessionId, RegistryError> {
        let working_directory = working_directory.into();
        let id = uuid::Uuid::new_v4().to_string();
        self.register_session(id.clone(), working_directory.clone(), group_id)?;

        let agent = self.shared.config.agent.clone();
        let events = self.lock().supervisor.event_sender();
        let spawn_id = id.clone();
        let spawned = tokio::task::spawn_blocking(move || {
            PtySession::spawn(
                spawn_id,
                &working_directory,
                &agent.binary,
                &agent.args,
                &agent.env,
                events,
            )
        })
        .await
        .unwrap_or_else(|e| {
            Err(SpawnError::Spawn {
                command: self.shared.config.agent.binary.clone(),
                reason: e.to_string(),
            })
        });

        match spawned {
            Ok(pty) => {
                let mut state = self.lock();
                if state.sessions.contains_key(&id) {
                    state.supervisor.insert(pty);
                } else {
                    // Torn down while spawning
                    pty.terminate();
                }
                Ok(id)
            }
            Err(e) => {
                warn!("[agentwatch:registry] Spawn failed for session {}: {}", id, e);
                let mut state = self.lock();
                if let Some(session) = state.sessions.get_mut(&id) {
                    session.is_running = false;
                    session.monitor.shutdown();
                }
                Err(e.into())
            }
        }
    }

    /// Forget a session without signalling its process.
    ///
    /// A PTY owned by the registry is closed.
    pub fn unregister_session(&self, id: &str) -> Option<SessionInfo> {
        let mut state = self.lock();
        let mut session = state.sessions.remove(id)?;
        session.monitor.shutdown();
        state.supervisor.remove(id);
        state.groups.remove_session(id);
        info!("[agentwatch:registry] Unregistered session {}", id);
        Some(session.info())
    }

    /// Snapshot of one session
    pub fn session(&self, id: &str) -> Option<SessionInfo> {
        self.lock().sessions.get(id).map(Session::info)
    }

    /// Snapshot of all sessions, in registration order
    pub fn sessions(&self) -> Vec<SessionInfo> {
        let state = self.lock();
        let mut sessions: Vec<&Session> = state.sessions.values().collect();
        sessions.sort_by_key(|s| s.seq);
        sessions.into_iter().map(Session::info).collect()
    }

    /// Buffered output the monitor is classifying for a session
    pub fn monitor_buffer(&self, id: &str) -> Option<String> {
        self.lock().sessions.get(id).map(|s| s.monitor.buffer())
    }

    /// Accumulated PTY output for a session the registry spawned
    pub fn terminal_output(&self, id: &str) -> Option<String> {
        self.lock().supervisor.get(id).map(|pty| pty.output())
    }

    /// Feed output produced by a session
    pub fn process_output(&self, id: &str, text: &str) -> Result<(), RegistryError> {
        let mut state = self.lock();
        let session = state
            .sessions
            .get_mut(id)
            .ok_or_else(|| RegistryError::SessionNotFound(id.to_string()))?;
        session.monitor.process_output(text);
        Ok(())
    }

    /// Write input to a session's terminal.
    ///
    /// Input containing a line break counts as the user answering, which
    /// drops stale prompt text and marks the session busy.
    pub fn send_input(&self, id: &str, text: &str) -> Result<(), RegistryError> {
        let mut state = self.lock();
        if !state.sessions.contains_key(id) {
            return Err(RegistryError::SessionNotFound(id.to_string()));
        }
        if !state.supervisor.write(id, text.as_bytes())? {
            return Err(RegistryError::NoTerminal(id.to_string()));
        }
        if text.contains(['\r', '\n']) {
            if let Some(session) = state.sessions.get_mut(id) {
                session.monitor.user_provided_input();
            }
        }
        Ok(())
    }

    /// Resize a session's terminal
    pub fn resize(&self, id: &str, cols: u16, rows: u16) -> Result<(), RegistryError> {
        let state = self.lock();
        match state.supervisor.resize(id, cols, rows) {
            Ok(true) => Ok(()),
            Ok(false) => Err(RegistryError::NoTerminal(id.to_string())),
            Err(e) => Err(RegistryError::Resize(e.to_string())),
        }
    }

    /// Set a session's waiting flag and emit or cancel its notification.
    ///
    /// Emits a request exactly on false→true and a cancel exactly on
    /// true→false; unchanged values are a no-op. Returns whether the value
    /// changed. Use this for manual overrides; the monitor's notified state is
    /// brought in line so it does not later swallow a genuine transition.
    pub fn update_waiting_state(&self, id: &str, waiting: bool) -> Result<bool, RegistryError> {
        self.apply_waiting(id, waiting, true)
    }

    fn apply_waiting(&self, id: &str, waiting: bool, sync_monitor: bool) -> Result<bool, RegistryError> {
        let notification = {
            let mut state = self.lock();
            let session = state
                .sessions
                .get_mut(id)
                .ok_or_else(|| RegistryError::SessionNotFound(id.to_string()))?;
            if sync_monitor {
                session.monitor.sync_notified(waiting);
            }
            if session.is_waiting == waiting {
                return Ok(false);
            }
            session.is_waiting = waiting;
            info!(
                "[agentwatch:registry] {} ({}) is {}",
                session.repo_name,
                id,
                if waiting { "waiting for input" } else { "running" }
            );
            if waiting {
                Notification::Request(NotificationRequest {
                    session_id: session.id.clone(),
                    repo_name: session.repo_name.clone(),
                    group_id: session.group_id,
                })
            } else {
                Notification::Cancel {
                    session_id: session.id.clone(),
                }
            }
        };
        self.shared.notifier.notify(notification);
        Ok(true)
    }

    /// Record that a session's process is gone.
    ///
    /// Stops its monitor and withdraws any waiting notification.
    pub fn mark_exited(&self, id: &str) {
        {
            let mut state = self.lock();
            let Some(session) = state.sessions.get_mut(id) else {
                return;
            };
            if !session.is_running {
                return;
            }
            session.is_running = false;
            session.monitor.shutdown();
            info!("[agentwatch:registry] Session {} terminated", id);
        }
        let _ = self.apply_waiting(id, false, false);
    }

    /// Re-check liveness of every running session.
    ///
    /// PTY-owned sessions use their running flag; others are looked up in
    /// the process table by working directory.
    pub async fn refresh_running(&self) {
        let mut exited = Vec::new();
        let mut external = Vec::new();
        {
            let state = self.lock();
            for session in state.sessions.values().filter(|s| s.is_running) {
                match state.supervisor.is_running(&session.id) {
                    Some(false) => exited.push(session.id.clone()),
                    Some(true) => {}
                    None => external.push((session.id.clone(), session.working_directory.clone())),
                }
            }
        }

        for (id, working_directory) in external {
            let locator = self.shared.locator.clone();
            let alive = tokio::task::spawn_blocking(move || locator.find_pid(&working_directory).is_some())
                .await
                .unwrap_or(true);
            if !alive {
                exited.push(id);
            }
        }

        for id in exited {
            self.mark_exited(&id);
        }
    }

    /// Spawn one session per path as a group
    pub async fn create_session_group(
        &self,
        paths: Vec<PathBuf>,
        layout: GroupLayout,
        broadcast: bool,
    ) -> Result<SessionGroupId, RegistryError> {
        if paths.is_empty() {
            return Err(RegistryError::EmptyGroup);
        }
        let group_id = self.lock().groups.create_group(layout, broadcast);
        info!(
            "[agentwatch:registry] Creating group {} ({} sessions, {})",
            group_id,
            paths.len(),
            layout
        );

        for path in paths {
            let session_id = match self.spawn_session(path.clone(), Some(group_id)).await {
                Ok(id) => id,
                Err(RegistryError::Spawn(e)) => {
                    warn!(
                        "[agentwatch:registry] Group {} member {} failed: {}",
                        group_id,
                        path.display(),
                        e
                    );
                    match self.find_failed_member(&path, group_id) {
                        Some(id) => id,
                        None => continue,
                    }
                }
                Err(e) => return Err(e),
            };
            if !self.lock().groups.add_session(group_id, session_id, path) {
                // Dropped by a concurrent terminate_all_sessions
                return Err(RegistryError::GroupNotFound(group_id));
            }
        }
        Ok(group_id)
    }

    fn find_failed_member(&self, path: &Path, group_id: SessionGroupId) -> Option<SessionId> {
        let state = self.lock();
        state
            .sessions
            .values()
            .filter(|s| s.group_id == Some(group_id) && s.working_directory == path && !s.is_running)
            .max_by_key(|s| s.seq)
            .map(|s| s.id.clone())
    }

    pub fn group(&self, id: SessionGroupId) -> Option<SessionGroup> {
        self.lock().groups.get(id).cloned()
    }

    pub fn groups(&self) -> Vec<SessionGroup> {
        self.lock().groups.groups().into_iter().cloned().collect()
    }

    /// Send the same input to every running member of a group.
    ///
    /// Returns how many sessions received it.
    pub fn broadcast_to_group(&self, id: SessionGroupId, text: &str) -> Result<usize, RegistryError> {
        let members = {
            let state = self.lock();
            if state.groups.get(id).is_none() {
                return Err(RegistryError::GroupNotFound(id));
            }
            state.groups.session_ids_in_group(id)
        };

        let mut delivered = 0;
        for session_id in members {
            match self.send_input(&session_id, text) {
                Ok(()) => delivered += 1,
                Err(e) => debug!(
                    "[agentwatch:registry] Broadcast to {} skipped: {}",
                    session_id, e
                ),
            }
        }
        Ok(delivered)
    }

    /// Wait until every state change queued so far has been applied
    pub async fn flush(&self) {
        let (tx, rx) = oneshot::channel();
        if self.shared.events.send(RegistryEvent::Flush(tx)).is_ok() {
            let _ = rx.await;
        }
    }
}

/// Single consumer of monitor state changes
async fn run_pump(shared: Weak<Shared>, mut rx: UnboundedReceiver<RegistryEvent>) {
    let mut deferred: Vec<StateChange> = Vec::new();

    while let Some(event) = rx.recv().await {
        let Some(strong) = shared.upgrade() else {
            break;
        };
        let registry = SessionRegistry { shared: strong };
        let cleaning = registry.is_cleaning_up();

        match event {
            RegistryEvent::StateChanged(change) if cleaning => deferred.push(change),
            RegistryEvent::StateChanged(change) => registry.apply_change(change),
            RegistryEvent::CleanupFinished if !cleaning => {
                for change in deferred.drain(..) {
                    registry.apply_change(change);
                }
            }
            RegistryEvent::CleanupFinished => {}
            RegistryEvent::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

impl SessionRegistry {
    fn apply_change(&self, change: StateChange) {
        let stale = self.lock().sessions.get(&change.session_id).is_some_and(|s| {
            // Queued before the process exited
            (!s.is_running && change.waiting)
                // Superseded by a manual override or a later commit
                || s.monitor.last_notified() != change.waiting
        });
        if stale {
            debug!(
                "[agentwatch:registry] Skipped stale change for {} (waiting: {})",
                change.session_id, change.waiting
            );
            return;
        }
        if let Err(e) = self.apply_waiting(&change.session_id, change.waiting, false) {
            debug!("[agentwatch:registry] Dropped state change: {}", e);
        }
    }
}

/// Routes PTY reader output into the registry
async fn forward_pty_events(shared: Weak<Shared>, mut rx: UnboundedReceiver<PtyEvent>) {
    while let Some(event) = rx.recv().await {
        let Some(strong) = shared.upgrade() else {
            break;
        };
        let registry = SessionRegistry { shared: strong };
        match event {
            PtyEvent::Output { session_id, text } => {
                let _ = registry.process_output(&session_id, &text);
            }
            PtyEvent::Exited { session_id } => registry.mark_exited(&session_id),
        }
    }
}
