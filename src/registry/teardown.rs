//! Session and group termination

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use futures::future::join_all;
use tracing::{debug, info, warn};

use super::{RegistryError, RegistryEvent, SessionRegistry};
use crate::pty::PtySession;
use crate::{SessionGroupId, SessionId};

/// Keeps the registry-wide cleanup flag raised while alive
struct CleanupGuard {
    registry: SessionRegistry,
}

impl CleanupGuard {
    fn raise(registry: &SessionRegistry) -> Self {
        registry.shared.cleanup_depth.fetch_add(1, Ordering::SeqCst);
        Self {
            registry: registry.clone(),
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        self.registry.shared.cleanup_depth.fetch_sub(1, Ordering::SeqCst);
        let _ = self.registry.shared.events.send(RegistryEvent::CleanupFinished);
    }
}

/// What to signal for one session
enum Target {
    Pty(PtySession),
    Directory(PathBuf),
}

impl SessionRegistry {
    /// Stop a session's process and remove it from the registry
    pub async fn terminate_session(&self, id: &str) -> Result<(), RegistryError> {
        if !self.lock().sessions.contains_key(id) {
            return Err(RegistryError::SessionNotFound(id.to_string()));
        }
        self.teardown(vec![id.to_string()]).await;
        Ok(())
    }

    /// Stop every session and drop every group. Returns how many were removed.
    pub async fn terminate_all_sessions(&self) -> usize {
        let ids = {
            let mut state = self.lock();
            state.groups.clear();
            let mut sessions: Vec<_> = state.sessions.values().map(|s| (s.seq, s.id.clone())).collect();
            sessions.sort();
            sessions.into_iter().map(|(_, id)| id).collect()
        };
        self.teardown(ids).await
    }

    /// Stop every member of a group.
    ///
    /// The group record is removed first, so a repeated call finds nothing
    /// to do and returns 0.
    pub async fn terminate_group(&self, id: SessionGroupId) -> usize {
        let members = match self.lock().groups.remove_group(id) {
            Some(group) => group.session_ids,
            None => {
                debug!("[agentwatch:registry] Group {} already gone", id);
                return 0;
            }
        };
        info!(
            "[agentwatch:registry] Terminating group {} ({} sessions)",
            id,
            members.len()
        );
        self.teardown(members).await
    }

    async fn teardown(&self, ids: Vec<SessionId>) -> usize {
        let _guard = CleanupGuard::raise(self);

        // Monitors go quiet before any process is touched
        let targets: Vec<(SessionId, Target)> = {
            let mut state = self.lock();
            let mut targets = Vec::with_capacity(ids.len());
            for id in ids {
                let Some(session) = state.sessions.get_mut(&id) else {
                    continue;
                };
                session.monitor.shutdown();
                let directory = session.working_directory.clone();
                let target = match state.supervisor.remove(&id) {
                    Some(pty) => Target::Pty(pty),
                    None => Target::Directory(directory),
                };
                targets.push((id, target));
            }
            targets
        };

        let signals = targets.into_iter().map(|(id, target)| {
            let locator = self.shared.locator.clone();
            async move {
                let signalled = tokio::task::spawn_blocking(move || match target {
                    Target::Pty(pty) => {
                        pty.terminate();
                        true
                    }
                    Target::Directory(directory) => match locator.find_pid(&directory) {
                        Some(pid) => locator.terminate(pid),
                        None => false,
                    },
                })
                .await
                .unwrap_or_else(|e| {
                    warn!("[agentwatch:registry] Termination task failed for {}: {}", id, e);
                    false
                });
                if !signalled {
                    debug!("[agentwatch:registry] No process to signal for {}", id);
                }
                id
            }
        });
        let signalled = join_all(signals).await;

        // Waiting sessions are flipped back before their records go
        for id in &signalled {
            let _ = self.apply_waiting(id, false, false);
        }

        let mut state = self.lock();
        let mut removed = 0;
        for id in signalled {
            if state.sessions.remove(&id).is_none() {
                continue;
            }
            state.groups.remove_session(&id);
            info!("[agentwatch:registry] Terminated session {}", id);
            removed += 1;
        }
        removed
    }
}
