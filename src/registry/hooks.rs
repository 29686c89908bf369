//! Hook events: lifecycle signals reported by the agent CLI itself.
//!
//! Hooks are authoritative. Each handler first lifts any suppression window
//! that would block its own value, force-sets the monitor, then arms the window
//! that protects that value from output noise.

use std::time::Duration;

use tracing::{debug, info};

use super::matching::{match_session, Candidate};
use super::{Session, SessionRegistry};
use crate::{HookEvent, HookEventKind, SessionId};

impl SessionRegistry {
    /// Apply a hook event to the session it belongs to.
    ///
    /// Returns the matched session id, or `None` when no session matches (the
    /// event is dropped).
    pub fn handle_hook(&self, event: &HookEvent) -> Option<SessionId> {
        let hooks = self.shared.config.hooks.clone();
        let mut state = self.lock();

        let matched = {
            let mut ordered: Vec<&Session> = state.sessions.values().collect();
            ordered.sort_by_key(|s| s.seq);
            let candidates: Vec<Candidate<'_>> = ordered
                .iter()
                .map(|s| Candidate {
                    id: &s.id,
                    working_directory: &s.working_directory,
                    sub_session_id: s.sub_session_id.as_deref(),
                })
                .collect();
            match_session(&candidates, event).map(str::to_string)
        };

        let Some(id) = matched else {
            debug!(
                "[agentwatch:hooks] No session for {} in {}",
                event.kind,
                event.working_directory.display()
            );
            return None;
        };
        let session = state.sessions.get_mut(&id)?;

        info!(
            "[agentwatch:hooks] {} -> {} ({})",
            event.kind, session.repo_name, id
        );
        session.monitor.set_hook_managed();
        if let Some(sub) = &event.sub_session_id {
            if event.kind == HookEventKind::SessionStart || session.sub_session_id.is_none() {
                session.sub_session_id = Some(sub.clone());
            }
        }

        let monitor = &mut session.monitor;
        let transition = match event.kind {
            HookEventKind::SessionStart => {
                monitor.suppress_waiting_detection(Duration::ZERO);
                monitor.force_set_waiting(true)
            }
            HookEventKind::UserPromptSubmit => {
                monitor.suppress_all_detection(Duration::ZERO);
                monitor.clear_buffer();
                let transition = monitor.force_set_waiting(false);
                monitor.suppress_waiting_detection(hooks.prompt_submit_suppress());
                transition
            }
            HookEventKind::Stop => {
                monitor.suppress_waiting_detection(Duration::ZERO);
                let transition = monitor.force_set_waiting(true);
                monitor.suppress_all_detection(hooks.stop_suppress());
                transition
            }
        };
        debug!("[agentwatch:hooks] {} force-set: {:?}", id, transition);
        Some(id)
    }
}
