//! Out-of-band lifecycle events emitted by the supervised CLI's hooks

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Hook event kinds the engine reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEventKind {
    /// The CLI started (or resumed) a session and is ready for input
    SessionStart,
    /// The user submitted a prompt; the CLI is now busy
    UserPromptSubmit,
    /// The CLI finished its turn and is waiting again
    Stop,
}

impl HookEventKind {
    /// Parse a hook event name, returning `None` for kinds we do not track
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "SessionStart" => Some(HookEventKind::SessionStart),
            "UserPromptSubmit" => Some(HookEventKind::UserPromptSubmit),
            "Stop" => Some(HookEventKind::Stop),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HookEventKind::SessionStart => "SessionStart",
            HookEventKind::UserPromptSubmit => "UserPromptSubmit",
            HookEventKind::Stop => "Stop",
        }
    }
}

impl std::fmt::Display for HookEventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A hook event routed to the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HookEvent {
    pub kind: HookEventKind,
    /// Working directory reported by the emitting process
    pub working_directory: PathBuf,
    /// Session id assigned by the emitting process, when known
    pub sub_session_id: Option<String>,
}

/// Raw hook payload as written to the hook command's stdin
#[derive(Debug, Deserialize)]
struct HookPayload {
    #[serde(alias = "event", alias = "eventKind")]
    hook_event_name: String,
    #[serde(alias = "working_directory", alias = "workingDirectory")]
    cwd: PathBuf,
    #[serde(default, alias = "sub_session_id", alias = "subSessionId")]
    session_id: Option<String>,
}

impl HookEvent {
    pub fn new(kind: HookEventKind, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            working_directory: working_directory.into(),
            sub_session_id: None,
        }
    }

    /// Attach the emitter's own session id
    pub fn with_sub_session(mut self, sub_session_id: impl Into<String>) -> Self {
        self.sub_session_id = Some(sub_session_id.into());
        self
    }

    /// Parse a JSON hook payload.
    ///
    /// Returns `Ok(None)` for well-formed payloads of event kinds the engine
    /// does not track (e.g. `PreToolUse`).
    pub fn from_json(body: &str) -> Result<Option<Self>, serde_json::Error> {
        let payload: HookPayload = serde_json::from_str(body)?;
        let Some(kind) = HookEventKind::parse(&payload.hook_event_name) else {
            return Ok(None);
        };
        Ok(Some(Self {
            kind,
            working_directory: payload.cwd,
            sub_session_id: payload.session_id.filter(|s| !s.trim().is_empty()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_claude_payload() {
        let body = r#"{"session_id":"abc-123","hook_event_name":"Stop","cwd":"/tmp/proj","transcript_path":"/x"}"#;
        let event = HookEvent::from_json(body).unwrap().unwrap();
        assert_eq!(event.kind, HookEventKind::Stop);
        assert_eq!(event.working_directory, PathBuf::from("/tmp/proj"));
        assert_eq!(event.sub_session_id.as_deref(), Some("abc-123"));
    }

    #[test]
    fn test_untracked_kind_is_ignored() {
        let body = r#"{"hook_event_name":"PreToolUse","cwd":"/tmp/proj"}"#;
        assert_eq!(HookEvent::from_json(body).unwrap(), None);
    }

    #[test]
    fn test_blank_session_id_is_dropped() {
        let body = r#"{"hook_event_name":"SessionStart","cwd":"/tmp/proj","session_id":"  "}"#;
        let event = HookEvent::from_json(body).unwrap().unwrap();
        assert_eq!(event.sub_session_id, None);
    }

    #[test]
    fn test_missing_cwd_is_an_error() {
        assert!(HookEvent::from_json(r#"{"hook_event_name":"Stop"}"#).is_err());
    }
}
