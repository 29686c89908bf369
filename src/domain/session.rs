//! Supervised session snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::SessionGroupId;

/// Opaque identifier of a supervised session, stable for the process lifetime
pub type SessionId = String;

/// Point-in-time view of one supervised session.
///
/// The registry hands these out by value; mutating a snapshot has no effect
/// on the live session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Session identifier
    pub id: SessionId,

    /// Directory the supervised CLI runs in
    pub working_directory: PathBuf,

    /// Final path component of `working_directory`, used in notifications
    pub repo_name: String,

    /// Session id reported by the CLI itself through its hooks
    pub sub_session_id: Option<String>,

    /// Whether the underlying process is still alive
    pub is_running: bool,

    /// Whether the CLI is idle and waiting for user input
    pub is_waiting: bool,

    /// Group this session was launched with (if any)
    pub group_id: Option<SessionGroupId>,

    /// Whether a hook event has ever been received for this session
    pub hook_managed: bool,

    /// When the session was registered
    pub created_at: DateTime<Utc>,
}

/// Repository name shown for a working directory (its last path component).
///
/// Falls back to the full path for roots like `/`.
pub fn repo_name_for(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repo_name_for() {
        assert_eq!(repo_name_for(Path::new("/tmp/proj")), "proj");
        assert_eq!(repo_name_for(Path::new("/tmp/proj/")), "proj");
        assert_eq!(repo_name_for(Path::new("/")), "/");
    }
}
