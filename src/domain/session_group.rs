//! Session groups for coordinated multi-session launches
//!
//! A SessionGroup is a set of sessions started together (one per path) that
//! share a window layout and can optionally receive broadcast input.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::SessionId;

/// Unique identifier for a session group
pub type SessionGroupId = u64;

/// How the sessions of a group are laid out by the presenting UI
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupLayout {
    /// One tab per session
    #[default]
    Tabs,
    /// Side by side
    Horizontal,
    /// Stacked
    Vertical,
    /// Tiled grid
    Grid,
}

impl GroupLayout {
    /// Get the layout as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupLayout::Tabs => "tabs",
            GroupLayout::Horizontal => "horizontal",
            GroupLayout::Vertical => "vertical",
            GroupLayout::Grid => "grid",
        }
    }
}

impl std::fmt::Display for GroupLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for GroupLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "tabs" => Ok(GroupLayout::Tabs),
            "horizontal" => Ok(GroupLayout::Horizontal),
            "vertical" => Ok(GroupLayout::Vertical),
            "grid" => Ok(GroupLayout::Grid),
            other => Err(format!("unknown layout: {}", other)),
        }
    }
}

/// A set of sessions launched together
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionGroup {
    /// Unique identifier for this group
    pub id: SessionGroupId,

    /// Member sessions, in launch order
    pub session_ids: Vec<SessionId>,

    /// Working directories, in the same order as `session_ids`
    pub paths: Vec<PathBuf>,

    /// Layout requested for the group
    pub layout: GroupLayout,

    /// Whether input typed into the group is sent to every member
    pub broadcast: bool,

    /// When this group was created
    pub created_at: DateTime<Utc>,
}

impl SessionGroup {
    /// Create an empty group
    pub fn new(id: SessionGroupId, layout: GroupLayout, broadcast: bool) -> Self {
        Self {
            id,
            session_ids: Vec::new(),
            paths: Vec::new(),
            layout,
            broadcast,
            created_at: Utc::now(),
        }
    }

    /// Add a session to this group
    pub fn add_session(&mut self, session_id: SessionId, path: PathBuf) {
        self.session_ids.push(session_id);
        self.paths.push(path);
    }

    /// Get the number of sessions in this group
    pub fn session_count(&self) -> usize {
        self.session_ids.len()
    }

    /// Check whether a session belongs to this group
    pub fn contains(&self, session_id: &str) -> bool {
        self.session_ids.iter().any(|id| id == session_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_parse() {
        assert_eq!("Grid".parse::<GroupLayout>(), Ok(GroupLayout::Grid));
        assert_eq!(" tabs ".parse::<GroupLayout>(), Ok(GroupLayout::Tabs));
        assert!("diagonal".parse::<GroupLayout>().is_err());
    }

    #[test]
    fn test_add_session_keeps_order() {
        let mut group = SessionGroup::new(7, GroupLayout::Vertical, true);
        group.add_session("a".into(), PathBuf::from("/tmp/a"));
        group.add_session("b".into(), PathBuf::from("/tmp/b"));

        assert_eq!(group.session_count(), 2);
        assert_eq!(group.session_ids, vec!["a".to_string(), "b".to_string()]);
        assert!(group.contains("b"));
        assert!(!group.contains("c"));
    }
}
