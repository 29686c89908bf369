//! Core domain types for agentwatch

mod hook;
mod session;
mod session_group;

pub use hook::{HookEvent, HookEventKind};
pub use session::{repo_name_for, SessionId, SessionInfo};
pub use session_group::{GroupLayout, SessionGroup, SessionGroupId};
