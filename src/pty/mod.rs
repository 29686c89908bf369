//! Pseudo-terminal plumbing for supervised agent processes
//!
//! [`PtySession`] wraps one child process attached to a PTY and streams its
//! output as [`PtyEvent`]s. [`ProcessSupervisor`] owns all of them.

mod session;
mod supervisor;

pub use session::{PtyEvent, PtySession, SpawnError};
pub use supervisor::ProcessSupervisor;
