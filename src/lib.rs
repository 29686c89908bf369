//! agentwatch - know when your coding agents need you
//!
//! agentwatch supervises interactive AI coding CLIs (like Claude Code) running
//! in pseudo-terminals and decides, per session, whether the agent is busy or
//! waiting for the user. Two signals feed that decision:
//!
//! 1. **Output**: the terminal stream is buffered, debounced and matched
//!    against known prompt and spinner markers.
//! 2. **Hooks**: lifecycle events the CLI reports itself (`SessionStart`,
//!    `UserPromptSubmit`, `Stop`), which take precedence over output.
//!
//! The [`SessionRegistry`] reconciles both and emits a notification request
//! exactly when a session starts waiting, and a cancel when it stops.

pub mod buffer;
pub mod classifier;
pub mod config;
pub mod domain;
pub mod hooks;
pub mod monitor;
pub mod notify;
pub mod process;
pub mod pty;
pub mod registry;

pub use domain::*;
pub use registry::{RegistryError, SessionRegistry};
