//! Local HTTP channel carrying agent CLI hook events into the registry.
//!
//! The agent CLI runs `agentwatch hook` from its hook configuration; that
//! command forwards the JSON payload to the watcher's server on localhost.

mod client;
mod server;

pub use client::{forward_hook, ping};
pub use server::{start_hook_server, HookServer};

/// Shared-secret header checked when a token is configured
pub const AUTH_HEADER: &str = "X-Agentwatch-Token";

/// Largest accepted hook payload
pub const MAX_BODY_BYTES: usize = 256 * 1024;
