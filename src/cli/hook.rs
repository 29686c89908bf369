//! Hook command: relay a hook payload from the agent CLI to the watcher.
//!
//! Registered as a command hook in the agent's settings. It must never make
//! the agent fail, so every error is logged and swallowed.

use std::io::Read;
use std::path::Path;

use tracing::{debug, warn};

use agentwatch::config::Config;
use agentwatch::hooks::forward_hook;

pub async fn hook_command(config_path: Option<&Path>) {
    let mut payload = String::new();
    if let Err(e) = std::io::stdin().read_to_string(&mut payload) {
        warn!("[agentwatch:hook] Failed to read hook payload: {}", e);
        return;
    }
    if payload.trim().is_empty() {
        debug!("[agentwatch:hook] Empty payload, nothing to forward");
        return;
    }

    let config = Config::load(config_path).unwrap_or_else(|e| {
        warn!("[agentwatch:hook] {:#}; using defaults", e);
        Config::default()
    });
    let port = config.server.port;
    let token = config.server.token().map(str::to_string);

    let result =
        tokio::task::spawn_blocking(move || forward_hook(port, token.as_deref(), &payload)).await;
    match result {
        Ok(Ok(reply)) => debug!("[agentwatch:hook] Watcher replied: {}", reply),
        Ok(Err(e)) => warn!("[agentwatch:hook] Watcher not reachable on port {}: {:#}", port, e),
        Err(e) => warn!("[agentwatch:hook] Forwarding task failed: {}", e),
    }
}
