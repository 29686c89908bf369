//! Watch command: spawn agent sessions and report when they wait for input

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use agentwatch::config::Config;
use agentwatch::hooks::start_hook_server;
use agentwatch::notify::{ChannelNotifier, Notification};
use agentwatch::process::SystemProcessLocator;
use agentwatch::{GroupLayout, SessionGroupId, SessionId, SessionInfo, SessionRegistry};

const LIVENESS_INTERVAL: Duration = Duration::from_secs(5);

/// Where stdin lines go
enum InputTarget {
    Session(SessionId),
    Group {
        id: SessionGroupId,
        broadcast: bool,
    },
}

pub async fn watch_command(
    config_path: Option<&Path>,
    paths: Vec<PathBuf>,
    layout: GroupLayout,
    broadcast: bool,
) -> Result<()> {
    let config = Config::load(config_path)?;
    let paths = resolve_paths(paths)?;

    let (notify_tx, mut notifications) = mpsc::unbounded_channel();
    let registry = SessionRegistry::new(
        config.clone(),
        Arc::new(ChannelNotifier::new(notify_tx)),
        Arc::new(SystemProcessLocator::new(config.agent.binary.clone())),
    );

    let _server = match start_hook_server(
        registry.clone(),
        config.server.port,
        config.server.token().map(str::to_string),
    ) {
        Ok(server) => Some(server),
        Err(e) => {
            warn!("[agentwatch:watch] {:#}; continuing with output detection only", e);
            None
        }
    };

    let target = if paths.len() == 1 {
        let id = registry
            .spawn_session(paths[0].clone(), None)
            .await
            .with_context(|| format!("Failed to start {}", config.agent.binary))?;
        InputTarget::Session(id)
    } else {
        let id = registry
            .create_session_group(paths, layout, broadcast)
            .await
            .context("Failed to start session group")?;
        InputTarget::Group { id, broadcast }
    };

    for session in registry.sessions() {
        let status = if session.is_running { "started" } else { "failed" };
        println!(
            "{} {} ({})",
            status,
            session.repo_name,
            session.working_directory.display()
        );
    }

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut liveness = tokio::time::interval(LIVENESS_INTERVAL);
    let interrupted = tokio::signal::ctrl_c();
    tokio::pin!(interrupted);

    loop {
        tokio::select! {
            _ = &mut interrupted => {
                info!("[agentwatch:watch] Interrupted");
                break;
            }
            Some(notification) = notifications.recv() => {
                print_notification(&registry, &notification);
            }
            line = stdin.next_line(), if stdin_open => match line {
                Ok(Some(line)) => forward_input(&registry, &target, &line),
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!("[agentwatch:watch] stdin closed: {}", e);
                    stdin_open = false;
                }
            },
            _ = liveness.tick() => {
                registry.refresh_running().await;
                if registry.sessions().iter().all(|s| !s.is_running) {
                    info!("[agentwatch:watch] All sessions exited");
                    break;
                }
            }
        }
    }

    let terminated = registry.terminate_all_sessions().await;
    info!("[agentwatch:watch] Terminated {} session(s)", terminated);
    Ok(())
}

fn resolve_paths(paths: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    if paths.is_empty() {
        return Ok(vec![std::env::current_dir().context("Failed to read current directory")?]);
    }
    // Canonical paths so hook cwd reports compare equal
    Ok(paths
        .into_iter()
        .map(|p| std::fs::canonicalize(&p).unwrap_or(p))
        .collect())
}

fn print_notification(registry: &SessionRegistry, notification: &Notification) {
    match notification {
        Notification::Request(req) => match req.group_id {
            Some(group) => println!("waiting {} (group {})", req.repo_name, group),
            None => println!("waiting {}", req.repo_name),
        },
        Notification::Cancel { session_id } => {
            if let Some(session) = registry.session(session_id) {
                println!("busy    {}", session.repo_name);
            }
        }
    }
}

fn forward_input(registry: &SessionRegistry, target: &InputTarget, line: &str) {
    let text = format!("{}\r", line);
    let result = match target {
        InputTarget::Session(id) => registry.send_input(id, &text),
        InputTarget::Group { id, broadcast: true } => {
            registry.broadcast_to_group(*id, &text).map(|_| ())
        }
        InputTarget::Group { .. } => match pick_waiting(&registry.sessions()) {
            Some(id) => registry.send_input(&id, &text),
            None => {
                warn!("[agentwatch:watch] No session is waiting; input dropped");
                Ok(())
            }
        },
    };
    if let Err(e) = result {
        warn!("[agentwatch:watch] Failed to send input: {}", e);
    }
}

/// The longest-registered running session that is waiting for input
fn pick_waiting(sessions: &[SessionInfo]) -> Option<SessionId> {
    sessions
        .iter()
        .find(|s| s.is_running && s.is_waiting)
        .map(|s| s.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn info(id: &str, running: bool, waiting: bool) -> SessionInfo {
        SessionInfo {
            id: id.into(),
            working_directory: PathBuf::from("/work").join(id),
            repo_name: id.into(),
            sub_session_id: None,
            is_running: running,
            is_waiting: waiting,
            group_id: Some(1),
            hook_managed: false,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_pick_waiting_prefers_first_waiting_running_session() {
        let sessions = vec![
            info("a", true, false),
            info("b", false, true),
            info("c", true, true),
            info("d", true, true),
        ];
        assert_eq!(pick_waiting(&sessions).as_deref(), Some("c"));
        assert_eq!(pick_waiting(&sessions[..2]), None);
    }

    #[test]
    fn test_resolve_paths_defaults_to_cwd() {
        let paths = resolve_paths(Vec::new()).unwrap();
        assert_eq!(paths, vec![std::env::current_dir().unwrap()]);
    }
}
