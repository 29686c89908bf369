//! End-to-end registry behaviour with real timers and, on unix, real PTYs

mod common;

use std::time::Duration;

use agentwatch::config::Config;
use agentwatch::notify::Notification;
use agentwatch::{GroupLayout, HookEvent, HookEventKind};
use common::{fast_config, registry_with, wait_until, FakeLocator};
use tempfile::TempDir;

const PROMPT: &str = "Do you want to make this edit? ❯ 1. Yes  2. No";

#[tokio::test]
async fn test_hook_and_output_reconciliation() {
    let (registry, notifier, _) = registry_with(fast_config(), FakeLocator::default());
    registry.register_session("s1", "/work/app", None).unwrap();

    registry.process_output("s1", PROMPT).unwrap();
    assert!(
        wait_until(Duration::from_secs(2), || registry.session("s1").unwrap().is_waiting).await
    );

    registry.handle_hook(&HookEvent::new(HookEventKind::UserPromptSubmit, "/work/app"));
    registry.flush().await;
    assert!(!registry.session("s1").unwrap().is_waiting);

    // Prompt-like output right after submit is ignored
    registry.process_output("s1", PROMPT).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    registry.flush().await;
    assert!(!registry.session("s1").unwrap().is_waiting);

    registry.handle_hook(&HookEvent::new(HookEventKind::Stop, "/work/app"));
    registry.flush().await;
    assert!(registry.session("s1").unwrap().is_waiting);

    let sent = notifier.take();
    let kinds: Vec<bool> = sent
        .iter()
        .map(|n| matches!(n, Notification::Request(_)))
        .collect();
    assert_eq!(kinds, vec![true, false, true]);
}

#[tokio::test]
async fn test_no_notification_after_teardown() {
    let (registry, notifier, _) = registry_with(fast_config(), FakeLocator::default());
    for i in 0..16 {
        let id = format!("s{}", i);
        registry
            .register_session(id.clone(), format!("/work/p{}", i), None)
            .unwrap();
        registry.process_output(&id, PROMPT).unwrap();
    }

    tokio::time::sleep(Duration::from_millis(95)).await;
    assert_eq!(registry.terminate_all_sessions().await, 16);
    notifier.take();

    tokio::time::sleep(Duration::from_millis(300)).await;
    registry.flush().await;
    assert!(registry.sessions().is_empty());
    assert!(notifier.take().is_empty());
}

#[tokio::test]
async fn test_group_termination_signals_members() {
    let (registry, _notifier, locator) = registry_with(
        fast_config(),
        FakeLocator::default().with_pid("/work/a", 11).with_pid("/work/b", 12),
    );
    registry.register_session("a", "/work/a", None).unwrap();
    registry.register_session("b", "/work/b", None).unwrap();
    registry.update_waiting_state("a", true).unwrap();

    assert_eq!(registry.terminate_all_sessions().await, 2);
    let mut terminated = locator.terminated.lock().unwrap().clone();
    terminated.sort();
    assert_eq!(terminated, vec![11, 12]);
}

#[test]
fn test_partial_config_file_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[agent]\nbinary = \"codex\"\n\n[monitor]\ndebounce_ms = 250\n",
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.agent.binary, "codex");
    assert_eq!(config.monitor.debounce(), Duration::from_millis(250));
    assert_eq!(config.monitor.hook_managed_debounce_ms, 2000);
    assert_eq!(config.server.port, 7862);
    assert!(config.server.token().is_none());
}

#[cfg(unix)]
mod pty {
    use super::*;

    fn shell_config(script: &str) -> Config {
        let mut config = fast_config();
        config.agent.binary = "sh".into();
        config.agent.args = vec!["-c".into(), script.into()];
        config
    }

    #[tokio::test]
    async fn test_spawned_session_round_trip() {
        let config = shell_config(
            "printf 'Do you want to continue? (y/n) '; read answer; echo \"got $answer\"; sleep 0.2",
        );
        let (registry, notifier, _) = registry_with(config, FakeLocator::default());
        let dir = TempDir::new().unwrap();

        let id = registry.spawn_session(dir.path(), None).await.unwrap();
        assert!(
            wait_until(Duration::from_secs(5), || registry.session(&id).unwrap().is_waiting).await
        );
        assert_eq!(notifier.requests_for(&id), 1);

        registry.send_input(&id, "y\r").unwrap();
        registry.flush().await;
        assert!(!registry.session(&id).unwrap().is_waiting);

        assert!(
            wait_until(Duration::from_secs(5), || !registry.session(&id).unwrap().is_running).await
        );
        registry.flush().await;
        let session = registry.session(&id).unwrap();
        assert!(!session.is_waiting);
        assert!(registry.terminal_output(&id).unwrap().contains("got y"));
    }

    #[tokio::test]
    async fn test_group_broadcast_reaches_every_member() {
        let (registry, _notifier, _) = registry_with(shell_config("cat"), FakeLocator::default());
        let root = TempDir::new().unwrap();
        let paths = vec![root.path().join("one"), root.path().join("two")];
        for path in &paths {
            std::fs::create_dir(path).unwrap();
        }

        let group = registry
            .create_session_group(paths, GroupLayout::Vertical, true)
            .await
            .unwrap();
        let members = registry.group(group).unwrap().session_ids;
        assert_eq!(members.len(), 2);

        assert_eq!(registry.broadcast_to_group(group, "hello\r").unwrap(), 2);
        for id in &members {
            assert!(
                wait_until(Duration::from_secs(5), || {
                    registry
                        .terminal_output(id)
                        .is_some_and(|out| out.contains("hello"))
                })
                .await
            );
        }

        assert_eq!(registry.terminate_group(group).await, 2);
        assert_eq!(registry.terminate_group(group).await, 0);
        assert!(registry.sessions().is_empty());
    }
}
