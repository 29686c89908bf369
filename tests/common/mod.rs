//! Shared test utilities for registry integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use agentwatch::config::Config;
use agentwatch::notify::{Notification, Notifier};
use agentwatch::process::ProcessLocator;
use agentwatch::SessionRegistry;

/// Notifier that keeps everything it receives
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }

    pub fn requests_for(&self, session_id: &str) -> usize {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| matches!(n, Notification::Request(r) if r.session_id == session_id))
            .count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) {
        self.sent.lock().unwrap().push(notification);
    }
}

/// Locator with a fixed directory → pid table
#[derive(Default)]
pub struct FakeLocator {
    pids: HashMap<PathBuf, u32>,
    pub terminated: Mutex<Vec<u32>>,
}

impl FakeLocator {
    pub fn with_pid(mut self, dir: impl Into<PathBuf>, pid: u32) -> Self {
        self.pids.insert(dir.into(), pid);
        self
    }
}

impl ProcessLocator for FakeLocator {
    fn find_pid(&self, working_directory: &Path) -> Option<u32> {
        self.pids.get(working_directory).copied()
    }

    fn terminate(&self, pid: u32) -> bool {
        self.terminated.lock().unwrap().push(pid);
        true
    }
}

/// Config with short timers
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.monitor.debounce_ms = 100;
    config.monitor.hook_managed_debounce_ms = 100;
    config.hooks.prompt_submit_suppress_ms = 300;
    config.hooks.stop_suppress_ms = 300;
    config
}

pub fn registry_with(
    config: Config,
    locator: FakeLocator,
) -> (SessionRegistry, Arc<RecordingNotifier>, Arc<FakeLocator>) {
    let notifier = Arc::new(RecordingNotifier::default());
    let locator = Arc::new(locator);
    let registry = SessionRegistry::new(config, notifier.clone(), locator.clone());
    (registry, notifier, locator)
}

/// Poll `check` until it holds or `timeout` passes
pub async fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
