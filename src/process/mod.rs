//! OS process lookup and signalling for supervised agent CLIs.
//!
//! Sessions registered from outside (not spawned by us) only carry a working
//! directory, so termination has to find the process by scanning the process
//! table and comparing each candidate's cwd. Every failure here degrades to
//! "no such process" instead of an error.

use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Finds and signals supervised processes
pub trait ProcessLocator: Send + Sync {
    /// Pid of the supervised binary running in `working_directory`
    fn find_pid(&self, working_directory: &Path) -> Option<u32>;

    /// Send a graceful termination signal. Returns whether it was delivered.
    fn terminate(&self, pid: u32) -> bool;
}

/// Locator backed by `ps` and `/proc` (or `lsof` where there is no procfs)
#[derive(Debug, Clone)]
pub struct SystemProcessLocator {
    binary_name: String,
}

impl SystemProcessLocator {
    pub fn new(binary_name: impl Into<String>) -> Self {
        Self {
            binary_name: binary_name.into(),
        }
    }

    pub fn binary_name(&self) -> &str {
        &self.binary_name
    }
}

impl ProcessLocator for SystemProcessLocator {
    fn find_pid(&self, working_directory: &Path) -> Option<u32> {
        let output = Command::new("ps")
            .args(["-axo", "pid=,command="])
            .output()
            .map_err(|e| warn!("[agentwatch:process] Failed to run ps: {}", e))
            .ok()?;
        if !output.status.success() {
            warn!("[agentwatch:process] ps exited with {}", output.status);
            return None;
        }

        let listing = String::from_utf8_lossy(&output.stdout);
        let pid = parse_process_list(&listing, &self.binary_name)
            .into_iter()
            .find(|pid| process_cwd(*pid).as_deref() == Some(working_directory));

        debug!(
            "[agentwatch:process] {} in {} -> {:?}",
            self.binary_name,
            working_directory.display(),
            pid
        );
        pid
    }

    fn terminate(&self, pid: u32) -> bool {
        send_terminate(pid)
    }
}

/// Send SIGTERM to `pid`.
///
/// Pid 0 would address the whole process group and is refused.
pub fn send_terminate(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }

    #[cfg(unix)]
    {
        let Ok(pid) = i32::try_from(pid) else {
            return false;
        };
        let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
        rc == 0
    }

    #[cfg(not(unix))]
    {
        let _ = pid;
        false
    }
}

/// Extract pids whose command line runs `binary`.
///
/// Accepts the `pid command...` listing printed by `ps -axo pid=,command=`.
/// Script launchers (`node /usr/lib/.../claude`) are matched on their second
/// token.
pub fn parse_process_list(listing: &str, binary: &str) -> Vec<u32> {
    listing
        .lines()
        .filter_map(|line| {
            let line = line.trim_start();
            let (pid, command) = line.split_once(char::is_whitespace)?;
            let pid = pid.parse::<u32>().ok()?;
            command_runs_binary(command.trim(), binary).then_some(pid)
        })
        .collect()
}

fn command_runs_binary(command: &str, binary: &str) -> bool {
    let mut tokens = command.split_whitespace();
    let Some(first) = tokens.next() else {
        return false;
    };
    if basename(first) == binary {
        return true;
    }
    matches!(basename(first), "node" | "bun" | "deno")
        && tokens.next().map(basename) == Some(binary)
}

fn basename(token: &str) -> &str {
    token.rsplit('/').next().unwrap_or(token)
}

/// Current working directory of `pid`
pub fn process_cwd(pid: u32) -> Option<PathBuf> {
    if let Ok(path) = std::fs::read_link(format!("/proc/{}/cwd", pid)) {
        return Some(path);
    }

    let output = Command::new("lsof")
        .args(["-a", "-p", &pid.to_string(), "-d", "cwd", "-Fn"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    parse_lsof_cwd(&String::from_utf8_lossy(&output.stdout))
}

/// Parse the `n<path>` record out of `lsof -Fn` field output
pub fn parse_lsof_cwd(output: &str) -> Option<PathBuf> {
    output
        .lines()
        .find_map(|line| line.strip_prefix('n'))
        .filter(|path| !path.is_empty())
        .map(PathBuf::from)
}
