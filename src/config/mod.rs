//! Configuration loading and management

mod io;

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use io::DEFAULT_CONFIG;

/// Main configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Agent CLI launched for each session
    #[serde(default)]
    pub agent: AgentSettings,

    /// Output monitoring settings
    #[serde(default)]
    pub monitor: MonitorSettings,

    /// Hook reconciliation settings
    #[serde(default)]
    pub hooks: HookSettings,

    /// Local hook intake server
    #[serde(default)]
    pub server: ServerSettings,
}

/// The interactive CLI to supervise
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Binary to launch (also the process name searched for on termination)
    #[serde(default = "default_binary")]
    pub binary: String,

    /// Extra arguments passed on every launch
    #[serde(default)]
    pub args: Vec<String>,

    /// Environment variables for the spawned process
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Per-session output monitor tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorSettings {
    /// Characters of recent output kept per session
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Quiet period before output is classified
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Quiet period once hooks are known to work for a session
    #[serde(default = "default_hook_managed_debounce_ms")]
    pub hook_managed_debounce_ms: u64,

    /// Characters kept after the user submits input
    #[serde(default = "default_input_tail_chars")]
    pub input_tail_chars: usize,
}

/// Suppression windows opened by hook events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookSettings {
    /// After UserPromptSubmit, ignore output that looks like waiting
    #[serde(default = "default_prompt_submit_suppress_ms")]
    pub prompt_submit_suppress_ms: u64,

    /// After Stop, ignore all output-based transitions
    #[serde(default = "default_stop_suppress_ms")]
    pub stop_suppress_ms: u64,
}

/// Hook intake HTTP server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Optional shared secret sent as `X-Agentwatch-Token`
    #[serde(default)]
    pub token: String,
}

fn default_binary() -> String {
    "claude".to_string()
}

fn default_buffer_capacity() -> usize {
    2000
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_hook_managed_debounce_ms() -> u64 {
    2000
}

fn default_input_tail_chars() -> usize {
    50
}

fn default_prompt_submit_suppress_ms() -> u64 {
    3000
}

fn default_stop_suppress_ms() -> u64 {
    1500
}

fn default_port() -> u16 {
    7862
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            args: Vec::new(),
            env: HashMap::new(),
        }
    }
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            buffer_capacity: default_buffer_capacity(),
            debounce_ms: default_debounce_ms(),
            hook_managed_debounce_ms: default_hook_managed_debounce_ms(),
            input_tail_chars: default_input_tail_chars(),
        }
    }
}

impl Default for HookSettings {
    fn default() -> Self {
        Self {
            prompt_submit_suppress_ms: default_prompt_submit_suppress_ms(),
            stop_suppress_ms: default_stop_suppress_ms(),
        }
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            token: String::new(),
        }
    }
}

impl MonitorSettings {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn hook_managed_debounce(&self) -> Duration {
        Duration::from_millis(self.hook_managed_debounce_ms)
    }
}

impl HookSettings {
    pub fn prompt_submit_suppress(&self) -> Duration {
        Duration::from_millis(self.prompt_submit_suppress_ms)
    }

    pub fn stop_suppress(&self) -> Duration {
        Duration::from_millis(self.stop_suppress_ms)
    }
}

impl ServerSettings {
    /// Token, if one is configured
    pub fn token(&self) -> Option<&str> {
        Some(self.token.as_str()).filter(|t| !t.trim().is_empty())
    }
}
