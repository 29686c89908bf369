//! Configuration file I/O operations

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::Config;

/// Default configuration content for `agentwatch init`
pub const DEFAULT_CONFIG: &str = r#"# agentwatch configuration
# =======================
#
# agentwatch runs interactive coding CLIs in pseudo-terminals and tracks
# whether each one is busy or waiting for you.

# ============================================================================
# AGENT - The CLI launched for every session
# ============================================================================
#
#   binary  - Executable to launch; also the process name searched for when
#             terminating sessions that were started outside agentwatch
#   args    - Extra arguments for every launch
#   env     - Extra environment variables

[agent]
binary = "claude"
args = []

[agent.env]

# ============================================================================
# MONITOR - Output-based readiness detection
# ============================================================================
#
#   buffer_capacity           - Characters of recent output kept per session
#   debounce_ms               - Quiet period before output is classified
#   hook_managed_debounce_ms  - Quiet period once hook events have been seen
#   input_tail_chars          - Characters kept after you submit input

[monitor]
buffer_capacity = 2000
debounce_ms = 500
hook_managed_debounce_ms = 2000
input_tail_chars = 50

# ============================================================================
# HOOKS - Reconciliation with the CLI's own lifecycle events
# ============================================================================
#
# Point the CLI's SessionStart, UserPromptSubmit and Stop hooks at
# `agentwatch hook`.
#
#   prompt_submit_suppress_ms - After a prompt is submitted, ignore output
#                               that looks like a waiting prompt
#   stop_suppress_ms          - After Stop, ignore all output-based changes

[hooks]
prompt_submit_suppress_ms = 3000
stop_suppress_ms = 1500

# ============================================================================
# SERVER - Local endpoint receiving hook events
# ============================================================================

[server]
port = 7862
# Optional shared secret (sent as `X-Agentwatch-Token`); empty disables auth
token = ""
"#;

impl Config {
    /// Get the global config directory path (~/.agentwatch/)
    pub fn global_config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".agentwatch")
    }

    /// Get the global config file path (~/.agentwatch/config.toml)
    pub fn global_config_path() -> PathBuf {
        Self::global_config_dir().join("config.toml")
    }

    /// Load configuration from a file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load the config at `path`, or the global config when `None`.
    ///
    /// A missing global config is not an error; defaults are used instead.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => {
                let global_path = Self::global_config_path();
                if global_path.exists() {
                    Self::from_file(&global_path)
                } else {
                    tracing::debug!(
                        "No config at {}, using defaults",
                        global_path.display()
                    );
                    Ok(Self::default())
                }
            }
        }
    }

    /// Serialize and write the config to `path`, creating parent directories
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}
