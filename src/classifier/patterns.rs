//! Lexical cue tables for agent output classification.
//!
//! Order matters only for readability of debug logs: busy markers are always
//! evaluated before ready markers and any busy hit wins.

use once_cell::sync::Lazy;
use regex::Regex;

/// Substrings that mean the agent is actively working
pub const BUSY_MARKERS: &[&str] = &[
    // Claude Code spinner glyphs
    "✻",
    "✽",
    "✶",
    "✳",
    "✢",
    // Braille spinner frames used by most Node CLIs
    "⠋",
    "⠙",
    "⠹",
    "⠸",
    "⠼",
    "⠴",
    "⠦",
    "⠧",
    "⠇",
    "⠏",
    "Thinking…",
    "Thinking...",
    "Loading…",
    "Loading...",
    "esc to interrupt",
    "Reading",
    "Writing",
    "Editing",
];

/// Substrings that mean the agent is idle and expects input
pub const READY_MARKERS: &[&str] = &[
    // Prompt glyph of the input box
    "❯",
    "(y/n)",
    "[y/N]",
    "[Y/n]",
    "(yes/no)",
    "Do you want to",
    "Would you like to",
    "Continue?",
    "Proceed?",
    "Press Enter",
];

/// Line-anchored ready markers
pub static READY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Suggestion line shown in an empty input box: `Try "fix lint errors"`
        Regex::new(r#"(?m)^[>\s]*Try ""#).unwrap(),
        // Generic `> ` prompt at the start of a line
        Regex::new(r"(?m)(?:^|\r)> ").unwrap(),
    ]
});

/// Phrases printed when a task has finished
pub const COMPLETION_MARKERS: &[&str] = &["Done", "Completed", "Finished", "Task complete", "✓"];

/// Tool call line: `⏺ Read(src/main.rs)`
pub static TOOL_INVOCATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[⏺●]\s*([A-Z][A-Za-z0-9_]*)\(([^)\n]*)\)").unwrap());
