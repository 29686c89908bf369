//! Output classification for agent terminal streams.
//!
//! Stateless helpers that turn a window of raw PTY output into a readiness
//! signal. Everything here is a pure function of its input so the monitor can
//! re-run it on every debounce expiry without bookkeeping.
//!
//! Only the last [`LOOKBACK_CHARS`] characters of the control-stripped text
//! are considered, so a prompt that scrolled away long ago cannot flip the
//! state back to waiting.

mod patterns;

use serde::{Deserialize, Serialize};

use patterns::{
    BUSY_MARKERS, COMPLETION_MARKERS, READY_MARKERS, READY_PATTERNS, TOOL_INVOCATION,
};

/// Number of trailing characters inspected by the classifiers
pub const LOOKBACK_CHARS: usize = 500;

/// Coarse activity derived from a window of output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    /// A busy marker is visible
    Busy,
    /// A ready marker is visible and nothing is busy
    Waiting,
    /// No cue either way
    Neutral,
}

/// A tool call announced in the agent's output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Tool name, e.g. `Read`
    pub name: String,
    /// Argument shown between the parentheses, e.g. a file path
    pub target: String,
}

/// Strip ANSI escape sequences from a string.
///
/// Removes CSI sequences (`ESC [` ... final byte) and OSC sequences
/// (`ESC ]` ... `BEL` or `ESC \`). An unterminated sequence swallows the rest
/// of the input, which is what a terminal would do with a truncated chunk.
/// Every other character, including a lone `ESC`, is kept.
pub fn strip_control_sequences(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '\x1b' {
            result.push(c);
            continue;
        }

        match chars.peek() {
            Some('[') => {
                chars.next();
                // Parameter and intermediate bytes run until a final byte in 0x40..=0x7E
                for next in chars.by_ref() {
                    if ('\x40'..='\x7e').contains(&next) {
                        break;
                    }
                }
            }
            Some(']') => {
                chars.next();
                while let Some(next) = chars.next() {
                    if next == '\x07' {
                        break;
                    }
                    if next == '\x1b' {
                        if chars.peek() == Some(&'\\') {
                            chars.next();
                        }
                        break;
                    }
                }
            }
            _ => result.push(c),
        }
    }

    result
}

/// The last `max_chars` characters of `text` (char-boundary safe)
pub fn tail_chars(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return "";
    }
    match text.char_indices().rev().nth(max_chars - 1) {
        Some((idx, _)) => &text[idx..],
        None => text,
    }
}

fn lookback_window(buffer: &str) -> String {
    let stripped = strip_control_sequences(buffer);
    tail_chars(&stripped, LOOKBACK_CHARS).to_string()
}

fn has_busy_marker(window: &str) -> bool {
    BUSY_MARKERS.iter().any(|marker| window.contains(marker))
}

fn has_ready_marker(window: &str) -> bool {
    READY_MARKERS.iter().any(|marker| window.contains(marker))
        || READY_PATTERNS.iter().any(|re| re.is_match(window))
}

fn classify_window(window: &str) -> Activity {
    if window.trim().is_empty() {
        return Activity::Neutral;
    }
    if has_busy_marker(window) {
        return Activity::Busy;
    }
    if has_ready_marker(window) {
        return Activity::Waiting;
    }
    Activity::Neutral
}

/// Classify the trailing window of a raw output buffer
pub fn classify(buffer: &str) -> Activity {
    classify_window(&lookback_window(buffer))
}

/// Whether the agent appears to be waiting for user input.
///
/// Busy markers take precedence over ready markers: `"Thinking...\n❯ "` is
/// not waiting. Empty or whitespace-only input is not waiting.
pub fn classify_waiting(buffer: &str) -> bool {
    classify(buffer) == Activity::Waiting
}

/// Whether the agent appears to have finished its task
pub fn classify_complete(buffer: &str) -> bool {
    let window = lookback_window(buffer);
    has_ready_marker(&window) || COMPLETION_MARKERS.iter().any(|m| window.contains(m))
}

/// Find the most recent tool call line (`⏺ Name(target)`) in the output
pub fn detect_tool_invocation(text: &str) -> Option<ToolInvocation> {
    let stripped = strip_control_sequences(text);
    TOOL_INVOCATION
        .captures_iter(&stripped)
        .last()
        .map(|caps| ToolInvocation {
            name: caps[1].to_string(),
            target: caps[2].trim().to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_sgr() {
        assert_eq!(
            strip_control_sequences("\x1B[32mGreen text\x1B[0m"),
            "Green text"
        );
    }

    #[test]
    fn test_strip_cursor_and_osc() {
        let raw = "\x1b]0;claude - proj\x07\x1b[2K\x1b[1Ghello\x1b]8;;http://x\x1b\\link";
        assert_eq!(strip_control_sequences(raw), "hellolink");
    }

    #[test]
    fn test_strip_keeps_plain_text_and_lone_escape() {
        assert_eq!(strip_control_sequences("a\x1bb\r\n"), "a\x1bb\r\n");
        assert_eq!(strip_control_sequences("❯ ready"), "❯ ready");
    }

    #[test]
    fn test_strip_unterminated_csi() {
        assert_eq!(strip_control_sequences("text\x1b[38;5"), "text");
    }

    #[test]
    fn test_tail_chars_multibyte() {
        assert_eq!(tail_chars("ab❯cd", 3), "❯cd");
        assert_eq!(tail_chars("ab", 10), "ab");
        assert_eq!(tail_chars("ab", 0), "");
    }

    #[test]
    fn test_busy_beats_ready() {
        assert!(!classify_waiting("Thinking...\n❯ "));
        assert!(!classify_waiting("Do you want to proceed? (y/n)\n✻ Reticulating…"));
        assert_eq!(classify("Thinking...\n❯ "), Activity::Busy);
    }

    #[test]
    fn test_ready_markers() {
        assert!(classify_waiting("Do you want to proceed? (y/n)"));
        assert!(classify_waiting("╭────╮\n│ ❯ \n╰────╯"));
        assert!(classify_waiting("> Try \"write a test for lib.rs\""));
        assert!(classify_waiting("Overwrite file? [y/N]"));
        assert!(classify_waiting("Press Enter to continue"));
        assert!(classify_waiting("output line\n> "));
    }

    #[test]
    fn test_ready_marker_through_ansi() {
        assert!(classify_waiting("\x1b[1m\x1b[36m❯\x1b[0m "));
    }

    #[test]
    fn test_neutral_and_empty() {
        assert!(!classify_waiting(""));
        assert!(!classify_waiting("   \n\t "));
        assert!(!classify_waiting("compiling crate foo v0.1.0"));
        assert_eq!(classify("plain log line"), Activity::Neutral);
    }

    #[test]
    fn test_lookback_includes_marker_after_filler() {
        let text = format!("{}Do you want to proceed? (y/n)", "a".repeat(800));
        assert!(classify_waiting(&text));
    }

    #[test]
    fn test_lookback_excludes_marker_before_tail() {
        let text = format!("❯ {}", "a".repeat(600));
        assert!(!classify_waiting(&text));
    }

    #[test]
    fn test_stale_busy_marker_outside_window() {
        let text = format!("Thinking...{}❯ ", "a".repeat(600));
        assert!(classify_waiting(&text));
    }

    #[test]
    fn test_classify_complete() {
        assert!(classify_complete("All edits applied. Done"));
        assert!(classify_complete("❯ "));
        assert!(!classify_complete("still going"));
    }

    #[test]
    fn test_detect_tool_invocation() {
        let text = "⏺ Read(src/main.rs)\n  ⎿ Read 20 lines\n⏺ Edit(src/lib.rs)\n";
        assert_eq!(
            detect_tool_invocation(text),
            Some(ToolInvocation {
                name: "Edit".into(),
                target: "src/lib.rs".into()
            })
        );
    }

    #[test]
    fn test_detect_tool_invocation_absent() {
        assert_eq!(detect_tool_invocation("no tools here (really)"), None);
        assert_eq!(detect_tool_invocation("⏺ lowercase(x)"), None);
    }

    #[test]
    fn test_detect_tool_invocation_with_ansi() {
        let text = "\x1b[32m●\x1b[0m \x1b[1mBash\x1b[0m(cargo fmt)";
        let tool = detect_tool_invocation(text).unwrap();
        assert_eq!(tool.name, "Bash");
        assert_eq!(tool.target, "cargo fmt");
    }
}
