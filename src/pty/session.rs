//! PTY session for one supervised agent process
//!
//! Owns the child, the PTY master, and a reader thread that streams output to
//! the owner and keeps a bounded accumulator of everything seen.

use portable_pty::{native_pty_system, Child, ChildKiller, CommandBuilder, MasterPty, PtySize};
use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::buffer::TailBuffer;
use crate::SessionId;

/// Characters of output retained by the accumulator
const OUTPUT_CAPACITY: usize = 16 * 1024;

const DEFAULT_ROWS: u16 = 24;
const DEFAULT_COLS: u16 = 80;

/// Failure to start a PTY-backed process
#[derive(Debug, thiserror::Error)]
pub enum SpawnError {
    #[error("Working directory does not exist: {0}")]
    MissingWorkingDirectory(PathBuf),

    #[error("Failed to open PTY: {0}")]
    OpenPty(String),

    #[error("Failed to spawn '{command}': {reason}")]
    Spawn { command: String, reason: String },

    #[error("Failed to attach to PTY: {0}")]
    Attach(String),
}

/// Events streamed from a PTY reader thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PtyEvent {
    /// A chunk of decoded output
    Output { session_id: SessionId, text: String },
    /// The process closed its terminal; sent exactly once
    Exited { session_id: SessionId },
}

/// A running PTY session
pub struct PtySession {
    /// Session this PTY belongs to
    pub session_id: SessionId,
    /// Output accumulator (shared with reader thread)
    output: Arc<Mutex<TailBuffer>>,
    /// PTY master, kept for resizing
    master: Box<dyn MasterPty + Send>,
    /// Input side of the PTY
    writer: Mutex<Box<dyn Write + Send>>,
    /// Child process
    child: Mutex<Box<dyn Child + Send + Sync>>,
    /// Whether the session is still running
    running: Arc<AtomicBool>,
}

impl PtySession {
    /// Spawn `command` in a new PTY.
    ///
    /// Output chunks and the final exit notice are sent on `events`.
    pub fn spawn(
        session_id: SessionId,
        working_directory: &Path,
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
        events: UnboundedSender<PtyEvent>,
    ) -> Result<Self, SpawnError> {
        if !working_directory.is_dir() {
            return Err(SpawnError::MissingWorkingDirectory(
                working_directory.to_path_buf(),
            ));
        }

        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows: DEFAULT_ROWS,
                cols: DEFAULT_COLS,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| SpawnError::OpenPty(e.to_string()))?;

        let mut cmd = CommandBuilder::new(command);
        cmd.args(args);
        cmd.cwd(working_directory);
        cmd.env("TERM", "xterm-256color");
        cmd.env("COLORTERM", "truecolor");
        for (key, value) in env {
            cmd.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| SpawnError::Spawn {
                command: command.to_string(),
                reason: e.to_string(),
            })?;
        // The reader only sees EOF once every slave handle is closed
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| SpawnError::Attach(e.to_string()))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| SpawnError::Attach(e.to_string()))?;

        let output = Arc::new(Mutex::new(TailBuffer::new(OUTPUT_CAPACITY)));
        let running = Arc::new(AtomicBool::new(true));

        let output_clone = output.clone();
        let running_clone = running.clone();
        let reader_session = session_id.clone();
        thread::Builder::new()
            .name(format!("pty-reader-{}", session_id))
            .spawn(move || {
                stream_output(reader, reader_session, output_clone, running_clone, events)
            })
            .map_err(|e| SpawnError::Attach(e.to_string()))?;

        debug!(
            "[agentwatch:pty] Spawned '{}' for session {} in {}",
            command,
            session_id,
            working_directory.display()
        );

        Ok(Self {
            session_id,
            output,
            master: pair.master,
            writer: Mutex::new(writer),
            child: Mutex::new(child),
            running,
        })
    }

    /// Check if the session is still running
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Snapshot of the accumulated output
    pub fn output(&self) -> String {
        self.output
            .lock()
            .map(|b| b.as_str().to_string())
            .unwrap_or_default()
    }

    /// OS process id of the child, if the platform reports one
    pub fn pid(&self) -> Option<u32> {
        self.child
            .lock()
            .ok()
            .and_then(|child| child.process_id())
    }

    /// Send raw bytes to the PTY
    pub fn write(&self, data: &[u8]) -> std::io::Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(|e| e.into_inner());
        writer.write_all(data)?;
        writer.flush()
    }

    /// Resize the terminal
    pub fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()> {
        self.master.resize(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        })
    }

    /// Ask the child to exit.
    ///
    /// Sends SIGTERM when the pid is known, otherwise falls back to the
    /// PTY library's own kill. Best effort: errors are logged, not returned.
    pub fn terminate(&self) {
        if let Some(pid) = self.pid() {
            if crate::process::send_terminate(pid) {
                return;
            }
        }
        let mut child = self.child.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = child.kill() {
            warn!(
                "[agentwatch:pty] Failed to kill session {}: {}",
                self.session_id, e
            );
        }
    }
}

/// Reader thread body: decode chunks, feed the accumulator and the owner
fn stream_output(
    mut reader: Box<dyn Read + Send>,
    session_id: SessionId,
    output: Arc<Mutex<TailBuffer>>,
    running: Arc<AtomicBool>,
    events: UnboundedSender<PtyEvent>,
) {
    let mut buf = [0u8; 4096];
    let mut decoder = Utf8Decoder::default();

    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let text = decoder.decode(&buf[..n]);
                if text.is_empty() {
                    continue;
                }
                if let Ok(mut out) = output.lock() {
                    out.push(&text);
                }
                let event = PtyEvent::Output {
                    session_id: session_id.clone(),
                    text,
                };
                // Owner may be gone; keep draining so the child never blocks on a full PTY
                let _ = events.send(event);
            }
            Err(e) => {
                debug!(
                    "[agentwatch:pty] Read error on session {}: {}",
                    session_id, e
                );
                break;
            }
        }
    }

    if running.swap(false, Ordering::SeqCst) {
        let _ = events.send(PtyEvent::Exited { session_id });
    }
}

/// Incremental UTF-8 decoder that carries split multi-byte sequences over
/// to the next chunk instead of emitting replacement characters.
#[derive(Debug, Default)]
pub(crate) struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub(crate) fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::new();

        loop {
            match std::str::from_utf8(&self.pending) {
                Ok(valid) => {
                    out.push_str(valid);
                    self.pending.clear();
                    return out;
                }
                Err(e) => {
                    let valid_up_to = e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[..valid_up_to]));
                    match e.error_len() {
                        // Incomplete sequence at the end: wait for more bytes
                        None => {
                            self.pending.drain(..valid_up_to);
                            return out;
                        }
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            self.pending.drain(..valid_up_to + len);
                        }
                    }
                }
            }
        }
    }
}
