//! The shared interactive session and its registry.
//!
//! The session is one long-lived shell in a PTY. Its output is continuously
//! drained to the attached writer (stdout in the binary), which both keeps
//! the session visible and stops the child from blocking on a full buffer.
//! Sends are fire-and-forget: no exit codes come back.

use crate::pty::{Pty, PtyError};
use async_trait::async_trait;
use portable_pty::{CommandBuilder, PtySize};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Pty(#[from] PtyError),
    #[error("session is no longer running")]
    Closed,
    #[error("failed to write to the session: {0}")]
    Io(#[from] std::io::Error),
}

/// Sink for dispatcher output: lines of text for execution, or raw control
/// bytes.
#[async_trait]
pub trait CommandSink: Send + Sync {
    /// Send one line of text for execution.
    async fn send_line(&self, line: &str) -> Result<(), SessionError>;
    /// Send raw bytes without a trailing newline.
    async fn send_bytes(&self, bytes: &[u8]) -> Result<(), SessionError>;
}

/// Get-or-create access to the shared session.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Returns the session and whether this call created it. Callers reset
    /// session-derived state whenever the second element is true.
    async fn acquire(&self) -> Result<(Arc<dyn CommandSink>, bool), SessionError>;
}

/// One persistent interactive shell running in a PTY.
pub struct ShellSession {
    name: String,
    pty: Arc<Pty>,
    exited: watch::Receiver<bool>,
}

impl ShellSession {
    /// Spawn the user's shell (`$SHELL`, falling back to `bash` on PATH,
    /// then `/bin/sh`) with output drained to `output`.
    pub fn spawn(name: &str, output: Box<dyn Write + Send>) -> Result<Self, SessionError> {
        let program = std::env::var("SHELL")
            .ok()
            .map(PathBuf::from)
            .or_else(|| which::which("bash").ok())
            .unwrap_or_else(|| PathBuf::from("/bin/sh"));
        let cmd = CommandBuilder::new(program);
        Self::spawn_with(name, cmd, output)
    }

    /// Spawn an explicit command as the session shell.
    pub fn spawn_with(
        name: &str,
        cmd: CommandBuilder,
        mut output: Box<dyn Write + Send>,
    ) -> Result<Self, SessionError> {
        let pty = Arc::new(Pty::spawn(
            cmd,
            PtySize {
                rows: 24,
                cols: 120,
                pixel_width: 0,
                pixel_height: 0,
            },
        )?);

        let (exit_tx, exited) = watch::channel(false);
        let mut reader = pty
            .take_reader()
            .expect("reader is present on a freshly spawned PTY");
        std::thread::Builder::new()
            .name(format!("{name}-drain"))
            .spawn(move || {
                let mut buf = [0u8; 4096];
                loop {
                    match reader.read(&mut buf) {
                        // EOF or a read error both mean the PTY is gone.
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            // Keep draining even if the output side fails;
                            // the child must never block on us.
                            let _ = output.write_all(&buf[..n]).and_then(|_| output.flush());
                        }
                    }
                }
                let _ = exit_tx.send(true);
            })?;

        info!(session = %name, "spawned shell session");
        Ok(Self {
            name: name.to_string(),
            pty,
            exited,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_alive(&self) -> bool {
        !*self.exited.borrow()
    }

    /// Resolves when the shell process goes away.
    pub async fn closed(&self) {
        let mut exited = self.exited.clone();
        while !*exited.borrow() {
            if exited.changed().await.is_err() {
                break;
            }
        }
    }

    /// Terminate the underlying shell.
    pub fn kill(&self) -> Result<(), SessionError> {
        self.pty.kill()?;
        Ok(())
    }
}

#[async_trait]
impl CommandSink for ShellSession {
    async fn send_line(&self, line: &str) -> Result<(), SessionError> {
        if !self.is_alive() {
            return Err(SessionError::Closed);
        }
        debug!(session = %self.name, %line, "send line");
        self.pty.write_all(line.as_bytes())?;
        self.pty.write_all(b"\n")?;
        self.pty.flush()?;
        Ok(())
    }

    async fn send_bytes(&self, bytes: &[u8]) -> Result<(), SessionError> {
        if !self.is_alive() {
            return Err(SessionError::Closed);
        }
        debug!(session = %self.name, len = bytes.len(), "send control bytes");
        self.pty.write_all(bytes)?;
        self.pty.flush()?;
        Ok(())
    }
}

/// Owns the single shared session handle.
///
/// Created lazily on first acquire. When the underlying shell exits the
/// cached handle is cleared (by the exit watcher, or lazily on the next
/// acquire) so a later acquire starts fresh. Termination is an expected
/// lifecycle event, not a failure.
pub struct SessionRegistry {
    name: String,
    slot: Arc<Mutex<Option<Arc<ShellSession>>>>,
}

impl SessionRegistry {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// The live session, if any. Does not create one.
    pub fn current(&self) -> Option<Arc<ShellSession>> {
        let slot = self.slot.lock().unwrap();
        slot.as_ref().filter(|s| s.is_alive()).cloned()
    }

    fn acquire_session(&self) -> Result<(Arc<ShellSession>, bool), SessionError> {
        let mut slot = self.slot.lock().unwrap();
        if let Some(session) = slot.as_ref() {
            if session.is_alive() {
                return Ok((session.clone(), false));
            }
            debug!(session = %self.name, "previous session exited; starting a new one");
            *slot = None;
        }

        let session = Arc::new(ShellSession::spawn(
            &self.name,
            Box::new(std::io::stdout()),
        )?);
        *slot = Some(session.clone());

        // Clear the cached handle as soon as the shell goes away, unless a
        // newer session already took the slot.
        let watch_slot = self.slot.clone();
        let watch_session = session.clone();
        tokio::spawn(async move {
            watch_session.closed().await;
            info!(session = %watch_session.name(), "shell session closed");
            let mut slot = watch_slot.lock().unwrap();
            if let Some(current) = slot.as_ref() {
                if Arc::ptr_eq(current, &watch_session) {
                    *slot = None;
                }
            }
        });

        Ok((session, true))
    }
}

#[async_trait]
impl SessionProvider for SessionRegistry {
    async fn acquire(&self) -> Result<(Arc<dyn CommandSink>, bool), SessionError> {
        let (session, fresh) = self.acquire_session()?;
        Ok((session, fresh))
    }
}
