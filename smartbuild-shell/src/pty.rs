//! PTY (pseudo-terminal) management.
//!
//! Thin wrapper over a spawned shell process: write access for the
//! dispatcher, a one-shot reader handed to the session's output drain, and
//! lifecycle queries.

use portable_pty::{CommandBuilder, PtySize, native_pty_system};
use std::io::{self, Read, Write};
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("failed to create PTY: {0}")]
    Create(String),
    #[error("failed to spawn command: {0}")]
    Spawn(String),
    #[error("failed to clone reader: {0}")]
    CloneReader(String),
    #[error("failed to get writer: {0}")]
    Writer(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// PTY wrapper with separate locks per handle.
///
/// The writer has its own lock so input keeps flowing while the drain thread
/// sits in a blocking read.
pub struct Pty {
    // Kept alive for the lifetime of the session; dropping the master closes
    // the PTY under the child.
    _master: Mutex<Box<dyn portable_pty::MasterPty + Send>>,
    child: Mutex<Box<dyn portable_pty::Child + Send + Sync>>,
    reader: Mutex<Option<Box<dyn Read + Send>>>,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl Pty {
    /// Spawn a new PTY running the given command.
    pub fn spawn(cmd: CommandBuilder, size: PtySize) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(size)
            .map_err(|e| PtyError::Create(e.to_string()))?;

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| PtyError::Spawn(e.to_string()))?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::CloneReader(e.to_string()))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::Writer(e.to_string()))?;

        Ok(Self {
            _master: Mutex::new(pair.master),
            child: Mutex::new(child),
            reader: Mutex::new(Some(reader)),
            writer: Mutex::new(writer),
        })
    }

    /// Take the output reader. Returns `None` after the first call.
    pub fn take_reader(&self) -> Option<Box<dyn Read + Send>> {
        self.reader.lock().unwrap().take()
    }

    /// Write data to the PTY.
    pub fn write_all(&self, data: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap();
        writer.write_all(data)
    }

    /// Flush the PTY writer.
    pub fn flush(&self) -> io::Result<()> {
        let mut writer = self.writer.lock().unwrap();
        writer.flush()
    }

    /// Try to wait for the child process without blocking.
    pub fn try_wait(&self) -> Result<Option<portable_pty::ExitStatus>, PtyError> {
        let mut child = self.child.lock().unwrap();
        child
            .try_wait()
            .map_err(|e| PtyError::Io(io::Error::other(e.to_string())))
    }

    /// Kill the PTY child process.
    pub fn kill(&self) -> Result<(), PtyError> {
        let mut child = self.child.lock().unwrap();
        child
            .kill()
            .map_err(|e| PtyError::Io(io::Error::other(e.to_string())))
    }
}
