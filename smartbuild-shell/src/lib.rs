//! Persistent shell session management for smartbuild.
//!
//! One interactive shell runs in a PTY and is reused across commands. The
//! registry hands out the live session or creates a fresh one, and reports
//! which of the two happened so state derived from the session can be reset
//! alongside it.

mod pty;
mod session;

pub use pty::{Pty, PtyError};
pub use session::{CommandSink, SessionError, SessionProvider, SessionRegistry, ShellSession};

// Re-export for callers that build their own spawn commands.
pub use portable_pty::{CommandBuilder, PtySize};
