//! The command dispatcher.
//!
//! For every logical command this decides whether the environment must be
//! activated first, whether the session has to change directory, whether a
//! running monitor must be interrupted, and which resolved resources the
//! command line needs, then feeds the result to the shared session.
//!
//! Missing prerequisites and dismissed prompts abort the current request
//! without partial sends; a caller cannot tell "cancelled" apart from
//! "nothing to do".

use crate::boards::{self, BoardChange};
use crate::ports;
use crate::ui::Prompt;
use miette::{IntoDiagnostic, Result};
use smartbuild_core::command::{ControlStep, SETTLE_DELAY, SdkCommand, stop_monitor_sequence};
use smartbuild_core::cpp_properties;
use smartbuild_core::devices::DeviceEnumerator;
use smartbuild_core::settings::Settings;
use smartbuild_shell::{CommandSink, SessionProvider};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sourced at the SDK root on first use of a session.
const SETUP_SCRIPT: &str = ". ./export.sh";

/// Tracker state derived from one session's lifetime.
///
/// Reset whenever the registry hands out a freshly created session; the
/// state never outlives the session it describes.
#[derive(Debug, Default)]
struct SessionState {
    activated: bool,
    last_dir: Option<PathBuf>,
    monitor_on: bool,
}

impl SessionState {
    /// True when the environment setup step still has to run. Activation is
    /// marked done the moment the decision is made; the session send that
    /// follows is trusted to succeed.
    fn should_activate(&mut self) -> bool {
        let needed = !self.activated;
        self.activated = true;
        needed
    }

    fn needs_dir_change(&self, target: &Path) -> bool {
        self.last_dir.as_deref() != Some(target)
    }

    /// Record a directory change that is actually being emitted. Skipped
    /// changes must not be committed, or the tracker desynchronizes from
    /// the session.
    fn commit_dir(&mut self, target: &Path) {
        self.last_dir = Some(target.to_path_buf());
    }

    fn begin_monitor(&mut self) {
        self.monitor_on = true;
    }

    /// Clear the monitor flag and hand back the interrupt-and-drain steps
    /// to emit. Best effort: nothing confirms the foreground process
    /// actually exited.
    fn end_monitor(&mut self) -> [ControlStep; 4] {
        self.monitor_on = false;
        stop_monitor_sequence()
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Orchestrates logical commands against the shared shell session.
///
/// `dispatch` takes `&mut self`, so requests cannot interleave within one
/// process.
pub struct Dispatcher {
    project_root: PathBuf,
    settings: Settings,
    sessions: Arc<dyn SessionProvider>,
    devices: Arc<dyn DeviceEnumerator>,
    prompt: Arc<dyn Prompt>,
    state: SessionState,
}

impl Dispatcher {
    pub fn new(
        project_root: PathBuf,
        settings: Settings,
        sessions: Arc<dyn SessionProvider>,
        devices: Arc<dyn DeviceEnumerator>,
        prompt: Arc<dyn Prompt>,
    ) -> Self {
        Self {
            project_root,
            settings,
            sessions,
            devices,
            prompt,
            state: SessionState::default(),
        }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Run one logical command through the state machine.
    pub async fn dispatch(&mut self, command: SdkCommand) -> Result<()> {
        let Some(sdk_root) = self.resolve_sdk_root().await? else {
            return Ok(());
        };

        if command == SdkCommand::SelectPort {
            ports::resolve_port(
                &mut self.settings,
                self.devices.as_ref(),
                self.prompt.as_ref(),
                true,
            )
            .await?;
            return Ok(());
        }

        let (session, fresh) = self.sessions.acquire().await.into_diagnostic()?;
        if fresh {
            debug!("fresh session; resetting derived state");
            self.state.reset();
        }

        if self.state.should_activate() {
            return self
                .activate_and_run(session.as_ref(), &sdk_root, command)
                .await;
        }

        if let Some(follow_up) = self
            .run_steady(session.as_ref(), &sdk_root, command)
            .await?
        {
            // A board change enqueues exactly one follow-up, and that
            // command is never board-select, so a second one cannot occur.
            self.run_steady(session.as_ref(), &sdk_root, follow_up)
                .await?;
        }
        Ok(())
    }

    /// Cached-or-prompt resolution of the SDK root. `None` aborts the
    /// request: the prompt was dismissed or the path was bad.
    async fn resolve_sdk_root(&mut self) -> Result<Option<PathBuf>> {
        if let Some(root) = &self.settings.workspace.sdk_root {
            return Ok(Some(root.clone()));
        }

        let Some(input) = self.prompt.input("Enter the SDK root path").await else {
            warn!("no SDK path configured; command ignored");
            return Ok(None);
        };
        let root = PathBuf::from(input.trim());
        if !root.exists() {
            warn!(path = %root.display(), "SDK path does not exist; command ignored");
            return Ok(None);
        }

        self.settings.workspace.sdk_root = Some(root.clone());
        self.settings.save_workspace()?;
        info!(path = %root.display(), "SDK path saved");
        Ok(Some(root))
    }

    /// First-activation path: point the session at the SDK root, source the
    /// environment script, then run the command as-is.
    async fn activate_and_run(
        &mut self,
        session: &dyn CommandSink,
        sdk_root: &Path,
        command: SdkCommand,
    ) -> Result<()> {
        info!(sdk = %sdk_root.display(), "activating SDK environment");
        session
            .send_line(&cd_line(sdk_root))
            .await
            .into_diagnostic()?;
        session.send_line(SETUP_SCRIPT).await.into_diagnostic()?;
        if let Some(text) = command.text() {
            session.send_line(text).await.into_diagnostic()?;
        }
        self.state.commit_dir(sdk_root);
        if command.is_monitor() {
            self.state.begin_monitor();
        }

        match cpp_properties::generate(sdk_root, &self.project_root) {
            Ok(path) => info!(path = %path.display(), "include-path descriptor written"),
            Err(error) => warn!(%error, "could not write the include-path descriptor"),
        }
        Ok(())
    }

    /// Steady-state path. Returns the follow-up command a board change
    /// enqueued, if any.
    async fn run_steady(
        &mut self,
        session: &dyn CommandSink,
        sdk_root: &Path,
        command: SdkCommand,
    ) -> Result<Option<SdkCommand>> {
        if command.is_board_select() {
            return self.select_board(sdk_root).await;
        }

        let Some(text) = command.text() else {
            return Ok(None);
        };
        let mut line = text.to_string();

        // Resolve the port before anything is emitted, so an aborted
        // resolution leaves no partial command behind.
        if command.needs_port() {
            match ports::resolve_port(
                &mut self.settings,
                self.devices.as_ref(),
                self.prompt.as_ref(),
                false,
            )
            .await?
            {
                Some(port) => {
                    line.push_str(" --port ");
                    line.push_str(&port);
                }
                None => {
                    debug!("no serial port resolved; command ignored");
                    return Ok(None);
                }
            }
        }

        if self.state.needs_dir_change(&self.project_root) {
            session
                .send_line(&cd_line(&self.project_root))
                .await
                .into_diagnostic()?;
            self.state.commit_dir(&self.project_root);
        }

        if self.state.monitor_on {
            // Always interrupt a running monitor before reusing the
            // session, even when the incoming command is another monitor.
            for step in self.state.end_monitor() {
                self.emit_control(session, step).await?;
            }
        } else if command.is_monitor() {
            self.state.begin_monitor();
        }

        session.send_line(&line).await.into_diagnostic()?;
        Ok(None)
    }

    /// Board selection: offer the flat (board, config) list, apply the
    /// chosen configuration, and enqueue a clean when it changed.
    async fn select_board(&mut self, sdk_root: &Path) -> Result<Option<SdkCommand>> {
        let candidates = match boards::list_board_configs(sdk_root) {
            Ok(candidates) => candidates,
            Err(error) => {
                warn!(%error, sdk = %sdk_root.display(), "could not enumerate board configurations");
                return Ok(None);
            }
        };
        if candidates.is_empty() {
            warn!(
                "no board configurations under {}",
                sdk_root.join(boards::BOARDS_DIR).display()
            );
            return Ok(None);
        }

        let labels: Vec<String> = candidates.iter().map(|c| c.display_name()).collect();
        let Some(index) = self
            .prompt
            .select("Select a board configuration", &labels)
            .await
        else {
            return Ok(None);
        };

        match boards::apply_board_config(&self.project_root, &candidates[index]).await? {
            BoardChange::Unchanged => Ok(None),
            BoardChange::Applied { board } => {
                self.settings.workspace.board = Some(board.clone());
                self.settings.save_workspace()?;
                info!(%board, "board configuration applied");
                // Let the copy and the directory removal settle before the
                // clean runs against the new configuration.
                tokio::time::sleep(SETTLE_DELAY).await;
                Ok(Some(SdkCommand::Clean))
            }
        }
    }

    async fn emit_control(&self, session: &dyn CommandSink, step: ControlStep) -> Result<()> {
        match step {
            ControlStep::Interrupt => session.send_bytes(&[0x03]).await.into_diagnostic()?,
            ControlStep::CarriageReturn => session.send_bytes(b"\r").await.into_diagnostic()?,
            ControlStep::Pause(delay) => tokio::time::sleep(delay).await,
        }
        Ok(())
    }
}

fn cd_line(dir: &Path) -> String {
    format!("cd {}", shell_escape::escape(dir.to_string_lossy()))
}
