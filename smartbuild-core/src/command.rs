//! The logical command vocabulary.
//!
//! Commands are classified once, at the CLI boundary, into an exhaustive
//! enum. The dispatcher branches on these variants instead of re-deriving
//! the class from command text.

use std::fmt;
use std::time::Duration;

/// Delay between dependent sends, giving the consuming shell time to settle.
pub const SETTLE_DELAY: Duration = Duration::from_millis(250);

/// A logical action the helper can run against the SDK tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdkCommand {
    /// Activate the SDK environment without running anything else.
    Env,
    /// Pick a board configuration for the project.
    ConfigChoice,
    Build,
    Flash,
    Clean,
    Monitor,
    /// Open the SDK's menu-based configuration UI.
    MenuConfig,
    /// Re-select the serial port, replacing any cached choice.
    SelectPort,
}

impl SdkCommand {
    /// Every command, in the order the interactive menu offers them.
    pub const ALL: [SdkCommand; 8] = [
        SdkCommand::Env,
        SdkCommand::Build,
        SdkCommand::ConfigChoice,
        SdkCommand::MenuConfig,
        SdkCommand::Flash,
        SdkCommand::Monitor,
        SdkCommand::Clean,
        SdkCommand::SelectPort,
    ];

    /// The literal line forwarded to the SDK tool, if the command has one.
    ///
    /// `SelectPort` is handled entirely by the helper and never reaches the
    /// session.
    pub fn text(self) -> Option<&'static str> {
        match self {
            SdkCommand::Env => Some(r#"echo "Environment activated""#),
            SdkCommand::ConfigChoice => Some("tos.py config choice"),
            SdkCommand::Build => Some("tos.py build"),
            SdkCommand::Flash => Some("tos.py flash"),
            SdkCommand::Clean => Some("tos.py clean"),
            SdkCommand::Monitor => Some("tos.py monitor"),
            SdkCommand::MenuConfig => Some("tos.py config menu"),
            SdkCommand::SelectPort => None,
        }
    }

    /// Monitor-class commands stream to the session foreground until
    /// interrupted.
    pub fn is_monitor(self) -> bool {
        matches!(self, SdkCommand::Monitor)
    }

    /// Commands that talk to a physical device and take a `--port` option.
    pub fn needs_port(self) -> bool {
        matches!(self, SdkCommand::Flash | SdkCommand::Monitor)
    }

    /// The board/config-choice command, resolved by the helper's own picker
    /// once the environment is up.
    pub fn is_board_select(self) -> bool {
        matches!(self, SdkCommand::ConfigChoice)
    }

    /// Label used in menus and status output.
    pub fn label(self) -> &'static str {
        match self {
            SdkCommand::Env => "Activate environment",
            SdkCommand::ConfigChoice => "Choose board config",
            SdkCommand::Build => "Build",
            SdkCommand::Flash => "Flash",
            SdkCommand::Clean => "Clean",
            SdkCommand::Monitor => "Monitor",
            SdkCommand::MenuConfig => "Menuconfig",
            SdkCommand::SelectPort => "Select serial port",
        }
    }
}

impl fmt::Display for SdkCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One step of the stop-monitor sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlStep {
    /// Interrupt the session foreground (ETX, Ctrl-C).
    Interrupt,
    /// Wait for the shell to settle.
    Pause(Duration),
    /// A bare carriage return to reclaim the prompt.
    CarriageReturn,
}

/// The interrupt-and-drain sequence that returns a busy session to an idle
/// prompt.
///
/// Best effort: nothing confirms that the foreground process actually
/// exited.
pub fn stop_monitor_sequence() -> [ControlStep; 4] {
    [
        ControlStep::Interrupt,
        ControlStep::Pause(SETTLE_DELAY),
        ControlStep::CarriageReturn,
        ControlStep::Pause(SETTLE_DELAY),
    ]
}
