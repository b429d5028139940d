use clap::{Parser, Subcommand, crate_version};
use smartbuild_core::command::SdkCommand;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "smartbuild",
    color = clap::ColorChoice::Auto,
    about = format!("smartbuild {}: build, flash and monitor embedded SDK projects from one shared shell session", crate_version!())
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub global_options: GlobalOptions,
}

#[derive(Clone, Debug, Parser)]
pub struct GlobalOptions {
    #[arg(short, long, global = true, help = "Enable additional debug logs.")]
    pub verbose: bool,

    #[arg(
        short,
        long,
        global = true,
        conflicts_with = "verbose",
        help = "Silence all logs"
    )]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        value_name = "DIR",
        help = "Project directory to operate on. Defaults to the current directory."
    )]
    pub project_dir: Option<PathBuf>,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    #[command(about = "Activate the SDK environment in the shared session.")]
    Env,

    #[command(about = "Build the project.")]
    Build,

    #[command(about = "Flash the firmware over the selected serial port.")]
    Flash,

    #[command(about = "Remove build artifacts.")]
    Clean,

    #[command(about = "Stream device logs over the selected serial port.")]
    Monitor,

    #[command(about = "Open the SDK's menu-based configuration UI.")]
    Menuconfig,

    #[command(about = "Choose a board configuration for the project.")]
    Board,

    #[command(about = "Select the serial port, replacing any cached choice.")]
    Port,

    #[command(alias = "show", about = "Print the resolved project state.")]
    Status,
}

impl Command {
    /// The logical command this subcommand dispatches, if any. `Status` is
    /// handled without touching the session.
    pub fn to_sdk_command(self) -> Option<SdkCommand> {
        match self {
            Command::Env => Some(SdkCommand::Env),
            Command::Build => Some(SdkCommand::Build),
            Command::Flash => Some(SdkCommand::Flash),
            Command::Clean => Some(SdkCommand::Clean),
            Command::Monitor => Some(SdkCommand::Monitor),
            Command::Menuconfig => Some(SdkCommand::MenuConfig),
            Command::Board => Some(SdkCommand::ConfigChoice),
            Command::Port => Some(SdkCommand::SelectPort),
            Command::Status => None,
        }
    }
}
