use clap::Parser;
use console::style;
use miette::{IntoDiagnostic, Result};
use smartbuild::cli::{Cli, Command};
use smartbuild::dispatcher::Dispatcher;
use smartbuild::log;
use smartbuild::ui::{ConsolePrompt, Prompt};
use smartbuild_core::command::SdkCommand;
use smartbuild_core::devices::DevScan;
use smartbuild_core::settings::Settings;
use smartbuild_shell::{CommandSink, SessionRegistry};
use std::sync::Arc;
use tracing::debug;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    log::init(cli.global_options.verbose, cli.global_options.quiet);

    let project_root = match cli.global_options.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().into_diagnostic()?,
    };

    let settings = Settings::load(&project_root)?;
    let registry = Arc::new(SessionRegistry::new(settings.global.terminal_name.clone()));
    let prompt = Arc::new(ConsolePrompt);
    let mut dispatcher = Dispatcher::new(
        project_root,
        settings,
        registry.clone(),
        Arc::new(DevScan::new()),
        prompt.clone(),
    );

    match cli.command {
        Some(Command::Status) => print_status(&dispatcher, &registry),
        Some(command) => {
            // Status is handled above; every other subcommand dispatches.
            if let Some(command) = command.to_sdk_command() {
                run_once(&mut dispatcher, &registry, command).await?;
            }
        }
        None => run_menu(&mut dispatcher, &registry, prompt.as_ref()).await?,
    }
    Ok(())
}

/// Dispatch one command, then let the session finish what was queued.
async fn run_once(
    dispatcher: &mut Dispatcher,
    registry: &SessionRegistry,
    command: SdkCommand,
) -> Result<()> {
    dispatcher.dispatch(command).await?;

    let Some(session) = registry.current() else {
        return Ok(());
    };
    session.send_line("exit").await.into_diagnostic()?;
    tokio::select! {
        _ = session.closed() => {}
        _ = tokio::signal::ctrl_c() => {
            debug!("interrupted; killing the session");
            let _ = session.kill();
        }
    }
    Ok(())
}

/// Interactive action menu against one persistent session.
async fn run_menu(
    dispatcher: &mut Dispatcher,
    registry: &SessionRegistry,
    prompt: &dyn Prompt,
) -> Result<()> {
    let mut labels: Vec<String> = SdkCommand::ALL
        .iter()
        .map(|c| c.label().to_string())
        .collect();
    labels.push("Status".to_string());
    labels.push("Quit".to_string());

    loop {
        let Some(index) = prompt.select("smartbuild", &labels).await else {
            break;
        };
        match index {
            i if i < SdkCommand::ALL.len() => dispatcher.dispatch(SdkCommand::ALL[i]).await?,
            i if i == SdkCommand::ALL.len() => print_status(dispatcher, registry),
            _ => break,
        }
    }

    if let Some(session) = registry.current() {
        // A foreground monitor would swallow the exit; don't wait forever.
        let _ = session.send_line("exit").await;
        let grace = std::time::Duration::from_secs(5);
        if tokio::time::timeout(grace, session.closed()).await.is_err() {
            let _ = session.kill();
        }
    }
    Ok(())
}

fn print_status(dispatcher: &Dispatcher, registry: &SessionRegistry) {
    let settings = dispatcher.settings();
    let unset = style("unset").dim().to_string();
    println!(
        "{} {}",
        style("Project:").bold(),
        dispatcher.project_root().display()
    );
    println!(
        "{} {}",
        style("SDK root:").bold(),
        settings
            .workspace
            .sdk_root
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| unset.clone())
    );
    println!(
        "{} {}",
        style("Board:").bold(),
        settings.workspace.board.clone().unwrap_or_else(|| unset.clone())
    );
    println!(
        "{} {}",
        style("Serial port:").bold(),
        settings
            .workspace
            .serial_port
            .clone()
            .unwrap_or_else(|| unset.clone())
    );
    println!(
        "{} {} ({})",
        style("Session:").bold(),
        settings.global.terminal_name,
        if registry.current().is_some() {
            "running"
        } else {
            "not running"
        }
    );
}
