//! Board configuration discovery and application.
//!
//! Boards live under `<sdk>/boards/<BOARD>/config/*.config`. Applying one
//! copies it over the project's `app_default.config`; if the content
//! actually changed, the stale build output is dropped so the follow-up
//! clean starts from scratch.

use miette::{IntoDiagnostic, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const BOARDS_DIR: &str = "boards";
pub const BOARD_CONFIG_DIR: &str = "config";
pub const PROJECT_CONFIG_FILE: &str = "app_default.config";
pub const BUILD_DIR: &str = ".build";

/// One selectable (board, config file) pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardConfig {
    pub board: String,
    pub config_path: PathBuf,
}

impl BoardConfig {
    pub fn display_name(&self) -> String {
        let file = self
            .config_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        format!("{} / {file}", self.board)
    }
}

/// Flat candidate list across every board's config directory, sorted by
/// board then file.
pub fn list_board_configs(sdk_root: &Path) -> std::io::Result<Vec<BoardConfig>> {
    let mut out = Vec::new();
    let boards = sdk_root.join(BOARDS_DIR);
    for board_entry in std::fs::read_dir(&boards)? {
        let board_entry = board_entry?;
        if !board_entry.file_type()?.is_dir() {
            continue;
        }
        let board = board_entry.file_name().to_string_lossy().into_owned();
        let config_dir = board_entry.path().join(BOARD_CONFIG_DIR);
        // Boards without a config directory are simply not selectable.
        let Ok(entries) = std::fs::read_dir(&config_dir) else {
            continue;
        };
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "config") {
                out.push(BoardConfig {
                    board: board.clone(),
                    config_path: path,
                });
            }
        }
    }
    out.sort_by(|a, b| {
        a.board
            .cmp(&b.board)
            .then_with(|| a.config_path.cmp(&b.config_path))
    });
    Ok(out)
}

/// Outcome of applying a selected board configuration.
#[derive(Debug, PartialEq, Eq)]
pub enum BoardChange {
    /// Selected configuration is byte-identical to the project file.
    Unchanged,
    /// Project file overwritten and stale build output dropped.
    Applied { board: String },
}

/// Copy `selection` over the project configuration when the contents differ.
///
/// Removing the old build output is best effort: failures are logged and the
/// change still counts as applied.
pub async fn apply_board_config(
    workspace_root: &Path,
    selection: &BoardConfig,
) -> Result<BoardChange> {
    let selected = tokio::fs::read(&selection.config_path)
        .await
        .into_diagnostic()?;

    let project_file = workspace_root.join(PROJECT_CONFIG_FILE);
    let current = match tokio::fs::read(&project_file).await {
        Ok(bytes) => Some(bytes),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => return Err(e).into_diagnostic(),
    };

    if current.as_deref() == Some(selected.as_slice()) {
        debug!(board = %selection.board, "selected configuration already applied");
        return Ok(BoardChange::Unchanged);
    }

    tokio::fs::write(&project_file, &selected)
        .await
        .into_diagnostic()?;

    let build_dir = workspace_root.join(BUILD_DIR);
    match tokio::fs::remove_dir_all(&build_dir).await {
        Ok(()) => info!(path = %build_dir.display(), "removed stale build output"),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => warn!(path = %build_dir.display(), error = %e, "could not remove build output"),
    }

    Ok(BoardChange::Applied {
        board: selection.board.clone(),
    })
}
