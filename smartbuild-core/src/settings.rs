//! Two-scope persistent settings.
//!
//! Workspace-scoped values (`smartbuild.yaml` in the project root) travel
//! with the project; the global scope lives in the XDG config home and
//! follows the user. Both are load-or-default and written back on change.

use miette::Diagnostic;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the workspace scope, relative to the project root.
pub const WORKSPACE_FILE: &str = "smartbuild.yaml";

const GLOBAL_FILE: &str = "config.yaml";
const XDG_PREFIX: &str = "smartbuild";

#[derive(Debug, Error, Diagnostic)]
pub enum SettingsError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid YAML")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("failed to serialize settings")]
    Serialize(#[source] serde_yaml::Error),
    #[error("could not place the global settings file")]
    GlobalScope(#[source] std::io::Error),
}

/// Settings that belong to one project checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSettings {
    /// Root of the SDK checkout the project builds against.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub sdk_root: Option<PathBuf>,
    /// Serial device handed to flash and monitor commands.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub serial_port: Option<String>,
    /// Board whose configuration is currently applied.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub board: Option<String>,
}

/// Settings shared by every project on this machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSettings {
    /// Display name of the shared shell session.
    #[serde(default = "default_terminal_name")]
    pub terminal_name: String,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            terminal_name: default_terminal_name(),
        }
    }
}

fn default_terminal_name() -> String {
    "Smart Build".to_string()
}

/// Both scopes plus the paths they round-trip through.
#[derive(Debug, Clone)]
pub struct Settings {
    pub workspace: WorkspaceSettings,
    pub global: GlobalSettings,
    workspace_path: PathBuf,
    global_path: PathBuf,
}

impl Settings {
    /// Load both scopes for a project root, creating nothing on disk yet.
    pub fn load(workspace_root: &Path) -> Result<Self, SettingsError> {
        let base = xdg::BaseDirectories::with_prefix(XDG_PREFIX);
        let global_path = base
            .place_config_file(GLOBAL_FILE)
            .map_err(SettingsError::GlobalScope)?;
        Self::from_paths(workspace_root.join(WORKSPACE_FILE), global_path)
    }

    /// Load from explicit file paths. Missing files yield defaults.
    pub fn from_paths(
        workspace_path: PathBuf,
        global_path: PathBuf,
    ) -> Result<Self, SettingsError> {
        let workspace = load_yaml(&workspace_path)?.unwrap_or_default();
        let global = load_yaml(&global_path)?.unwrap_or_default();
        Ok(Self {
            workspace,
            global,
            workspace_path,
            global_path,
        })
    }

    pub fn workspace_path(&self) -> &Path {
        &self.workspace_path
    }

    pub fn save_workspace(&self) -> Result<(), SettingsError> {
        write_yaml(&self.workspace_path, &self.workspace)
    }

    pub fn save_global(&self) -> Result<(), SettingsError> {
        write_yaml(&self.global_path, &self.global)
    }
}

fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, SettingsError> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_yaml::from_str(&text)
            .map(Some)
            .map_err(|source| SettingsError::Parse {
                path: path.to_path_buf(),
                source,
            }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(SettingsError::Read {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> Result<(), SettingsError> {
    let yaml = serde_yaml::to_string(value).map_err(SettingsError::Serialize)?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, yaml).map_err(|source| SettingsError::Write {
        path: path.to_path_buf(),
        source,
    })
}
