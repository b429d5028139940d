//! C/C++ include-path descriptor (`c_cpp_properties.json`).
//!
//! Editors read this file to resolve SDK headers. It is regenerated as a
//! side effect of activating the environment for an SDK root.

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Directory the descriptor lives in, relative to the project root.
pub const DESCRIPTOR_DIR: &str = ".vscode";
pub const DESCRIPTOR_FILE: &str = "c_cpp_properties.json";

#[derive(Debug, Error, Diagnostic)]
pub enum DescriptorError {
    #[error("SDK path does not exist: {0}")]
    MissingSdk(PathBuf),
    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize the descriptor")]
    Serialize(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowseInfo {
    pub path: Vec<String>,
    pub limit_symbols_to_included_headers: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CppConfiguration {
    pub name: String,
    pub include_path: Vec<String>,
    pub browse: BrowseInfo,
    pub c_standard: String,
    pub cpp_standard: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CppProperties {
    pub configurations: Vec<CppConfiguration>,
    pub version: u32,
}

impl CppProperties {
    /// Descriptor for one SDK root, named after the SDK directory.
    pub fn for_sdk(sdk_root: &Path, workspace_root: &Path) -> Self {
        let name = sdk_root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "sdk".to_string());
        let sdk = sdk_root.display();
        let workspace = workspace_root.display();
        Self {
            configurations: vec![CppConfiguration {
                name,
                include_path: vec![
                    format!("{sdk}/platform/**"),
                    format!("{sdk}/src/**"),
                    format!("{workspace}/**"),
                ],
                browse: BrowseInfo {
                    path: vec![
                        format!("{sdk}/platform"),
                        format!("{sdk}/src"),
                        workspace.to_string(),
                    ],
                    limit_symbols_to_included_headers: true,
                },
                c_standard: "c11".to_string(),
                cpp_standard: "c++17".to_string(),
            }],
            version: 4,
        }
    }
}

/// Write the descriptor under `<workspace>/.vscode/`, creating the directory
/// when missing. Returns the path written.
pub fn generate(sdk_root: &Path, workspace_root: &Path) -> Result<PathBuf, DescriptorError> {
    if !sdk_root.exists() {
        return Err(DescriptorError::MissingSdk(sdk_root.to_path_buf()));
    }
    let dir = workspace_root.join(DESCRIPTOR_DIR);
    std::fs::create_dir_all(&dir).map_err(|source| DescriptorError::Write {
        path: dir.clone(),
        source,
    })?;
    let path = dir.join(DESCRIPTOR_FILE);
    let properties = CppProperties::for_sdk(sdk_root, workspace_root);
    let json = serde_json::to_string_pretty(&properties).map_err(DescriptorError::Serialize)?;
    std::fs::write(&path, json).map_err(|source| DescriptorError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
