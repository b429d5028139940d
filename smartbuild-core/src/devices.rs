//! Serial device discovery.

use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// One attached serial-capable device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialDevice {
    /// Device node handed to the SDK tool, e.g. `/dev/ttyUSB0`.
    pub path: PathBuf,
    /// Human-readable description when the platform provides one.
    pub label: Option<String>,
}

impl SerialDevice {
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => format!("{} ({label})", self.path.display()),
            None => self.path.display().to_string(),
        }
    }
}

/// Lists currently attached serial-like devices.
#[async_trait]
pub trait DeviceEnumerator: Send + Sync {
    async fn list(&self) -> Vec<SerialDevice>;
}

/// Scans `/dev/serial/by-id` for stable names (the link name doubles as a
/// label) and falls back to raw `ttyUSB*` / `ttyACM*` nodes.
pub struct DevScan {
    dev_dir: PathBuf,
}

impl DevScan {
    pub fn new() -> Self {
        Self::with_root("/dev")
    }

    /// Scan under a different root. Used by tests.
    pub fn with_root(dev_dir: impl Into<PathBuf>) -> Self {
        Self {
            dev_dir: dev_dir.into(),
        }
    }
}

impl Default for DevScan {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceEnumerator for DevScan {
    async fn list(&self) -> Vec<SerialDevice> {
        let mut devices = Vec::new();

        let by_id = self.dev_dir.join("serial/by-id");
        if let Ok(mut entries) = tokio::fs::read_dir(&by_id).await {
            while let Ok(Some(entry)) = entries.next_entry().await {
                let label = entry.file_name().to_string_lossy().into_owned();
                let path = tokio::fs::canonicalize(entry.path())
                    .await
                    .unwrap_or_else(|_| entry.path());
                devices.push(SerialDevice {
                    path,
                    label: Some(label),
                });
            }
        }

        if devices.is_empty() {
            if let Ok(mut entries) = tokio::fs::read_dir(&self.dev_dir).await {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    let name = entry.file_name().to_string_lossy().into_owned();
                    if name.starts_with("ttyUSB") || name.starts_with("ttyACM") {
                        devices.push(SerialDevice {
                            path: entry.path(),
                            label: None,
                        });
                    }
                }
            }
        }

        devices.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(count = devices.len(), "enumerated serial devices");
        devices
    }
}
