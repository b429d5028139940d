//! Serial port resolution: cached-or-prompt.

use crate::ui::Prompt;
use miette::Result;
use smartbuild_core::devices::DeviceEnumerator;
use smartbuild_core::settings::Settings;
use tracing::{info, warn};

/// Resolve the serial port for device-facing commands.
///
/// Without `force`, a cached selection is returned untouched and no device
/// query happens. Otherwise the live device list is offered for selection: a
/// confirmed choice is persisted to the workspace settings, a dismissed one
/// leaves the cache alone, and an empty device list is reported as a
/// warning. `None` means the caller has nothing to append.
pub async fn resolve_port(
    settings: &mut Settings,
    devices: &dyn DeviceEnumerator,
    prompt: &dyn Prompt,
    force: bool,
) -> Result<Option<String>> {
    if !force {
        if let Some(port) = &settings.workspace.serial_port {
            return Ok(Some(port.clone()));
        }
    }

    let candidates = devices.list().await;
    if candidates.is_empty() {
        warn!("no serial devices attached");
        return Ok(None);
    }

    let labels: Vec<String> = candidates.iter().map(|d| d.display_name()).collect();
    let Some(index) = prompt.select("Select a serial port", &labels).await else {
        return Ok(None);
    };

    let port = candidates[index].path.display().to_string();
    settings.workspace.serial_port = Some(port.clone());
    settings.save_workspace()?;
    info!(%port, "serial port selected");
    Ok(Some(port))
}
