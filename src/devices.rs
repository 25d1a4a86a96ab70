use serde::Deserialize;
use std::path::Path;
use std::process::Command;
use tracing::debug;

use crate::error::AcquireError;
use crate::types::BlockDevice;

pub const LSBLK_COLUMNS: &str = "PATH,SIZE,TYPE,MODEL";

#[derive(Deserialize)]
struct LsblkOutput {
    blockdevices: Vec<LsblkDevice>,
}

#[derive(Deserialize)]
struct LsblkDevice {
    path: String,
    #[serde(default)]
    size: Option<LsblkSize>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    children: Vec<LsblkDevice>,
}

/// Older lsblk releases print every column as a string, newer ones use numbers
#[derive(Deserialize)]
#[serde(untagged)]
enum LsblkSize {
    Bytes(u64),
    Text(String),
}

impl LsblkSize {
    fn bytes(&self) -> Option<u64> {
        match self {
            LsblkSize::Bytes(n) => Some(*n),
            LsblkSize::Text(s) => s.trim().parse().ok(),
        }
    }
}

/// Runs `lsblk --json` and returns every device and partition it reports
pub fn list_block_devices(lsblk: &Path) -> Result<Vec<BlockDevice>, AcquireError> {
    let output = Command::new(lsblk)
        .args(["--json", "--bytes", "-o", LSBLK_COLUMNS])
        .output()
        .map_err(|e| AcquireError::DeviceList(format!("{}: {}", lsblk.display(), e)))?;

    if !output.status.success() {
        return Err(AcquireError::DeviceList(format!(
            "{} exited with {}: {}",
            lsblk.display(),
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let devices = parse_lsblk_json(&String::from_utf8_lossy(&output.stdout))?;
    debug!(count = devices.len(), "enumerated block devices");
    Ok(devices)
}

/// Parses lsblk JSON, flattening partitions right after their parent disk
pub fn parse_lsblk_json(json: &str) -> Result<Vec<BlockDevice>, AcquireError> {
    let parsed: LsblkOutput =
        serde_json::from_str(json).map_err(|e| AcquireError::DeviceList(e.to_string()))?;

    let mut devices = Vec::new();
    for device in parsed.blockdevices {
        flatten_into(device, &mut devices);
    }
    Ok(devices)
}

fn flatten_into(device: LsblkDevice, out: &mut Vec<BlockDevice>) {
    out.push(BlockDevice {
        path: device.path,
        size: device.size.as_ref().and_then(LsblkSize::bytes),
        kind: device.kind,
        model: device
            .model
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty()),
    });

    for child in device.children {
        flatten_into(child, out);
    }
}

pub fn format_device_table(devices: &[BlockDevice]) -> String {
    let mut output = String::new();

    output.push_str("PATH               TYPE       SIZE MODEL\n");
    output.push_str("---------------------------------------------------\n");

    for device in devices {
        output.push_str(&format!(
            "{:<18} {:<6} {:>10} {}\n",
            device.path,
            device.kind_label(),
            device.size_human(),
            device.model.as_deref().unwrap_or("")
        ));
    }

    output
}

pub fn device_selection_options(devices: &[BlockDevice]) -> Vec<String> {
    devices
        .iter()
        .map(|d| match &d.model {
            Some(model) => format!("{} ({}) - {} {}", d.path, d.kind_label(), d.size_human(), model),
            None => format!("{} ({}) - {}", d.path, d.kind_label(), d.size_human()),
        })
        .collect()
}
