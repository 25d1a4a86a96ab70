use clap::ValueEnum;
use humansize::{BINARY, format_size};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const MAX_PERCENT: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DigestType {
    #[default]
    Sha1,
    Sha256,
}

impl DigestType {
    pub fn as_arg(&self) -> &'static str {
        match self {
            DigestType::Sha1 => "sha1",
            DigestType::Sha256 => "sha256",
        }
    }
}

impl fmt::Display for DigestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Fixed,
    Removable,
    Optical,
    Memory,
}

impl MediaType {
    pub const ALL: [MediaType; 4] = [
        MediaType::Fixed,
        MediaType::Removable,
        MediaType::Optical,
        MediaType::Memory,
    ];

    pub fn as_arg(&self) -> &'static str {
        match self {
            MediaType::Fixed => "fixed",
            MediaType::Removable => "removable",
            MediaType::Optical => "optical",
            MediaType::Memory => "memory",
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MediaFlags {
    Logical,
    #[default]
    Physical,
}

impl MediaFlags {
    pub const ALL: [MediaFlags; 2] = [MediaFlags::Physical, MediaFlags::Logical];

    pub fn as_arg(&self) -> &'static str {
        match self {
            MediaFlags::Logical => "logical",
            MediaFlags::Physical => "physical",
        }
    }
}

impl fmt::Display for MediaFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// Structured progress surfaced by the monitor, in the order it was observed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    LogLine(String),
    PercentUpdate(u8),
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    NotStarted,
    Running,
    Completed,
    Killed,
    EndOfStreamWithoutCompletion,
}

impl MonitorState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            MonitorState::Completed
                | MonitorState::Killed
                | MonitorState::EndOfStreamWithoutCompletion
        )
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorState::NotStarted => write!(f, "not started"),
            MonitorState::Running => write!(f, "running"),
            MonitorState::Completed => write!(f, "completed"),
            MonitorState::Killed => write!(f, "killed"),
            MonitorState::EndOfStreamWithoutCompletion => {
                write!(f, "output ended without completion marker")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockDevice {
    pub path: String,
    pub size: Option<u64>,
    pub kind: Option<String>,
    pub model: Option<String>,
}

impl BlockDevice {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size: None,
            kind: None,
            model: None,
        }
    }

    pub fn size_human(&self) -> String {
        match self.size {
            Some(size) => format_size(size, BINARY),
            None => "-".to_string(),
        }
    }

    pub fn kind_label(&self) -> &str {
        self.kind.as_deref().unwrap_or("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_size_human() {
        let mut device = BlockDevice::new("/dev/sda");
        assert_eq!(device.size_human(), "-");

        device.size = Some(1024 * 1024 * 1024);
        assert_eq!(device.size_human(), "1 GiB");
    }

    #[test]
    fn test_terminal_states() {
        assert!(!MonitorState::NotStarted.is_terminal());
        assert!(!MonitorState::Running.is_terminal());
        assert!(MonitorState::Completed.is_terminal());
        assert!(MonitorState::Killed.is_terminal());
        assert!(MonitorState::EndOfStreamWithoutCompletion.is_terminal());
    }
}
