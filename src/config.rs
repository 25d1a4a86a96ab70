//! Tool configuration
//!
//! Everything the monitor needs to know about the external imaging tool lives
//! here: where it is, which digest to request and which output lines mean
//! progress or success. Values come from `Default`, an optional JSON file and
//! finally command-line overrides.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::AcquireError;
use crate::types::DigestType;

pub const DEFAULT_TOOL_PATH: &str = "/usr/bin/ewfacquire";
pub const DEFAULT_LSBLK_PATH: &str = "/bin/lsblk";
pub const DEFAULT_PERCENT_PATTERN: &str = r"Status: at ([0-9]+)%";
pub const DEFAULT_EXIT_GRACE_MS: u64 = 2_000;

/// Marker lines printed by different ewfacquire releases on success
pub const DEFAULT_COMPLETION_MARKERS: [&str; 2] = ["Acquiry completed at:", "ewfacquire: SUCCESS"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    pub tool_path: PathBuf,
    pub digest: DigestType,
    /// Regex with one capture group holding the integer percentage
    pub percent_pattern: String,
    /// Regexes; a line matching any of them ends the run successfully
    pub completion_markers: Vec<String>,
    pub lsblk_path: PathBuf,
    /// How long the tool may keep running after the completion marker before it is killed
    pub exit_grace_ms: u64,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            tool_path: PathBuf::from(DEFAULT_TOOL_PATH),
            digest: DigestType::Sha1,
            percent_pattern: DEFAULT_PERCENT_PATTERN.to_string(),
            completion_markers: DEFAULT_COMPLETION_MARKERS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            lsblk_path: PathBuf::from(DEFAULT_LSBLK_PATH),
            exit_grace_ms: DEFAULT_EXIT_GRACE_MS,
        }
    }
}

impl ToolConfig {
    /// Reads a JSON config file; missing keys keep their defaults
    pub fn load(path: &Path) -> Result<Self, AcquireError> {
        let raw = fs::read_to_string(path).map_err(|e| AcquireError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        Self::from_json(&raw).map_err(|message| AcquireError::Config {
            path: path.to_path_buf(),
            message,
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, String> {
        let config: ToolConfig = serde_json::from_str(raw).map_err(|e| e.to_string())?;
        if config.completion_markers.is_empty() {
            return Err("completion_markers must not be empty".to_string());
        }
        Ok(config)
    }

    pub fn with_tool_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.tool_path = path.into();
        self
    }

    pub fn with_digest(mut self, digest: DigestType) -> Self {
        self.digest = digest;
        self
    }

    /// Replaces the marker set; an empty list keeps the current one
    pub fn with_completion_markers(mut self, markers: Vec<String>) -> Self {
        if !markers.is_empty() {
            self.completion_markers = markers;
        }
        self
    }

    pub fn with_exit_grace_ms(mut self, millis: u64) -> Self {
        self.exit_grace_ms = millis;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_carry_both_markers() {
        let config = ToolConfig::default();
        assert_eq!(config.tool_path, PathBuf::from("/usr/bin/ewfacquire"));
        assert_eq!(config.digest, DigestType::Sha1);
        assert_eq!(config.completion_markers.len(), 2);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            ToolConfig::from_json(r#"{ "tool_path": "/opt/ewf/bin/ewfacquire", "digest": "sha256" }"#)
                .unwrap();
        assert_eq!(config.tool_path, PathBuf::from("/opt/ewf/bin/ewfacquire"));
        assert_eq!(config.digest, DigestType::Sha256);
        assert_eq!(config.percent_pattern, DEFAULT_PERCENT_PATTERN);
        assert_eq!(config.exit_grace_ms, DEFAULT_EXIT_GRACE_MS);
    }

    #[test]
    fn test_rejects_empty_marker_set() {
        let err = ToolConfig::from_json(r#"{ "completion_markers": [] }"#).unwrap_err();
        assert!(err.contains("completion_markers"));
    }

    #[test]
    fn test_rejects_unknown_keys() {
        assert!(ToolConfig::from_json(r#"{ "tool": "/bin/true" }"#).is_err());
    }

    #[test]
    fn test_load_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        match ToolConfig::load(&path) {
            Err(AcquireError::Config { path: p, .. }) => assert_eq!(p, path),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_overrides() {
        let config = ToolConfig::default()
            .with_tool_path("/tmp/fake")
            .with_completion_markers(Vec::new())
            .with_exit_grace_ms(10);
        assert_eq!(config.tool_path, PathBuf::from("/tmp/fake"));
        assert_eq!(config.completion_markers.len(), 2);
        assert_eq!(config.exit_grace_ms, 10);
    }
}
