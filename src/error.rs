use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::types::MonitorState;

/// Reasons an acquisition request is rejected before anything is spawned
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvalidRequest {
    #[error("No input device selected")]
    EmptyInput,

    #[error("No output path given")]
    EmptyOutput,

    #[error("Output path must not carry a format suffix (found .{0})")]
    OutputHasSuffix(String),

    #[error("Output path names a directory, expected a file base name")]
    OutputIsDirectory,
}

/// Errors that can occur while preparing or running an acquisition
#[derive(Error, Debug)]
pub enum AcquireError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] InvalidRequest),

    #[error("Failed to launch {tool}: {source}")]
    Spawn {
        tool: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Log file {path}: {source}")]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Acquisition did not complete ({state}): {detail}")]
    Incomplete { state: MonitorState, detail: String },

    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("Config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("Device listing failed: {0}")]
    DeviceList(String),

    #[error("Monitor worker panicked")]
    WorkerPanicked,
}
