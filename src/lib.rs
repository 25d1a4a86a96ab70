pub mod cli;
pub mod command;
pub mod config;
pub mod devices;
pub mod error;
pub mod log_mirror;
pub mod logging;
pub mod monitor;
pub mod process;
pub mod request;
pub mod types;

pub use config::ToolConfig;
pub use error::{AcquireError, InvalidRequest};
pub use monitor::{LineClassifier, MonitorHandle, MonitorReport, ProgressMonitor};
pub use request::{AcquisitionRequest, CaseMetadata};
pub use types::{BlockDevice, DigestType, MediaFlags, MediaType, MonitorState, ProgressEvent};
