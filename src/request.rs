//! Acquisition request model and validation

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use crate::error::InvalidRequest;
use crate::types::{MediaFlags, MediaType};

/// Case details forwarded to the imaging tool and written at the top of the log
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaseMetadata {
    pub case_number: String,
    pub description: String,
    pub evidence_number: String,
    pub examiner: String,
    pub notes: String,
    pub media_type: MediaType,
    pub media_flags: MediaFlags,
}

impl CaseMetadata {
    /// Creates metadata for the given case number with default media settings
    pub fn new(case_number: impl Into<String>) -> Self {
        Self {
            case_number: case_number.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_evidence_number(mut self, evidence_number: impl Into<String>) -> Self {
        self.evidence_number = evidence_number.into();
        self
    }

    pub fn with_examiner(mut self, examiner: impl Into<String>) -> Self {
        self.examiner = examiner.into();
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_media(mut self, media_type: MediaType, media_flags: MediaFlags) -> Self {
        self.media_type = media_type;
        self.media_flags = media_flags;
        self
    }
}

/// A validated, immutable description of one acquisition run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcquisitionRequest {
    input: PathBuf,
    output: PathBuf,
    metadata: Option<CaseMetadata>,
}

impl AcquisitionRequest {
    /// Builds a request, rejecting empty paths and outputs that already carry a suffix
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        metadata: Option<CaseMetadata>,
    ) -> Result<Self, InvalidRequest> {
        let input = input.into();
        let output = output.into();
        validate_paths(&input, &output)?;

        Ok(Self {
            input,
            output,
            metadata,
        })
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Output base path, without the segment extension the tool appends
    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn metadata(&self) -> Option<&CaseMetadata> {
        self.metadata.as_ref()
    }

    /// `<output>.log`
    pub fn log_path(&self) -> PathBuf {
        let mut name = OsString::from(self.output.as_os_str());
        name.push(".log");
        PathBuf::from(name)
    }
}

pub fn validate_paths(input: &Path, output: &Path) -> Result<(), InvalidRequest> {
    if input.as_os_str().is_empty() {
        return Err(InvalidRequest::EmptyInput);
    }

    if output.as_os_str().is_empty() {
        return Err(InvalidRequest::EmptyOutput);
    }

    let raw = output.as_os_str().to_string_lossy();
    if raw.ends_with(std::path::MAIN_SEPARATOR) || raw.ends_with('/') || output.file_name().is_none()
    {
        return Err(InvalidRequest::OutputIsDirectory);
    }

    if let Some(ext) = output.extension() {
        return Err(InvalidRequest::OutputHasSuffix(
            ext.to_string_lossy().to_string(),
        ));
    }

    Ok(())
}

/// Drops a trailing extension such as `.E01` from a user-chosen image path
pub fn normalize_output_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.extension().is_some() {
        path.with_extension("")
    } else {
        path.to_path_buf()
    }
}
