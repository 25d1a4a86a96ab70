use chrono::{DateTime, Local, SecondsFormat};
use std::fs::File;
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::AcquireError;
use crate::request::CaseMetadata;

/// Plain-text copy of everything the imaging tool prints, one line per line.
///
/// The file is truncated on creation and closed when the mirror is dropped.
pub struct LogMirror<W: Write = LineWriter<File>> {
    out: W,
    path: PathBuf,
    lines: u64,
}

impl LogMirror {
    pub fn create(path: &Path, metadata: Option<&CaseMetadata>) -> Result<Self, AcquireError> {
        let file = File::create(path).map_err(|source| AcquireError::LogFile {
            path: path.to_path_buf(),
            source,
        })?;

        let mut mirror = LogMirror::from_writer(LineWriter::new(file), path);
        if let Some(meta) = metadata {
            mirror
                .write_header(meta, Local::now())
                .map_err(|source| AcquireError::LogFile {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        Ok(mirror)
    }
}

impl<W: Write> LogMirror<W> {
    pub fn from_writer(out: W, path: impl Into<PathBuf>) -> Self {
        Self {
            out,
            path: path.into(),
            lines: 0,
        }
    }

    pub fn write_header(&mut self, meta: &CaseMetadata, started: DateTime<Local>) -> io::Result<()> {
        writeln!(self.out, "Case number: {}", meta.case_number)?;
        writeln!(self.out, "Description: {}", meta.description)?;
        writeln!(self.out, "Evidence number: {}", meta.evidence_number)?;
        writeln!(self.out, "Examiner: {}", meta.examiner)?;
        writeln!(self.out, "Notes: {}", meta.notes)?;
        writeln!(self.out, "Media type: {}", meta.media_type)?;
        writeln!(self.out, "Media characteristics: {}", meta.media_flags)?;
        writeln!(
            self.out,
            "Acquisition started: {}",
            started.to_rfc3339_opts(SecondsFormat::Secs, false)
        )?;
        writeln!(self.out)
    }

    pub fn write_line(&mut self, line: &str) -> Result<(), AcquireError> {
        writeln!(self.out, "{}", line).map_err(|source| self.error(source))?;
        self.lines += 1;
        Ok(())
    }

    pub fn finish(mut self) -> Result<W, AcquireError> {
        self.out.flush().map_err(|source| self.error(source))?;
        Ok(self.out)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    fn error(&self, source: io::Error) -> AcquireError {
        AcquireError::LogFile {
            path: self.path.clone(),
            source,
        }
    }
}
