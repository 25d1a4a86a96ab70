use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;

use crate::config::ToolConfig;
use crate::monitor::MonitorReport;
use crate::request::CaseMetadata;
use crate::types::{DigestType, MAX_PERCENT, MediaFlags, MediaType, ProgressEvent};

/// ewfwizard - guided forensic acquisition
///
/// Builds an ewfacquire command from a device and case details, runs it, and
/// follows its progress. Without a subcommand an interactive wizard starts.
#[derive(Parser)]
#[command(name = "ewfwizard")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Create forensic EWF images with ewfacquire", long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    pub debug: bool,

    /// JSON file with tool settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub tool: ToolArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List block devices that can be acquired
    Devices,

    /// Acquire a device without prompts
    Acquire {
        /// Device or file to image (e.g., /dev/sdb)
        #[arg(short, long)]
        input: PathBuf,

        /// Image base path; a trailing .E01 style suffix is removed
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        case: CaseArgs,

        /// Print the command instead of running it
        #[arg(long)]
        dry_run: bool,
    },

    /// Run the interactive wizard
    Wizard {
        /// Skip the final confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Args, Default)]
pub struct ToolArgs {
    /// Path to the ewfacquire binary
    #[arg(long, global = true)]
    pub tool: Option<PathBuf>,

    /// Digest calculated next to MD5
    #[arg(long, global = true, value_enum)]
    pub digest: Option<DigestType>,

    /// Regex marking a successful run (repeatable, replaces the defaults)
    #[arg(long = "completion-marker", global = true)]
    pub completion_markers: Vec<String>,
}

impl ToolArgs {
    pub fn apply(&self, mut config: ToolConfig) -> ToolConfig {
        if let Some(tool) = &self.tool {
            config = config.with_tool_path(tool);
        }
        if let Some(digest) = self.digest {
            config = config.with_digest(digest);
        }
        config.with_completion_markers(self.completion_markers.clone())
    }
}

#[derive(Args, Default)]
pub struct CaseArgs {
    /// Case number; any case option adds the full metadata block
    #[arg(long)]
    pub case_number: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub evidence_number: Option<String>,

    #[arg(long)]
    pub examiner: Option<String>,

    #[arg(long)]
    pub notes: Option<String>,

    #[arg(long, value_enum)]
    pub media_type: Option<MediaType>,

    #[arg(long, value_enum)]
    pub media_flags: Option<MediaFlags>,
}

impl CaseArgs {
    pub fn into_metadata(self) -> Option<CaseMetadata> {
        let any = self.case_number.is_some()
            || self.description.is_some()
            || self.evidence_number.is_some()
            || self.examiner.is_some()
            || self.notes.is_some()
            || self.media_type.is_some()
            || self.media_flags.is_some();
        if !any {
            return None;
        }

        Some(
            CaseMetadata::new(self.case_number.unwrap_or_default())
                .with_description(self.description.unwrap_or_default())
                .with_evidence_number(self.evidence_number.unwrap_or_default())
                .with_examiner(self.examiner.unwrap_or_default())
                .with_notes(self.notes.unwrap_or_default())
                .with_media(
                    self.media_type.unwrap_or_default(),
                    self.media_flags.unwrap_or_default(),
                ),
        )
    }
}

/// Progress bar driven by monitor events
pub struct ProgressReporter {
    bar: ProgressBar,
    echo: bool,
}

impl ProgressReporter {
    /// `echo` prints every tool line above the bar
    pub fn new(echo: bool) -> Result<Self, indicatif::style::TemplateError> {
        let bar = ProgressBar::new(MAX_PERCENT as u64);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos:>3}%")?
                .progress_chars("#>-"),
        );
        bar.set_message("Starting ewfacquire...".to_string());
        Ok(Self { bar, echo })
    }

    pub fn handle(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::LogLine(line) => {
                if self.echo {
                    self.bar.println(line);
                }
                if !line.trim().is_empty() {
                    self.bar.set_message(line.trim().to_string());
                }
            }
            ProgressEvent::PercentUpdate(percent) => self.bar.set_position(*percent as u64),
            ProgressEvent::Completed => self.bar.set_message("Acquisition completed".to_string()),
        }
    }

    pub fn tick(&self) {
        self.bar.tick();
    }

    pub fn finish(&self, report: &MonitorReport) {
        if report.completed() {
            self.bar.finish_with_message("Acquisition completed".to_string());
        } else {
            self.bar
                .abandon_with_message(format!("Acquisition stopped: {}", report.state));
        }
    }
}
