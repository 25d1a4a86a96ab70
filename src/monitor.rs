//! Progress monitor for the external imaging tool
//!
//! The monitor spawns the tool, relays its stdout line by line to a log mirror
//! and to an event channel, and recognises two kinds of lines: periodic
//! `Status: at N%` updates and the completion marker. Reads block, so the relay
//! loop runs on its own worker thread; the owner only ever sees `ProgressEvent`s.

use crossbeam_channel::{Receiver, Sender, unbounded};
use parking_lot::Mutex;
use regex::{Regex, RegexSet};
use std::ffi::OsString;
use std::num::IntErrorKind;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{ChildStderr, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::command::{build_args, render_command_line};
use crate::config::ToolConfig;
use crate::error::AcquireError;
use crate::log_mirror::LogMirror;
use crate::process::ProcessHandle;
use crate::request::AcquisitionRequest;
use crate::types::{MAX_PERCENT, MonitorState, ProgressEvent};

/// Recognises progress and completion lines in the tool's output
#[derive(Debug, Clone)]
pub struct LineClassifier {
    percent: Regex,
    completion: RegexSet,
}

impl LineClassifier {
    pub fn new<S: AsRef<str>>(percent_pattern: &str, markers: &[S]) -> Result<Self, AcquireError> {
        let percent = Regex::new(percent_pattern)?;
        if percent.captures_len() < 2 {
            return Err(AcquireError::Pattern(regex::Error::Syntax(format!(
                "percent pattern `{}` has no capture group",
                percent_pattern
            ))));
        }
        let completion = RegexSet::new(markers)?;

        Ok(Self {
            percent,
            completion,
        })
    }

    pub fn from_config(config: &ToolConfig) -> Result<Self, AcquireError> {
        Self::new(&config.percent_pattern, config.completion_markers.as_slice())
    }

    /// Percentage reported on this line, clamped to 100.
    ///
    /// A capture that is not an ASCII integer yields `None`.
    pub fn percent(&self, line: &str) -> Option<u8> {
        let caps = self.percent.captures(line)?;
        let digits = caps.get(1)?.as_str();
        match digits.parse::<u64>() {
            Ok(value) => Some(value.min(MAX_PERCENT as u64) as u8),
            Err(e) if *e.kind() == IntErrorKind::PosOverflow => Some(MAX_PERCENT),
            Err(_) => None,
        }
    }

    pub fn is_completion(&self, line: &str) -> bool {
        self.completion.is_match(line)
    }
}

/// What the relay loop saw before it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RelaySummary {
    pub lines: u64,
    pub last_percent: Option<u8>,
    pub completed: bool,
}

/// Copies every line from `reader` to the log and the event channel.
///
/// Stops after the first completion line, leaving anything queued behind it
/// unread, or when the stream ends. Events are best-effort: a consumer that has
/// gone away does not stop the mirror.
pub fn relay_output<R: BufRead, W: Write>(
    reader: &mut R,
    log: &mut LogMirror<W>,
    classifier: &LineClassifier,
    events: &Sender<ProgressEvent>,
) -> Result<RelaySummary, AcquireError> {
    let mut summary = RelaySummary::default();
    let mut buf = Vec::with_capacity(256);

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }

        let line = String::from_utf8_lossy(trim_line_ending(&buf)).into_owned();
        log.write_line(&line)?;
        summary.lines += 1;

        let percent = classifier.percent(&line);
        let completed = classifier.is_completion(&line);
        let _ = events.send(ProgressEvent::LogLine(line));

        if let Some(percent) = percent {
            summary.last_percent = Some(percent);
            let _ = events.send(ProgressEvent::PercentUpdate(percent));
        }

        if completed {
            summary.last_percent = Some(MAX_PERCENT);
            summary.completed = true;
            let _ = events.send(ProgressEvent::PercentUpdate(MAX_PERCENT));
            let _ = events.send(ProgressEvent::Completed);
            break;
        }
    }

    Ok(summary)
}

fn trim_line_ending(buf: &[u8]) -> &[u8] {
    let buf = buf.strip_suffix(b"\n").unwrap_or(buf);
    buf.strip_suffix(b"\r").unwrap_or(buf)
}

/// Final account of one run
#[derive(Debug, Clone)]
pub struct MonitorReport {
    pub state: MonitorState,
    pub lines: u64,
    pub last_percent: Option<u8>,
    pub exit_status: Option<ExitStatus>,
    pub log_path: PathBuf,
}

impl MonitorReport {
    pub fn completed(&self) -> bool {
        self.state == MonitorState::Completed
    }

    /// Treats every terminal state other than `Completed` as a failed acquisition
    pub fn into_result(self) -> Result<Self, AcquireError> {
        if self.completed() {
            return Ok(self);
        }

        let exit = match self.exit_status {
            Some(status) => status.to_string(),
            None => "no exit status".to_string(),
        };
        let percent = match self.last_percent {
            Some(p) => format!("{}%", p),
            None => "no progress".to_string(),
        };

        Err(AcquireError::Incomplete {
            state: self.state,
            detail: format!(
                "{}, last progress {}, {} lines logged to {}",
                exit,
                percent,
                self.lines,
                self.log_path.display()
            ),
        })
    }
}

/// A prepared, not yet started acquisition
pub struct ProgressMonitor {
    request: AcquisitionRequest,
    config: ToolConfig,
    args: Vec<OsString>,
    classifier: LineClassifier,
}

impl ProgressMonitor {
    pub fn new(request: AcquisitionRequest, config: ToolConfig) -> Result<Self, AcquireError> {
        let classifier = LineClassifier::from_config(&config)?;
        let args = build_args(&request, &config);

        Ok(Self {
            request,
            config,
            args,
            classifier,
        })
    }

    pub fn state(&self) -> MonitorState {
        MonitorState::NotStarted
    }

    pub fn args(&self) -> &[OsString] {
        &self.args
    }

    pub fn command_line(&self) -> String {
        render_command_line(&self.config.tool_path, &self.args)
    }

    pub fn log_path(&self) -> PathBuf {
        self.request.log_path()
    }

    /// Spawns the tool and the worker that watches it.
    ///
    /// Spawn and log-file failures are returned here, before any event is
    /// produced; in the latter case the already-running child is killed.
    pub fn start(self) -> Result<MonitorHandle, AcquireError> {
        let tool = self.config.tool_path.clone();
        let log_path = self.request.log_path();

        info!(command = %self.command_line(), "launching imaging tool");

        let mut child = Command::new(&tool)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| AcquireError::Spawn {
                tool: tool.clone(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let process = ProcessHandle::new(child);
        debug!(pid = process.pid(), "imaging tool started");

        let stdout = match stdout {
            Some(stdout) => stdout,
            None => {
                let _ = process.kill();
                return Err(AcquireError::Spawn {
                    tool,
                    source: std::io::Error::other("stdout was not captured"),
                });
            }
        };

        let log = match LogMirror::create(&log_path, self.request.metadata()) {
            Ok(log) => log,
            Err(e) => {
                warn!(pid = process.pid(), "log file unavailable, killing imaging tool");
                let _ = process.kill();
                return Err(e);
            }
        };

        if let Some(stderr) = stderr {
            spawn_stderr_drain(stderr);
        }

        let (tx, rx) = unbounded();
        let state = Arc::new(Mutex::new(MonitorState::Running));
        let worker = Worker {
            process: process.clone(),
            classifier: self.classifier,
            state: Arc::clone(&state),
            grace: Duration::from_millis(self.config.exit_grace_ms),
            log_path: log_path.clone(),
        };

        let worker = thread::Builder::new()
            .name("ewf-monitor".to_string())
            .spawn(move || worker.run(BufReader::new(stdout), log, tx))
            .map_err(|e| {
                let _ = process.kill();
                AcquireError::Io(e)
            })?;

        Ok(MonitorHandle {
            events: rx,
            process,
            state,
            worker: Some(worker),
            log_path,
        })
    }
}

/// Marks a run the worker leaves without settling as killed
struct SettleOnExit(Arc<Mutex<MonitorState>>);

impl Drop for SettleOnExit {
    fn drop(&mut self) {
        let mut state = self.0.lock();
        if !state.is_terminal() {
            *state = MonitorState::Killed;
        }
    }
}

struct Worker {
    process: ProcessHandle,
    classifier: LineClassifier,
    state: Arc<Mutex<MonitorState>>,
    grace: Duration,
    log_path: PathBuf,
}

impl Worker {
    fn run<R: Read>(
        self,
        mut reader: BufReader<R>,
        mut log: LogMirror,
        events: Sender<ProgressEvent>,
    ) -> Result<MonitorReport, AcquireError> {
        let _settle = SettleOnExit(Arc::clone(&self.state));
        let relayed =
            relay_output(&mut reader, &mut log, &self.classifier, &events).and_then(|summary| {
                log.finish()?;
                Ok(summary)
            });
        drop(events);

        let summary = match relayed {
            Ok(summary) => summary,
            Err(e) => {
                warn!(pid = self.process.pid(), "aborting acquisition: {}", e);
                let _ = self.process.kill();
                return Err(e);
            }
        };

        let state = if summary.completed {
            if let Err(e) = self.process.terminate(self.grace) {
                warn!(pid = self.process.pid(), "failed to stop imaging tool: {}", e);
            }
            MonitorState::Completed
        } else {
            if let Err(e) = self.process.wait() {
                warn!(pid = self.process.pid(), "failed to reap imaging tool: {}", e);
                self.process.cancel();
                return Err(e.into());
            }
            if self.process.is_cancelled() {
                MonitorState::Killed
            } else {
                MonitorState::EndOfStreamWithoutCompletion
            }
        };
        *self.state.lock() = state;

        let report = MonitorReport {
            state,
            lines: summary.lines,
            last_percent: summary.last_percent,
            exit_status: self.process.exit_status(),
            log_path: self.log_path,
        };
        info!(
            state = %report.state,
            lines = report.lines,
            "imaging tool finished"
        );
        Ok(report)
    }
}

fn spawn_stderr_drain(stderr: ChildStderr) {
    let spawned = thread::Builder::new()
        .name("ewf-stderr".to_string())
        .spawn(move || {
            for line in BufReader::new(stderr).lines() {
                match line {
                    Ok(line) if !line.trim().is_empty() => warn!(target: "ewfacquire", "{}", line),
                    Ok(_) => {}
                    Err(_) => break,
                }
            }
        });
    if let Err(e) = spawned {
        warn!("could not watch imaging tool stderr: {}", e);
    }
}

/// Owner-side view of a running acquisition
pub struct MonitorHandle {
    events: Receiver<ProgressEvent>,
    process: ProcessHandle,
    state: Arc<Mutex<MonitorState>>,
    worker: Option<JoinHandle<Result<MonitorReport, AcquireError>>>,
    log_path: PathBuf,
}

impl MonitorHandle {
    /// Events in the order they were produced; disconnects once the worker is done
    pub fn events(&self) -> &Receiver<ProgressEvent> {
        &self.events
    }

    pub fn state(&self) -> MonitorState {
        *self.state.lock()
    }

    pub fn process(&self) -> &ProcessHandle {
        &self.process
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    pub fn cancel(&self) {
        info!(pid = self.process.pid(), "cancelling acquisition");
        self.process.cancel();
    }

    /// Waits for the worker to reach a terminal state
    pub fn join(mut self) -> Result<MonitorReport, AcquireError> {
        match self.worker.take() {
            Some(worker) => worker.join().map_err(|_| AcquireError::WorkerPanicked)?,
            None => Err(AcquireError::WorkerPanicked),
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.process.cancel();
            let _ = worker.join();
        }
    }
}
