use crossbeam_channel::unbounded;
use proptest::prelude::*;
use std::io::Cursor;

use ewfwizard::config::DEFAULT_COMPLETION_MARKERS;
use ewfwizard::log_mirror::LogMirror;
use ewfwizard::monitor::{RelaySummary, relay_output};
use ewfwizard::{AcquireError, LineClassifier, MonitorState, ProgressEvent, ToolConfig};

fn classifier() -> LineClassifier {
    LineClassifier::from_config(&ToolConfig::default()).unwrap()
}

fn relay(input: &str) -> (RelaySummary, String, Vec<ProgressEvent>) {
    let (tx, rx) = unbounded();
    let mut log = LogMirror::from_writer(Vec::new(), "test.log");
    let mut reader = Cursor::new(input.as_bytes().to_vec());

    let summary = relay_output(&mut reader, &mut log, &classifier(), &tx).unwrap();
    drop(tx);

    let text = String::from_utf8(log.finish().unwrap()).unwrap();
    (summary, text, rx.iter().collect())
}

fn percent_events(events: &[ProgressEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::PercentUpdate(p) => Some(*p),
            _ => None,
        })
        .collect()
}

#[test]
fn test_single_status_line() {
    let (summary, _, events) = relay("Status: at 42%.\n");

    assert_eq!(
        events,
        vec![
            ProgressEvent::LogLine("Status: at 42%.".to_string()),
            ProgressEvent::PercentUpdate(42),
        ]
    );
    assert_eq!(summary.last_percent, Some(42));
    assert!(!summary.completed);
}

#[test]
fn test_completion_stops_reading() {
    let input = "\
ewfacquire 20140608
Status: at 99%.
Acquiry completed at: Oct 18, 2026 10:12:01
Written: 7.4 GiB (8004304896 bytes) in 5 minute(s) and 12 second(s).
MD5 hash calculated over data: 0123456789abcdef0123456789abcdef
";
    let (summary, log, events) = relay(input);

    assert!(summary.completed);
    assert_eq!(summary.lines, 3);
    assert_eq!(
        log,
        "ewfacquire 20140608\nStatus: at 99%.\nAcquiry completed at: Oct 18, 2026 10:12:01\n"
    );

    let tail = &events[events.len() - 3..];
    assert_eq!(
        tail,
        &[
            ProgressEvent::LogLine("Acquiry completed at: Oct 18, 2026 10:12:01".to_string()),
            ProgressEvent::PercentUpdate(100),
            ProgressEvent::Completed,
        ]
    );
    assert_eq!(percent_events(&events), vec![99, 100]);
}

#[test]
fn test_success_marker_variant() {
    let (summary, _, events) = relay("Status: at 100%.\newfacquire: SUCCESS\ntrailing\n");

    assert!(summary.completed);
    assert_eq!(summary.lines, 2);
    assert_eq!(events.last(), Some(&ProgressEvent::Completed));
}

#[test]
fn test_end_of_stream_without_completion() {
    let (summary, log, events) = relay("Status: at 10%.\nError: unable to read device\n");

    assert!(!summary.completed);
    assert_eq!(summary.lines, 2);
    assert_eq!(summary.last_percent, Some(10));
    assert_eq!(log, "Status: at 10%.\nError: unable to read device\n");
    assert!(!events.contains(&ProgressEvent::Completed));
}

#[test]
fn test_empty_stream() {
    let (summary, log, events) = relay("");
    assert_eq!(summary, RelaySummary::default());
    assert!(log.is_empty());
    assert!(events.is_empty());
}

#[test]
fn test_crlf_and_missing_final_newline() {
    let (summary, log, events) = relay("first\r\nStatus: at 7%");

    assert_eq!(summary.lines, 2);
    assert_eq!(log, "first\nStatus: at 7%\n");
    assert_eq!(events[0], ProgressEvent::LogLine("first".to_string()));
    assert_eq!(percent_events(&events), vec![7]);
}

#[test]
fn test_invalid_utf8_is_lossy() {
    let (tx, _rx) = unbounded();
    let mut log = LogMirror::from_writer(Vec::new(), "test.log");
    let mut reader = Cursor::new(b"bad \xff byte\n".to_vec());

    let summary = relay_output(&mut reader, &mut log, &classifier(), &tx).unwrap();
    assert_eq!(summary.lines, 1);

    let text = String::from_utf8(log.finish().unwrap()).unwrap();
    assert_eq!(text, "bad \u{fffd} byte\n");
}

#[test]
fn test_dropped_receiver_keeps_mirroring() {
    let (tx, rx) = unbounded();
    drop(rx);
    let mut log = LogMirror::from_writer(Vec::new(), "test.log");
    let mut reader = Cursor::new(b"one\ntwo\n".to_vec());

    let summary = relay_output(&mut reader, &mut log, &classifier(), &tx).unwrap();
    assert_eq!(summary.lines, 2);
    assert_eq!(log.finish().unwrap(), b"one\ntwo\n");
}

#[test]
fn test_log_write_failure() {
    struct FailingWriter;

    impl std::io::Write for FailingWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("disk full"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    let (tx, rx) = unbounded();
    let mut log = LogMirror::from_writer(FailingWriter, "full.log");
    let mut reader = Cursor::new(b"Status: at 1%\n".to_vec());

    let err = relay_output(&mut reader, &mut log, &classifier(), &tx).unwrap_err();
    assert!(matches!(err, AcquireError::LogFile { .. }));
    drop(tx);
    assert_eq!(rx.iter().count(), 0);
}

#[test]
fn test_classifier_percent() {
    let c = classifier();
    assert_eq!(c.percent("Status: at 0%."), Some(0));
    assert_eq!(c.percent("Status: at 100%."), Some(100));
    assert_eq!(c.percent("Status: at 250%."), Some(100));
    assert_eq!(c.percent("Status: at 99999999999999999999999%"), Some(100));
    assert_eq!(c.percent("Status: at %"), None);
    assert_eq!(c.percent("acquired 42% so far"), None);
}

#[test]
fn test_classifier_ignores_non_ascii_digits() {
    // Arabic-Indic "42"
    let line = "Status: at \u{0664}\u{0662}%";
    assert_eq!(classifier().percent(line), None);

    let unicode = LineClassifier::new(r"Status: at (\d+)%", &["^DONE$"]).unwrap();
    assert_eq!(unicode.percent(line), None);
    assert_eq!(unicode.percent("Status: at 42%"), Some(42));

    let (summary, log, events) = relay(&format!("{}\n", line));
    assert_eq!(summary.last_percent, None);
    assert_eq!(log, format!("{}\n", line));
    assert!(percent_events(&events).is_empty());
}

#[test]
fn test_classifier_markers() {
    let c = classifier();
    for marker in DEFAULT_COMPLETION_MARKERS {
        assert!(c.is_completion(marker));
    }
    assert!(!c.is_completion("ewfacquire: FAILURE"));

    let custom = LineClassifier::new(r"(\d+) percent", &["^DONE$"]).unwrap();
    assert_eq!(custom.percent("12 percent"), Some(12));
    assert!(custom.is_completion("DONE"));
    assert!(!custom.is_completion("Acquiry completed at: now"));
}

#[test]
fn test_classifier_rejects_bad_patterns() {
    assert!(matches!(
        LineClassifier::new("Status: at %", &["x"]),
        Err(AcquireError::Pattern(_))
    ));
    assert!(LineClassifier::new(r"(\d+)", &["(unclosed"]).is_err());
}

#[test]
fn test_monitor_state_display() {
    assert_eq!(MonitorState::Killed.to_string(), "killed");
}

proptest! {
    #[test]
    fn prop_every_line_logged_once_in_order(
        lines in prop::collection::vec("[a-zA-Z0-9 :%.,-]{0,60}", 0..40)
    ) {
        let lines: Vec<String> = lines
            .into_iter()
            .filter(|l| !l.contains("Acquiry completed at:") && !l.contains("ewfacquire: SUCCESS"))
            .collect();
        let mut input = String::new();
        for line in &lines {
            input.push_str(line);
            input.push('\n');
        }

        let (summary, log, events) = relay(&input);

        prop_assert_eq!(summary.lines as usize, lines.len());
        prop_assert_eq!(log.lines().collect::<Vec<_>>(), lines.iter().map(String::as_str).collect::<Vec<_>>());

        let logged: Vec<String> = events
            .into_iter()
            .filter_map(|e| match e {
                ProgressEvent::LogLine(l) => Some(l),
                _ => None,
            })
            .collect();
        prop_assert_eq!(logged, lines);
    }

    #[test]
    fn prop_status_percent_roundtrips(n in 0u8..=100) {
        let (_, _, events) = relay(&format!("Status: at {}%.\n", n));
        prop_assert_eq!(percent_events(&events), vec![n]);
    }
}
