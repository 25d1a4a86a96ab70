#![no_main]

use libfuzzer_sys::fuzz_target;
use std::io::Cursor;

use ewfwizard::log_mirror::LogMirror;
use ewfwizard::monitor::relay_output;
use ewfwizard::{LineClassifier, ProgressEvent, ToolConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(classifier) = LineClassifier::from_config(&ToolConfig::default()) else {
        return;
    };
    let (tx, rx) = crossbeam_channel::unbounded();
    let mut log = LogMirror::from_writer(Vec::new(), "fuzz.log");
    let mut reader = Cursor::new(data);

    let summary = relay_output(&mut reader, &mut log, &classifier, &tx).unwrap();
    drop(tx);

    for event in rx.iter() {
        if let ProgressEvent::PercentUpdate(p) = event {
            assert!(p <= 100);
        }
    }
    assert_eq!(summary.lines, log.lines());
});
