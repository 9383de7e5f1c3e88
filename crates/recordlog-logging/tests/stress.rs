//! Integration tests for recordlog-logging
//!
//! Global subscriber installation can only happen once per process, so
//! everything that touches it lives in this one binary.

use std::thread;
use std::time::{Duration, Instant};

use recordlog_logging::{
    FileConfig, LogConfig, LoggingError, RecordlogSubscriberBuilder, RotationStrategy,
    init_testing,
};
use tempfile::TempDir;

/// Install a file-backed subscriber, log from many threads, check the file
#[test]
fn test_file_output_and_reinit() {
    let temp = TempDir::new().unwrap();
    let file = FileConfig {
        directory: temp.path().to_path_buf(),
        prefix: "diagnostics".to_string(),
        rotation: RotationStrategy::Never,
    };
    let config = LogConfig {
        default_level: "info".to_string(),
        ..LogConfig::production(temp.path().to_path_buf())
    };

    let guard = RecordlogSubscriberBuilder::new()
        .with_config(config)
        .with_file_output(file)
        .try_init()
        .unwrap()
        .expect("file output returns a guard");

    let start = Instant::now();
    let handles: Vec<_> = (0..8)
        .map(|t| {
            thread::spawn(move || {
                for i in 0..100 {
                    tracing::info!(thread = t, index = i, "stress event");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    println!("Logged 800 events in {:?}", start.elapsed());

    // A second install must fail instead of panicking
    assert!(matches!(
        RecordlogSubscriberBuilder::new().try_init(),
        Err(LoggingError::AlreadyInitialized(_))
    ));
    init_testing();
    init_testing();

    drop(guard);
    thread::sleep(Duration::from_millis(50));

    let text = std::fs::read_to_string(temp.path().join("diagnostics.log")).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 800);
    for line in lines.iter().take(10) {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert_eq!(value["message"], "stress event");
    }
}
