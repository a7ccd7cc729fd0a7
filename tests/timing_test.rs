use mrmc::timing::analyze;
use mrmc::{McError, RunLayout};
use std::fs;
use std::time::Duration;

const NODES_LOG: &str = "\
000 (042.000.000) 10/01 12:00:00 Job submitted from host: <10.0.0.1>
005 (042.000.000) 10/01 12:10:04 Job terminated.
\t(1) Normal termination (return value 0)
\t\tUsr 0 00:10:00, Sys 0 00:00:02  -  Run Remote Usage
\t\tUsr 0 00:10:00, Sys 0 00:00:02  -  Total Remote Usage
005 (042.001.000) 10/01 12:30:00 Job terminated.
\t\tUsr 0 00:30:00, Sys 0 00:00:05  -  Total Remote Usage
005 (042.002.000) 10/02 13:00:00 Job terminated.
\t\tUsr 1 01:00:00, Sys 0 00:00:05  -  Total Remote Usage
\t\tUsr 0 xx:00:00, Sys 0 00:00:05  -  Total Remote Usage
";

#[test]
fn test_sums_remote_usage_and_skips_malformed_lines() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "mytest").unwrap();
    fs::write(layout.dag_nodes_log_path(), NODES_LOG).unwrap();

    let summary = analyze(&layout.dag_nodes_log_path()).unwrap();
    assert_eq!(summary.count, 3);
    assert_eq!(summary.total, Duration::from_secs(600 + 1800 + 86_400 + 3600));
    assert_eq!(summary.mean(), Some(Duration::from_secs(30_800)));
    assert_eq!(summary.skipped.len(), 1);
    assert!(matches!(summary.skipped[0], McError::Parse { line: 10, .. }));

    let line = summary.report_line();
    assert!(line.ends_with("total run time = 1 day, 1:40:00, mean run time (3 jobs) = 8:33:20"));
}

#[test]
fn test_log_without_usage_lines() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "quiet").unwrap();
    fs::write(layout.dag_nodes_log_path(), "000 (001.000.000) submitted\n").unwrap();

    let summary = analyze(&layout.dag_nodes_log_path()).unwrap();
    assert_eq!(summary.count, 0);
    assert_eq!(summary.mean(), None);
    assert!(summary.report_line().ends_with("mean run time (0 jobs) = n/a"));
}

#[test]
fn test_missing_log_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "absent").unwrap();
    assert!(matches!(
        analyze(&layout.dag_nodes_log_path()),
        Err(McError::Parse { .. })
    ));
}
