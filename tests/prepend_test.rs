use mrmc::provenance::{prepend_submission, PrependOutcome};
use mrmc::reducer::{reduce, ReduceOptions};
use mrmc::{McError, RunLayout};
use std::fs;

/// Prepending C to a log holding X yields exactly "C\nX".
#[test]
fn test_prepend_exact_content() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "p1").unwrap();
    fs::write(layout.log_path(), "X").unwrap();
    fs::write(layout.job_descriptor_path(), "C\nuniverse = vanilla\nqueue 2\n").unwrap();

    let outcome = prepend_submission(&layout).unwrap();
    assert_eq!(outcome, PrependOutcome::Prepended("C".to_string()));
    assert_eq!(fs::read_to_string(layout.log_path()).unwrap(), "C\nX");
}

/// A descriptor that cannot be read leaves the log byte-for-byte unchanged.
#[test]
fn test_failed_descriptor_read_leaves_log_intact() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "p2").unwrap();
    fs::write(layout.log_path(), "X").unwrap();

    let err = prepend_submission(&layout).unwrap_err();
    assert!(matches!(err, McError::FileAccess { .. }));
    assert_eq!(fs::read_to_string(layout.log_path()).unwrap(), "X");
}

#[test]
fn test_descriptor_that_is_a_directory_leaves_log_intact() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "p3").unwrap();
    fs::write(layout.log_path(), "X").unwrap();
    fs::create_dir(layout.job_descriptor_path()).unwrap();

    assert!(prepend_submission(&layout).is_err());
    assert_eq!(fs::read_to_string(layout.log_path()).unwrap(), "X");
}

#[test]
fn test_missing_log_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "p4").unwrap();
    fs::write(layout.job_descriptor_path(), "C\n").unwrap();
    assert!(prepend_submission(&layout).is_err());
    assert!(!layout.log_path().exists());
}

/// Prepend failure is reported in the run report without stopping aggregation.
#[test]
fn test_reducer_reports_prepend_failure_and_still_writes() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "p5").unwrap();
    fs::write(layout.log_path(), "# cmd\ndata collected for: pi\n").unwrap();
    fs::write(layout.partial_path("pi", Some(0)), "pi\t1\npi\t2\n").unwrap();

    let report = reduce(
        &layout,
        &ReduceOptions {
            njobs: Some(1),
            prepend: true,
            ..ReduceOptions::default()
        },
    )
    .unwrap();

    assert!(matches!(report.prepend, Some(Err(_))));
    assert!(layout.result_path("pi").exists());
    assert_eq!(
        fs::read_to_string(layout.log_path()).unwrap(),
        "# cmd\ndata collected for: pi\n"
    );
}

#[test]
fn test_reducer_prepends_once_across_reruns() {
    let dir = tempfile::tempdir().unwrap();
    let layout = RunLayout::new(dir.path(), "p6").unwrap();
    let log = "# throw_darts --header=p6\ndata collected for: pi\n";
    fs::write(layout.log_path(), log).unwrap();
    fs::write(layout.job_descriptor_path(), "# mrmc map throw_darts --header=p6 --njobs=1\n").unwrap();
    fs::write(layout.partial_path("pi", Some(0)), "pi\t1\npi\t2\n").unwrap();

    let options = ReduceOptions {
        njobs: Some(1),
        prepend: true,
        ..ReduceOptions::default()
    };
    reduce(&layout, &options).unwrap();
    let second = reduce(&layout, &options).unwrap();

    assert!(matches!(second.prepend, Some(Ok(PrependOutcome::AlreadyPresent(_)))));
    assert_eq!(
        fs::read_to_string(layout.log_path()).unwrap(),
        format!("# mrmc map throw_darts --header=p6 --njobs=1\n{}", log)
    );
}
