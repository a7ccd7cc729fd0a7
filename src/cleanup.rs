use crate::file_handler::{remove_if_exists, Removal};
use crate::naming::RunLayout;
use crate::McError;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, warn};

/// What a cleanup pass did.
#[derive(Debug, Default, Clone, Serialize)]
pub struct CleanupReport {
    pub removed: Vec<PathBuf>,
    pub absent: usize,
    pub failures: Vec<String>,
}

impl CleanupReport {
    fn remove(&mut self, path: PathBuf) {
        match remove_if_exists(&path) {
            Ok(Removal::Removed) => {
                debug!(path = %path.display(), "removed");
                self.removed.push(path);
            }
            Ok(Removal::Absent) => self.absent += 1,
            Err(e) => {
                warn!(error = %e, "cleanup failed");
                self.failures.push(e.to_string());
            }
        }
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Delete the indexed partial files of one tag.
///
/// The unindexed name is never touched: it is also the reduced result.
pub fn remove_partials(layout: &RunLayout, tag: &str, njobs: usize) -> CleanupReport {
    let mut report = CleanupReport::default();
    for index in 0..njobs {
        report.remove(layout.partial_path(tag, Some(index)));
    }
    report
}

/// Delete the scheduler's per-process stdout/stderr captures.
pub fn remove_captures(layout: &RunLayout, njobs: usize, exts: &[String]) -> CleanupReport {
    let mut report = CleanupReport::default();
    for index in 0..njobs {
        for ext in exts {
            report.remove(layout.capture_path(index, ext));
        }
    }
    report
}

/// Refuse to build a cleanup plan for a run with no process count.
pub fn require_partitioned(njobs: Option<usize>) -> Result<usize, McError> {
    njobs.ok_or_else(|| {
        McError::Configuration(
            "cleanup needs a process count; a single run keeps its only data file".to_string(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_remove_partials_spares_result() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "t1").unwrap();
        for i in 0..3 {
            fs::write(layout.partial_path("pi", Some(i)), "pi\t1\n").unwrap();
        }
        fs::write(layout.result_path("pi"), "1\t0\tpi\t3\n").unwrap();
        fs::write(layout.partial_path("gr", Some(0)), "").unwrap();

        let report = remove_partials(&layout, "pi", 4);
        assert_eq!(report.removed.len(), 3);
        assert_eq!(report.absent, 1);
        assert!(report.is_clean());
        assert!(layout.result_path("pi").exists());
        assert!(layout.partial_path("gr", Some(0)).exists());
    }

    #[test]
    fn test_remove_captures() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "t1").unwrap();
        fs::write(layout.capture_path(0, "out"), "").unwrap();
        fs::write(layout.capture_path(1, "err"), "").unwrap();
        let exts = vec![".out".to_string(), ".err".to_string()];
        let report = remove_captures(&layout, 2, &exts);
        assert_eq!(report.removed.len(), 2);
        assert_eq!(report.absent, 2);
    }

    #[test]
    fn test_require_partitioned() {
        assert_eq!(require_partitioned(Some(4)).unwrap(), 4);
        assert!(require_partitioned(None).is_err());
    }
}
