//! Worker side of the file contract.
//!
//! A worker owns one partial file per declared tag and, when it is the
//! designated process, the run's provenance log. The reducer relies on
//! nothing else.

use crate::naming::RunLayout;
use crate::provenance::write_provenance_log;
use crate::McError;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Process 0, or an unpartitioned run, writes the provenance log.
pub fn writes_log(index: Option<usize>) -> bool {
    matches!(index, None | Some(0))
}

/// Appends `label<TAB>value` records to one partial file.
pub struct PartialWriter {
    path: PathBuf,
    out: BufWriter<File>,
    records: usize,
}

impl PartialWriter {
    /// Start a fresh series, truncating whatever a previous attempt left.
    pub fn create(layout: &RunLayout, tag: &str, index: Option<usize>) -> Result<Self, McError> {
        crate::naming::validate_tag(tag)?;
        let path = layout.partial_path(tag, index);
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| McError::file_access(&path, e))?;
        Ok(Self {
            path,
            out: BufWriter::new(file),
            records: 0,
        })
    }

    pub fn record(&mut self, label: &str, value: f64) -> Result<(), McError> {
        if label.is_empty() || label.contains(['\t', '\n', '\r']) {
            return Err(McError::Configuration(format!(
                "record label {:?} must be non-empty and free of tabs/newlines",
                label
            )));
        }
        writeln!(self.out, "{}\t{}", label, value).map_err(|e| McError::file_access(&self.path, e))?;
        self.records += 1;
        Ok(())
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn finish(mut self) -> Result<PathBuf, McError> {
        self.out
            .flush()
            .map_err(|e| McError::file_access(&self.path, e))?;
        Ok(self.path)
    }
}

/// Open a writer for every tag and write the log if this process is the designated one.
pub fn start_series(
    layout: &RunLayout,
    index: Option<usize>,
    command_line: &str,
    tags: &[String],
) -> Result<Vec<PartialWriter>, McError> {
    let writers = tags
        .iter()
        .map(|tag| PartialWriter::create(layout, tag, index))
        .collect::<Result<Vec<_>, _>>()?;
    if writes_log(index) {
        write_provenance_log(layout, command_line, tags)?;
    }
    Ok(writers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_writes_log_for_first_or_single_process() {
        assert!(writes_log(None));
        assert!(writes_log(Some(0)));
        assert!(!writes_log(Some(1)));
    }

    #[test]
    fn test_partial_writer_format() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "t1").unwrap();
        let mut writer = PartialWriter::create(&layout, "pi", Some(1)).unwrap();
        writer.record("pi", 3.1).unwrap();
        writer.record("pi", 3.25).unwrap();
        assert_eq!(writer.records(), 2);
        let path = writer.finish().unwrap();
        assert_eq!(path, dir.path().join("t1_pi__1.dat"));
        assert_eq!(fs::read_to_string(path).unwrap(), "pi\t3.1\npi\t3.25\n");
    }

    #[test]
    fn test_partial_writer_rejects_tab_in_label() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "t1").unwrap();
        let mut writer = PartialWriter::create(&layout, "pi", None).unwrap();
        assert!(writer.record("p\ti", 1.0).is_err());
    }

    #[test]
    fn test_start_series_only_first_process_logs() {
        let dir = tempfile::tempdir().unwrap();
        let layout = RunLayout::new(dir.path(), "t1").unwrap();
        let tags = vec!["pi".to_string(), "gr".to_string()];

        let writers = start_series(&layout, Some(1), "cmd", &tags).unwrap();
        assert_eq!(writers.len(), 2);
        assert!(!layout.log_path().exists());

        start_series(&layout, Some(0), "cmd", &tags).unwrap();
        assert!(layout.log_path().exists());
    }
}
