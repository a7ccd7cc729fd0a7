//! Folds every process's partial files into per-label point estimates.
//!
//! Work is isolated per tag: a missing or malformed partial fails only its own
//! tag, an undersampled label fails only itself. The only fatal error is not
//! being able to learn the tag set at all.

use crate::cleanup::{remove_captures, remove_partials, require_partitioned, CleanupReport};
use crate::config::DEFAULT_CAPTURE_EXTS;
use crate::file_handler::atomic_write;
use crate::naming::{discover_partials, validate_tag, RunLayout};
use crate::provenance::{prepend_submission, read_declared_tags, PrependOutcome};
use crate::stats::{format_g, summarize, SampleSummary};
use crate::McError;
use rustc_hash::FxHashMap;
use serde::Serialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone)]
pub struct ReduceOptions {
    /// Number of worker processes; `None` reduces a single unindexed file.
    pub njobs: Option<usize>,
    /// Explicit tag list, bypassing the provenance log.
    pub tags: Option<Vec<String>>,
    pub overwrite: bool,
    pub prepend: bool,
    pub clean: bool,
    pub capture_exts: Vec<String>,
}

impl Default for ReduceOptions {
    fn default() -> Self {
        Self {
            njobs: None,
            tags: None,
            overwrite: false,
            prepend: false,
            clean: false,
            capture_exts: DEFAULT_CAPTURE_EXTS.split(',').map(str::to_string).collect(),
        }
    }
}

/// Samples bucketed by label, labels kept in first-seen order.
#[derive(Debug, Default)]
pub struct AggregateSeries {
    positions: FxHashMap<String, usize>,
    buckets: Vec<(String, Vec<f64>)>,
}

impl AggregateSeries {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, label: &str, value: f64) {
        match self.positions.get(label) {
            Some(&pos) => self.buckets[pos].1.push(value),
            None => {
                self.positions.insert(label.to_string(), self.buckets.len());
                self.buckets.push((label.to_string(), vec![value]));
            }
        }
    }

    /// Append every `label<TAB>value` record of one partial file.
    pub fn absorb_file(&mut self, path: &Path) -> Result<usize, McError> {
        let file = File::open(path).map_err(|e| McError::file_access(path, e))?;
        let mut absorbed = 0;
        for (i, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| McError::file_access(path, e))?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let (label, value) = parse_record(line).map_err(|reason| McError::Parse {
                path: path.to_path_buf(),
                line: i + 1,
                reason,
            })?;
            self.push(label, value);
            absorbed += 1;
        }
        Ok(absorbed)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.buckets
            .iter()
            .map(|(label, samples)| (label.as_str(), samples.as_slice()))
    }
}

fn parse_record(line: &str) -> Result<(&str, f64), String> {
    let (label, value) = line
        .split_once('\t')
        .ok_or_else(|| format!("expected 'label<TAB>value', got {:?}", line))?;
    if label.is_empty() {
        return Err("empty label".to_string());
    }
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("value {:?} for label '{}' is not a number", value, label))?;
    if !value.is_finite() {
        return Err(format!("value for label '{}' is not finite", label));
    }
    Ok((label, value))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelRow {
    pub label: String,
    pub mean: f64,
    pub std_err: f64,
    pub count: usize,
}

impl LabelRow {
    fn new(label: &str, summary: SampleSummary) -> Self {
        Self {
            label: label.to_string(),
            mean: summary.mean,
            std_err: summary.std_err,
            count: summary.count,
        }
    }

    /// `mean<TAB>stderr<TAB>label<TAB>n`
    pub fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}",
            format_g(self.mean),
            format_g(self.std_err),
            self.label,
            self.count
        )
    }
}

/// Summarize every label; undersampled labels come back as errors.
pub fn summarize_series(tag: &str, series: &AggregateSeries) -> (Vec<LabelRow>, Vec<McError>) {
    let mut rows = Vec::new();
    let mut failures = Vec::new();
    for (label, samples) in series.iter() {
        match summarize(samples) {
            Some(summary) => rows.push(LabelRow::new(label, summary)),
            None => failures.push(McError::InsufficientSamples {
                tag: tag.to_string(),
                label: label.to_string(),
                count: samples.len(),
            }),
        }
    }
    (rows, failures)
}

pub fn render_result(rows: &[LabelRow]) -> String {
    let mut out = String::new();
    for row in rows {
        out.push_str(&row.to_line());
        out.push('\n');
    }
    out
}

#[derive(Debug)]
pub enum TagOutcome {
    Written {
        path: PathBuf,
        rows: Vec<LabelRow>,
        label_failures: Vec<McError>,
    },
    /// Result already present and overwrite not granted.
    Skipped(McError),
    Failed(McError),
}

impl TagOutcome {
    pub fn status(&self) -> &'static str {
        match self {
            TagOutcome::Written { label_failures, .. } if label_failures.is_empty() => "written",
            TagOutcome::Written { .. } => "written_partial",
            TagOutcome::Skipped(_) => "skipped",
            TagOutcome::Failed(_) => "failed",
        }
    }

    /// Written with every label summarized: the only state that licenses cleanup.
    pub fn is_complete(&self) -> bool {
        matches!(self, TagOutcome::Written { label_failures, .. } if label_failures.is_empty())
    }
}

#[derive(Debug)]
pub struct TagReport {
    pub tag: String,
    pub outcome: TagOutcome,
    pub cleanup: Option<CleanupReport>,
}

#[derive(Debug)]
pub struct ReduceReport {
    pub header: String,
    pub tags: Vec<TagReport>,
    pub prepend: Option<Result<PrependOutcome, McError>>,
    pub captures: Option<CleanupReport>,
    pub notices: Vec<String>,
}

impl ReduceReport {
    pub fn failed_tags(&self) -> impl Iterator<Item = &TagReport> {
        self.tags
            .iter()
            .filter(|t| matches!(t.outcome, TagOutcome::Failed(_)))
    }

    /// Every tag failed; the caller should exit non-zero.
    pub fn is_total_failure(&self) -> bool {
        !self.tags.is_empty() && self.failed_tags().count() == self.tags.len()
    }

    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            header: self.header.clone(),
            tags: self
                .tags
                .iter()
                .map(|t| {
                    let (path, labels, problems) = match &t.outcome {
                        TagOutcome::Written { path, rows, label_failures } => (
                            Some(path.clone()),
                            rows.clone(),
                            label_failures.iter().map(|e| e.to_string()).collect(),
                        ),
                        TagOutcome::Skipped(e) | TagOutcome::Failed(e) => {
                            let mut problems = vec![e.to_string()];
                            problems.extend(e.nested().iter().map(|n| n.to_string()));
                            (None, Vec::new(), problems)
                        }
                    };
                    let error_kind = match &t.outcome {
                        TagOutcome::Skipped(e) | TagOutcome::Failed(e) => Some(e.kind().to_string()),
                        TagOutcome::Written { .. } => None,
                    };
                    TagSummary {
                        tag: t.tag.clone(),
                        status: t.outcome.status().to_string(),
                        error_kind,
                        path,
                        labels,
                        problems,
                        removed: t.cleanup.as_ref().map(|c| c.removed.len()).unwrap_or(0),
                    }
                })
                .collect(),
            prepend: self.prepend.as_ref().map(|p| match p {
                Ok(PrependOutcome::Prepended(line)) => format!("prepended: {}", line),
                Ok(PrependOutcome::AlreadyPresent(line)) => format!("already present: {}", line),
                Err(e) => format!("skipped: {}", e),
            }),
            captures_removed: self.captures.as_ref().map(|c| c.removed.len()),
            notices: self.notices.clone(),
            total_failure: self.is_total_failure(),
        }
    }
}

/// Serializable view of a `ReduceReport`.
#[derive(Debug, Serialize)]
pub struct ReportSummary {
    pub header: String,
    pub tags: Vec<TagSummary>,
    pub prepend: Option<String>,
    pub captures_removed: Option<usize>,
    pub notices: Vec<String>,
    pub total_failure: bool,
}

#[derive(Debug, Serialize)]
pub struct TagSummary {
    pub tag: String,
    pub status: String,
    pub error_kind: Option<String>,
    pub path: Option<PathBuf>,
    pub labels: Vec<LabelRow>,
    pub problems: Vec<String>,
    pub removed: usize,
}

/// Reduce one tag: check for a result, read every partial, summarize, write.
#[instrument(skip(layout, options), fields(header = %layout.header))]
pub fn reduce_tag(layout: &RunLayout, tag: &str, options: &ReduceOptions) -> TagOutcome {
    let result_path = layout.result_path(tag);
    if result_path.exists() && !options.overwrite {
        return TagOutcome::Skipped(McError::WriteConflict { path: result_path });
    }

    let partials = layout.expected_partials(tag, options.njobs);
    if let Some(missing) = partials.iter().find(|p| !p.is_file()) {
        return TagOutcome::Failed(McError::MissingPartial {
            tag: tag.to_string(),
            path: missing.clone(),
        });
    }

    let mut series = AggregateSeries::new();
    for path in &partials {
        match series.absorb_file(path) {
            Ok(n) => debug!(path = %path.display(), records = n, "absorbed"),
            Err(e) => return TagOutcome::Failed(e),
        }
    }

    let (rows, label_failures) = summarize_series(tag, &series);
    if rows.is_empty() {
        return TagOutcome::Failed(McError::EmptySeries {
            tag: tag.to_string(),
            labels: label_failures,
        });
    }

    if let Err(e) = atomic_write(&result_path, render_result(&rows).as_bytes()) {
        return TagOutcome::Failed(e);
    }
    info!(path = %result_path.display(), labels = rows.len(), "result written");
    TagOutcome::Written {
        path: result_path,
        rows,
        label_failures,
    }
}

fn resolve_tags(layout: &RunLayout, options: &ReduceOptions) -> Result<Vec<String>, McError> {
    match &options.tags {
        Some(tags) if !tags.is_empty() => {
            for tag in tags {
                validate_tag(tag)?;
            }
            Ok(tags.clone())
        }
        _ => read_declared_tags(layout),
    }
}

/// Run a full reduction.
///
/// Returns `Err` only when the tag set cannot be determined; everything else
/// is recorded per tag in the report.
pub fn reduce(layout: &RunLayout, options: &ReduceOptions) -> Result<ReduceReport, McError> {
    if options.njobs == Some(0) {
        return Err(McError::Configuration(
            "process count must be positive, got 0".to_string(),
        ));
    }
    let tags = resolve_tags(layout, options)?;
    info!(header = %layout.header, tags = ?tags, njobs = ?options.njobs, "reducing");

    let mut report = ReduceReport {
        header: layout.header.clone(),
        tags: Vec::with_capacity(tags.len()),
        prepend: None,
        captures: None,
        notices: Vec::new(),
    };

    if options.njobs.is_none() {
        warn_unpartitioned(layout, &tags, &mut report);
    }

    for tag in &tags {
        let outcome = reduce_tag(layout, tag, options);
        match &outcome {
            TagOutcome::Failed(e) => warn!(tag = %tag, error = %e, "tag failed"),
            TagOutcome::Skipped(e) => info!(tag = %tag, "{}", e),
            TagOutcome::Written { label_failures, .. } => {
                for failure in label_failures {
                    warn!(tag = %tag, "{}", failure);
                }
            }
        }
        report.tags.push(TagReport {
            tag: tag.clone(),
            outcome,
            cleanup: None,
        });
    }

    if options.prepend {
        let result = prepend_submission(layout);
        if let Err(e) = &result {
            warn!(error = %e, "prepend skipped");
        }
        report.prepend = Some(result);
    }

    if options.clean {
        clean_after_reduce(layout, options, &mut report);
    }

    Ok(report)
}

/// Indexed partials on disk while reducing a single run usually mean a missing `--njobs`.
fn warn_unpartitioned(layout: &RunLayout, tags: &[String], report: &mut ReduceReport) {
    let found = match discover_partials(layout) {
        Ok(found) => found,
        Err(e) => {
            debug!(error = %e, "partial scan failed");
            return;
        }
    };
    for tag in tags {
        let indexed = found
            .iter()
            .filter(|p| &p.tag == tag && p.index.is_some())
            .count();
        if indexed > 0 {
            warn!(tag = %tag, indexed, "indexed partials present but no process count given");
            report.notices.push(format!(
                "tag '{}' has {} indexed partial file(s); pass --njobs to reduce them",
                tag, indexed
            ));
        }
    }
}

fn clean_after_reduce(layout: &RunLayout, options: &ReduceOptions, report: &mut ReduceReport) {
    let njobs = match require_partitioned(options.njobs) {
        Ok(n) => n,
        Err(e) => {
            report.notices.push(format!("cleanup skipped: {}", e));
            return;
        }
    };

    for tag_report in report.tags.iter_mut() {
        if tag_report.outcome.is_complete() {
            tag_report.cleanup = Some(remove_partials(layout, &tag_report.tag, njobs));
        } else {
            report.notices.push(format!(
                "cleanup skipped for tag '{}': result not freshly written in full",
                tag_report.tag
            ));
        }
    }

    if report.tags.iter().all(|t| t.outcome.is_complete()) {
        report.captures = Some(remove_captures(layout, njobs, &options.capture_exts));
    } else {
        report
            .notices
            .push("scheduler captures kept: not every tag was reduced".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_parse_record() {
        assert_eq!(parse_record("pi\t3.25"), Ok(("pi", 3.25)));
        assert_eq!(parse_record("gr__0.5\t 1.25 "), Ok(("gr__0.5", 1.25)));
        assert!(parse_record("3.25\tpi").is_err());
        assert!(parse_record("pi 3.25").is_err());
        assert!(parse_record("\t3.25").is_err());
        assert!(parse_record("pi\tinf").is_err());
        assert!(parse_record("pi\t1\t2").is_err());
    }

    #[test]
    fn test_series_keeps_first_seen_order() {
        let mut series = AggregateSeries::new();
        series.push("b", 1.0);
        series.push("a", 2.0);
        series.push("b", 3.0);
        let labels: Vec<&str> = series.iter().map(|(l, _)| l).collect();
        assert_eq!(labels, vec!["b", "a"]);
        let b: Vec<&[f64]> = series.iter().filter(|(l, _)| *l == "b").map(|(_, s)| s).collect();
        assert_eq!(b, vec![&[1.0, 3.0][..]]);
    }

    #[test]
    fn test_result_line_format() {
        let row = LabelRow::new("x", summarize(&[1.0, 2.0, 3.0]).unwrap());
        assert_eq!(row.to_line(), "2\t0.57735\tx\t3");
    }

    #[test]
    fn test_absorb_reports_line_of_bad_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.dat");
        fs::write(&path, "pi\t1\n\npi\toops\n").unwrap();
        let mut series = AggregateSeries::new();
        match series.absorb_file(&path) {
            Err(McError::Parse { line, .. }) => assert_eq!(line, 3),
            other => panic!("expected parse error, got {:?}", other),
        }
    }

    #[test]
    fn test_undersampled_label_is_isolated() {
        let mut series = AggregateSeries::new();
        for v in [1.0, 2.0, 3.0] {
            series.push("ok", v);
        }
        series.push("lonely", 5.0);
        let (rows, failures) = summarize_series("t", &series);
        assert_eq!(rows.len(), 1);
        assert_eq!(failures.len(), 1);
        assert!(matches!(
            &failures[0],
            McError::InsufficientSamples { label, count: 1, .. } if label == "lonely"
        ));
    }

    #[test]
    fn test_total_failure_needs_every_tag_failed() {
        let report = ReduceReport {
            header: "h".to_string(),
            tags: vec![
                TagReport {
                    tag: "a".to_string(),
                    outcome: TagOutcome::Failed(McError::EmptySeries {
                        tag: "a".to_string(),
                        labels: Vec::new(),
                    }),
                    cleanup: None,
                },
                TagReport {
                    tag: "b".to_string(),
                    outcome: TagOutcome::Skipped(McError::WriteConflict { path: PathBuf::from("x") }),
                    cleanup: None,
                },
            ],
            prepend: None,
            captures: None,
            notices: Vec::new(),
        };
        assert!(!report.is_total_failure());
        assert_eq!(report.failed_tags().count(), 1);
    }
}
