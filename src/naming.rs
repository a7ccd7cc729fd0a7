//! Canonical artifact names for one run.
//!
//! Every file a run produces is addressed through this module and nothing
//! else. The order is fixed: `<header>_<tag>__<index>.dat` for indexed
//! partials, `<header>_<tag>.dat` for the unindexed form (which doubles as the
//! reduced result). `parse_partial_name` is the exact inverse of
//! `partial_file_name`.

use crate::McError;
use std::fmt::Display;
use std::fs;
use std::path::{Path, PathBuf};

pub const DATA_EXT: &str = "dat";
pub const INDEX_SEPARATOR: &str = "__";
pub const TAG_SEPARATOR: &str = "_";
/// Scheduler macro substituted with the per-unit process index.
pub const PROCESS_MACRO: &str = "$(Process)";
pub const DEFAULT_WORK_DIR: &str = ".";
pub const WORK_DIR_ENV: &str = "MRMC_WORK_DIR";

pub fn validate_header(header: &str) -> Result<(), McError> {
    if header.is_empty() {
        return Err(McError::Configuration("header must not be empty".to_string()));
    }
    if let Some(c) = header
        .chars()
        .find(|c| c.is_whitespace() || matches!(c, '/' | '\\' | '$' | '(' | ')'))
    {
        return Err(McError::Configuration(format!(
            "header '{}' contains forbidden character {:?}",
            header, c
        )));
    }
    Ok(())
}

pub fn validate_tag(tag: &str) -> Result<(), McError> {
    if tag.is_empty() {
        return Err(McError::Configuration("data series tag must not be empty".to_string()));
    }
    if let Some(c) = tag
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
    {
        return Err(McError::Configuration(format!(
            "tag '{}' contains forbidden character {:?}",
            tag, c
        )));
    }
    if tag.starts_with('_') || tag.ends_with('_') {
        return Err(McError::Configuration(format!(
            "tag '{}' must not start or end with '_'",
            tag
        )));
    }
    if tag.contains(INDEX_SEPARATOR) {
        return Err(McError::Configuration(format!(
            "tag '{}' must not contain the index separator '{}'",
            tag, INDEX_SEPARATOR
        )));
    }
    Ok(())
}

/// File name of a partial; `None` yields the unindexed (single run or reduced) name.
pub fn partial_file_name(header: &str, tag: &str, index: Option<usize>) -> String {
    match index {
        Some(i) => format!("{header}{TAG_SEPARATOR}{tag}{INDEX_SEPARATOR}{i}.{DATA_EXT}"),
        None => format!("{header}{TAG_SEPARATOR}{tag}.{DATA_EXT}"),
    }
}

/// Scheduler capture name; `slot` is either a concrete index or `PROCESS_MACRO`.
pub fn capture_file_name(header: &str, slot: impl Display, ext: &str) -> String {
    format!("{header}{INDEX_SEPARATOR}{slot}.{}", ext.trim_start_matches('.'))
}

/// A partial file name decoded back into its tag and optional index.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PartialName {
    pub tag: String,
    pub index: Option<usize>,
}

/// Inverse of `partial_file_name` for a given header.
pub fn parse_partial_name(header: &str, file_name: &str) -> Option<PartialName> {
    let stem = file_name.strip_suffix(&format!(".{DATA_EXT}"))?;
    let rest = stem
        .strip_prefix(header)?
        .strip_prefix(TAG_SEPARATOR)?;

    let (tag, index) = match rest.rsplit_once(INDEX_SEPARATOR) {
        Some((tag, digits)) => {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return None;
            }
            // Reject non-canonical spellings such as "007".
            if digits.len() > 1 && digits.starts_with('0') {
                return None;
            }
            (tag, Some(digits.parse::<usize>().ok()?))
        }
        None => (rest, None),
    };

    validate_tag(tag).ok()?;
    Some(PartialName {
        tag: tag.to_string(),
        index,
    })
}

/// Work directory plus run header: the whole addressing context of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    pub work_dir: PathBuf,
    pub header: String,
}

impl RunLayout {
    pub fn new(work_dir: impl Into<PathBuf>, header: &str) -> Result<Self, McError> {
        validate_header(header)?;
        Ok(Self {
            work_dir: work_dir.into(),
            header: header.to_string(),
        })
    }

    /// Work directory from `MRMC_WORK_DIR`, falling back to the current directory
    pub fn from_env(header: &str) -> Result<Self, McError> {
        let work_dir =
            std::env::var(WORK_DIR_ENV).unwrap_or_else(|_| DEFAULT_WORK_DIR.to_string());
        Self::new(PathBuf::from(work_dir), header)
    }

    pub fn partial_path(&self, tag: &str, index: Option<usize>) -> PathBuf {
        self.work_dir
            .join(partial_file_name(&self.header, tag, index))
    }

    pub fn result_path(&self, tag: &str) -> PathBuf {
        self.partial_path(tag, None)
    }

    pub fn log_path(&self) -> PathBuf {
        self.work_dir.join(format!("{}.log", self.header))
    }

    pub fn job_descriptor_name(&self) -> String {
        format!("{}{INDEX_SEPARATOR}condor.job", self.header)
    }

    pub fn job_descriptor_path(&self) -> PathBuf {
        self.work_dir.join(self.job_descriptor_name())
    }

    pub fn dag_descriptor_name(&self) -> String {
        format!("{}{INDEX_SEPARATOR}dag.job", self.header)
    }

    pub fn dag_descriptor_path(&self) -> PathBuf {
        self.work_dir.join(self.dag_descriptor_name())
    }

    /// Event log the scheduler writes next to the two-stage descriptor
    pub fn dag_nodes_log_path(&self) -> PathBuf {
        self.work_dir
            .join(format!("{}.nodes.log", self.dag_descriptor_name()))
    }

    pub fn capture_path(&self, index: usize, ext: &str) -> PathBuf {
        self.work_dir
            .join(capture_file_name(&self.header, index, ext))
    }

    /// Capture name with the scheduler macro in place of the index, for descriptors
    pub fn capture_template(&self, ext: &str) -> String {
        capture_file_name(&self.header, PROCESS_MACRO, ext)
    }

    /// Partial paths a reduction expects for `tag`, in index order.
    pub fn expected_partials(&self, tag: &str, njobs: Option<usize>) -> Vec<PathBuf> {
        match njobs {
            Some(n) => (0..n).map(|i| self.partial_path(tag, Some(i))).collect(),
            None => vec![self.partial_path(tag, None)],
        }
    }
}

/// Scan the work directory for this run's partial files.
///
/// Returns the decoded names sorted by tag then index (unindexed first).
pub fn discover_partials(layout: &RunLayout) -> Result<Vec<PartialName>, McError> {
    let dir = Path::new(&layout.work_dir);
    let mut found = Vec::new();

    for entry in fs::read_dir(dir).map_err(|e| McError::file_access(dir, e))? {
        let entry = entry.map_err(|e| McError::file_access(dir, e))?;
        if !entry.path().is_file() {
            continue;
        }
        if let Some(name) = entry.file_name().to_str() {
            if let Some(parsed) = parse_partial_name(&layout.header, name) {
                found.push(parsed);
            }
        }
    }

    found.sort();
    Ok(found)
}
