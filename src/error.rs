use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum McError {
    /// Bad job descriptor inputs (process count, script, requirements, lists).
    Configuration(String),
    /// Provenance log missing or its declaration line absent/malformed.
    Discovery { path: PathBuf, reason: String },
    /// An expected worker output file is absent.
    MissingPartial { tag: String, path: PathBuf },
    /// Fewer than two samples for a label, so no variance.
    InsufficientSamples { tag: String, label: String, count: usize },
    /// No label of a tag could be summarized; `labels` holds each label's own failure.
    EmptySeries { tag: String, labels: Vec<McError> },
    /// Result file exists and overwrite was not granted.
    WriteConflict { path: PathBuf },
    /// Malformed record, log line or timing field.
    Parse { path: PathBuf, line: usize, reason: String },
    /// I/O failure on a named file.
    FileAccess { path: PathBuf, source: std::io::Error },
    Io(std::io::Error),
    Other(String),
}

impl McError {
    pub fn file_access(path: &Path, source: std::io::Error) -> Self {
        McError::FileAccess {
            path: path.to_path_buf(),
            source,
        }
    }

    /// Errors folded into this one, e.g. the per-label failures of an empty series.
    pub fn nested(&self) -> &[McError] {
        match self {
            McError::EmptySeries { labels, .. } => labels,
            _ => &[],
        }
    }

    /// Short machine-friendly name of the error kind, used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            McError::Configuration(_) => "configuration",
            McError::Discovery { .. } => "discovery",
            McError::MissingPartial { .. } => "missing_partial",
            McError::InsufficientSamples { .. } => "insufficient_samples",
            McError::EmptySeries { .. } => "empty_series",
            McError::WriteConflict { .. } => "write_conflict",
            McError::Parse { .. } => "parse",
            McError::FileAccess { .. } => "file_access",
            McError::Io(_) => "io",
            McError::Other(_) => "other",
        }
    }
}

impl fmt::Display for McError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            McError::Configuration(e) => write!(f, "Configuration error: {}", e),
            McError::Discovery { path, reason } => {
                write!(f, "Discovery error: {}: {}", path.display(), reason)
            }
            McError::MissingPartial { tag, path } => {
                write!(f, "Missing partial for tag '{}': {}", tag, path.display())
            }
            McError::InsufficientSamples { tag, label, count } => write!(
                f,
                "Insufficient samples for tag '{}' label '{}': n = {} (need at least 2)",
                tag, label, count
            ),
            McError::EmptySeries { tag, labels } => {
                write!(f, "No label of tag '{}' could be summarized", tag)?;
                let undersampled: Vec<String> = labels
                    .iter()
                    .filter_map(|e| match e {
                        McError::InsufficientSamples { label, count, .. } => {
                            Some(format!("'{}' n = {}", label, count))
                        }
                        _ => None,
                    })
                    .collect();
                if !undersampled.is_empty() {
                    write!(f, " (undersampled: {})", undersampled.join(", "))?;
                }
                Ok(())
            }
            McError::WriteConflict { path } => write!(
                f,
                "{} already exists, skipped (use --overwrite to replace it)",
                path.display()
            ),
            McError::Parse { path, line, reason } => {
                write!(f, "Parse error at {}:{}: {}", path.display(), line, reason)
            }
            McError::FileAccess { path, source } => {
                write!(f, "IO error on {}: {}", path.display(), source)
            }
            McError::Io(e) => write!(f, "IO error: {}", e),
            McError::Other(e) => write!(f, "Error: {}", e),
        }
    }
}

impl std::error::Error for McError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            McError::FileAccess { source, .. } => Some(source),
            McError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for McError {
    fn from(err: std::io::Error) -> Self {
        McError::Io(err)
    }
}

impl From<String> for McError {
    fn from(err: String) -> Self {
        McError::Other(err)
    }
}

impl From<&str> for McError {
    fn from(err: &str) -> Self {
        McError::Other(err.to_string())
    }
}
