//! Per-run provenance ledger: originating command plus the declared tag set.

use crate::file_handler::{atomic_write, first_line};
use crate::naming::{validate_tag, RunLayout};
use crate::McError;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

pub const DECLARATION_MARKER: &str = "data collected for";

pub fn declaration_line(tags: &[String]) -> String {
    format!("{}: {}", DECLARATION_MARKER, tags.join(" "))
}

/// Write the initial log: `# <command>` then the tag declaration.
pub fn write_provenance_log(
    layout: &RunLayout,
    command_line: &str,
    tags: &[String],
) -> Result<(), McError> {
    for tag in tags {
        validate_tag(tag)?;
    }
    let path = layout.log_path();
    let content = format!("# {}\n{}\n", command_line, declaration_line(tags));
    fs::write(&path, content).map_err(|e| McError::file_access(&path, e))?;
    debug!(path = %path.display(), tags = tags.len(), "provenance log written");
    Ok(())
}

/// Parse the tag set out of log content. The last declaration line wins.
pub fn parse_declared_tags(path: &Path, content: &str) -> Result<Vec<String>, McError> {
    let declaration = content
        .lines()
        .filter(|line| line.contains(DECLARATION_MARKER))
        .last()
        .ok_or_else(|| McError::Discovery {
            path: path.to_path_buf(),
            reason: format!("no '{}:' declaration line", DECLARATION_MARKER),
        })?;

    let (_, listed) = declaration.split_once(':').ok_or_else(|| McError::Discovery {
        path: path.to_path_buf(),
        reason: format!("declaration line '{}' has no ':'", declaration),
    })?;

    let mut tags: Vec<String> = Vec::new();
    for tag in listed.split(|c: char| c == ',' || c.is_whitespace()) {
        if tag.is_empty() || tags.iter().any(|t| t == tag) {
            continue;
        }
        validate_tag(tag).map_err(|e| McError::Discovery {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        tags.push(tag.to_string());
    }

    if tags.is_empty() {
        return Err(McError::Discovery {
            path: path.to_path_buf(),
            reason: "declaration line lists no tags".to_string(),
        });
    }
    Ok(tags)
}

/// Read the tag set a run declared in its provenance log.
pub fn read_declared_tags(layout: &RunLayout) -> Result<Vec<String>, McError> {
    let path = layout.log_path();
    let content = fs::read_to_string(&path).map_err(|e| McError::Discovery {
        path: path.clone(),
        reason: format!("cannot read provenance log: {}", e),
    })?;
    parse_declared_tags(&path, &content)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrependOutcome {
    Prepended(String),
    AlreadyPresent(String),
}

/// Prefix `line` to the log at `log_path`, replacing the file atomically.
///
/// A log that already starts with `line` is left untouched.
pub fn prepend_line(log_path: &Path, line: &str) -> Result<PrependOutcome, McError> {
    let existing = fs::read_to_string(log_path).map_err(|e| McError::file_access(log_path, e))?;
    if existing.lines().next() == Some(line) {
        return Ok(PrependOutcome::AlreadyPresent(line.to_string()));
    }
    let updated = format!("{}\n{}", line, existing);
    atomic_write(log_path, updated.as_bytes())?;
    Ok(PrependOutcome::Prepended(line.to_string()))
}

/// Copy the job descriptor's invocation comment to the top of the run log.
///
/// Both files are read before anything is written, so a failure on either
/// leaves the log exactly as it was.
pub fn prepend_submission(layout: &RunLayout) -> Result<PrependOutcome, McError> {
    let descriptor = layout.job_descriptor_path();
    let invocation = first_line(&descriptor)?;
    if invocation.is_empty() {
        return Err(McError::Parse {
            path: descriptor,
            line: 1,
            reason: "job descriptor has an empty first line".to_string(),
        });
    }
    let outcome = prepend_line(&layout.log_path(), &invocation)?;
    info!(log = %layout.log_path().display(), ?outcome, "submission line prepended");
    Ok(outcome)
}
