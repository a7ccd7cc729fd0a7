use crate::McError;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const REMOTE_TIME_MARKER: &str = "Total Remote";

#[derive(Debug)]
pub struct TimingSummary {
    pub log: PathBuf,
    pub total: Duration,
    pub count: usize,
    /// Matching lines whose time field could not be read.
    pub skipped: Vec<McError>,
}

impl TimingSummary {
    /// Mean per job, truncated to whole seconds.
    pub fn mean(&self) -> Option<Duration> {
        if self.count == 0 {
            None
        } else {
            Some(Duration::from_secs(self.total.as_secs() / self.count as u64))
        }
    }

    pub fn report_line(&self) -> String {
        let mean = self
            .mean()
            .map(format_duration)
            .unwrap_or_else(|| "n/a".to_string());
        format!(
            "{}: total run time = {}, mean run time ({} jobs) = {}",
            self.log.display(),
            format_duration(self.total),
            self.count,
            mean
        )
    }
}

/// `H:MM:SS`, with a leading day count once past 24 hours.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let days = secs / 86_400;
    let rem = secs % 86_400;
    let clock = format!("{}:{:02}:{:02}", rem / 3600, (rem % 3600) / 60, rem % 60);
    match days {
        0 => clock,
        1 => format!("1 day, {}", clock),
        n => format!("{} days, {}", n, clock),
    }
}

/// Parse `H:MM:SS`.
pub fn parse_clock(raw: &str) -> Result<Duration, String> {
    let parts: Vec<&str> = raw.split(':').collect();
    let [h, m, s] = parts.as_slice() else {
        return Err(format!("'{}' is not H:MM:SS", raw));
    };
    let field = |v: &str, name: &str| -> Result<u64, String> {
        v.parse::<u64>()
            .map_err(|_| format!("bad {} field in '{}'", name, raw))
    };
    let (h, m, s) = (field(*h, "hours")?, field(*m, "minutes")?, field(*s, "seconds")?);
    if m >= 60 || s >= 60 {
        return Err(format!("'{}' has minutes or seconds out of range", raw));
    }
    Ok(Duration::from_secs(h * 3600 + m * 60 + s))
}

/// Run time from an event-log usage line such as
/// `Usr 0 00:12:03, Sys 0 00:00:01  -  Total Remote Usage`.
pub fn parse_remote_line(line: &str) -> Result<Duration, String> {
    let first = line.split(',').next().unwrap_or("");
    let fields: Vec<&str> = first.split_whitespace().collect();
    match fields.as_slice() {
        [_, days, clock, ..] => {
            let days: u64 = days
                .parse()
                .map_err(|_| format!("bad day count '{}'", days))?;
            Ok(Duration::from_secs(days * 86_400) + parse_clock(clock)?)
        }
        _ => Err(format!("no time field in {:?}", line.trim())),
    }
}

/// Sum the per-job remote run times recorded in `log`.
pub fn analyze_content(log: &Path, content: &str) -> TimingSummary {
    let mut summary = TimingSummary {
        log: log.to_path_buf(),
        total: Duration::ZERO,
        count: 0,
        skipped: Vec::new(),
    };
    for (i, line) in content.lines().enumerate() {
        if !line.contains(REMOTE_TIME_MARKER) {
            continue;
        }
        match parse_remote_line(line) {
            Ok(d) => {
                summary.total += d;
                summary.count += 1;
            }
            Err(reason) => summary.skipped.push(McError::Parse {
                path: log.to_path_buf(),
                line: i + 1,
                reason,
            }),
        }
    }
    summary
}

pub fn analyze(log: &Path) -> Result<TimingSummary, McError> {
    let content = fs::read_to_string(log).map_err(|e| McError::Parse {
        path: log.to_path_buf(),
        line: 0,
        reason: format!("cannot read event log: {}", e),
    })?;
    Ok(analyze_content(log, &content))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration_like_timedelta() {
        assert_eq!(format_duration(Duration::from_secs(42)), "0:00:42");
        assert_eq!(format_duration(Duration::from_secs(3723)), "1:02:03");
        assert_eq!(format_duration(Duration::from_secs(86_400 + 5)), "1 day, 0:00:05");
        assert_eq!(format_duration(Duration::from_secs(2 * 86_400)), "2 days, 0:00:00");
    }

    #[test]
    fn test_parse_clock() {
        assert_eq!(parse_clock("01:02:03"), Ok(Duration::from_secs(3723)));
        assert!(parse_clock("1:02").is_err());
        assert!(parse_clock("1:61:00").is_err());
        assert!(parse_clock("a:00:00").is_err());
    }

    #[test]
    fn test_parse_remote_line_includes_days() {
        let line = "\tUsr 1 00:00:10, Sys 0 00:00:00  -  Total Remote Usage";
        assert_eq!(parse_remote_line(line), Ok(Duration::from_secs(86_410)));
    }

    #[test]
    fn test_empty_log_has_no_mean() {
        let summary = analyze_content(Path::new("x.log"), "nothing here\n");
        assert_eq!(summary.count, 0);
        assert!(summary.mean().is_none());
        assert!(summary.report_line().ends_with("(0 jobs) = n/a"));
    }
}
