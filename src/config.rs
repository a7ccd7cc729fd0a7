use crate::McError;
use std::fmt;

pub const DEFAULT_MODULE_EXTS: &str = ".so,.py";
pub const DEFAULT_CAPTURE_EXTS: &str = ".out,.err";
pub const DEFAULT_MIN_MIPS: u64 = 20000;

/// Machine attributes a requirements predicate may reference.
pub const KNOWN_ATTRIBUTES: [&str; 5] = ["Mips", "KFlops", "Memory", "Cpus", "Disk"];

/// Split a user supplied list on commas and whitespace.
///
/// Quote, bracket and parenthesis characters are rejected outright so a
/// list literal like `['.so', '.py']` is an error, never something to evaluate.
pub fn parse_list(raw: &str) -> Result<Vec<String>, McError> {
    let mut items = Vec::new();
    for item in raw.split(|c: char| c == ',' || c.is_whitespace()) {
        if item.is_empty() {
            continue;
        }
        if let Some(c) = item
            .chars()
            .find(|c| matches!(c, '[' | ']' | '(' | ')' | '{' | '}' | '\'' | '"' | ';'))
        {
            return Err(McError::Configuration(format!(
                "list item '{}' contains forbidden character {:?}",
                item, c
            )));
        }
        if !items.iter().any(|existing: &String| existing == item) {
            items.push(item.to_string());
        }
    }
    Ok(items)
}

/// Normalise an extension list so every entry starts with a dot
pub fn normalize_exts(exts: &[String]) -> Vec<String> {
    exts.iter()
        .map(|e| {
            if e.starts_with('.') {
                e.clone()
            } else {
                format!(".{}", e)
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Greater,
    GreaterOrEqual,
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Comparison::Greater => write!(f, ">"),
            Comparison::GreaterOrEqual => write!(f, ">="),
        }
    }
}

/// Scheduler placement predicate, e.g. `Mips > 20000`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    pub attribute: String,
    pub comparison: Comparison,
    pub threshold: u64,
}

impl Requirement {
    pub fn new(attribute: &str, comparison: Comparison, threshold: u64) -> Result<Self, McError> {
        if !KNOWN_ATTRIBUTES.contains(&attribute) {
            return Err(McError::Configuration(format!(
                "requirement references unknown machine attribute '{}' (known: {})",
                attribute,
                KNOWN_ATTRIBUTES.join(", ")
            )));
        }
        if threshold == 0 {
            return Err(McError::Configuration(format!(
                "requirement threshold for '{}' must be positive",
                attribute
            )));
        }
        Ok(Self {
            attribute: attribute.to_string(),
            comparison,
            threshold,
        })
    }

    /// Shorthand for the "fast machines only" placement.
    pub fn min_mips(threshold: u64) -> Result<Self, McError> {
        Self::new("Mips", Comparison::Greater, threshold)
    }

    /// Parse `<attribute> > <n>` or `<attribute> >= <n>`; spaces optional.
    pub fn parse(raw: &str) -> Result<Self, McError> {
        let (attribute, comparison, rest) = if let Some((a, r)) = raw.split_once(">=") {
            (a, Comparison::GreaterOrEqual, r)
        } else if let Some((a, r)) = raw.split_once('>') {
            (a, Comparison::Greater, r)
        } else {
            return Err(McError::Configuration(format!(
                "requirement '{}' must have the form '<attribute> > <threshold>'",
                raw
            )));
        };
        let threshold = rest.trim().parse::<u64>().map_err(|e| {
            McError::Configuration(format!("requirement '{}' has a bad threshold: {}", raw, e))
        })?;
        Self::new(attribute.trim(), comparison, threshold)
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.attribute, self.comparison, self.threshold)
    }
}
