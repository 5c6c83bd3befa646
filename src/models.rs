use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::errors::LodesError;

/// LODES data family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    /// Origin-destination flows
    Od,
    /// Residence-area characteristics
    Rac,
    /// Workplace-area characteristics
    Wac,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Od, Category::Rac, Category::Wac];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Od => "od",
            Category::Rac => "rac",
            Category::Wac => "wac",
        }
    }

    /// OD files are not split by workforce segment.
    pub fn has_segments(&self) -> bool {
        !matches!(self, Category::Od)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = LodesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "od" => Ok(Category::Od),
            "rac" => Ok(Category::Rac),
            "wac" => Ok(Category::Wac),
            other => Err(LodesError::Config(format!(
                "Unsupported category: {}. Supported categories: od, rac, wac",
                other
            ))),
        }
    }
}

/// Two-letter region code, stored lowercase (e.g. `va`, `pr`)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionCode(String);

impl RegionCode {
    /// Built-in codes are already lowercase two-letter strings.
    pub(crate) fn from_static(code: &'static str) -> Self {
        RegionCode(code.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RegionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RegionCode {
    type Err = LodesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let code = s.trim().to_lowercase();
        if code.len() == 2 && code.bytes().all(|b| b.is_ascii_lowercase()) {
            Ok(RegionCode(code))
        } else {
            Err(LodesError::Config(format!(
                "Invalid region code '{}': expected two letters",
                s
            )))
        }
    }
}

/// One unit of discovery work
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Task {
    pub region: RegionCode,
    pub category: Category,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.region, self.category)
    }
}

/// Absolute URL of one remote compressed file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DownloadLink(pub String);

impl DownloadLink {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DownloadLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tokens parsed out of a file name by the router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameMetadata {
    pub category: Category,
    /// Workforce segment; `None` for OD files
    pub segment: Option<String>,
    pub job_type: String,
    pub year: u16,
}

/// Why a single file was left out of the run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// Fewer underscore-separated tokens than the naming grammar needs
    TooFewTokens { found: usize },
    /// The name has no `.gz` suffix to strip
    NotCompressed,
    /// No four-digit year could be found in the name
    MissingYear,
    /// Token 1 is not one of `od`, `rac`, `wac`
    UnknownCategory(String),
    /// A token that would become a directory name is not plain alphanumeric
    InvalidToken(String),
    /// The URL has no final path segment to use as a file name
    NoFileName,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TooFewTokens { found } => {
                write!(f, "expected at least 5 name tokens, found {}", found)
            }
            SkipReason::NotCompressed => f.write_str("missing .gz suffix"),
            SkipReason::MissingYear => f.write_str("no year in file name"),
            SkipReason::UnknownCategory(token) => write!(f, "unknown category '{}'", token),
            SkipReason::InvalidToken(token) => write!(f, "unsafe path token '{}'", token),
            SkipReason::NoFileName => f.write_str("URL has no file name"),
        }
    }
}

/// Result of one fetch worker invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The decompressed artifact was written; carries its file name
    Materialized(String),
    /// Nothing was written for this link
    Skipped {
        link: DownloadLink,
        reason: SkipReason,
    },
}

impl FetchOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, FetchOutcome::Skipped { .. })
    }
}

/// Summary of a completed run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub root: PathBuf,
    pub tasks: usize,
    pub links: usize,
    pub outcomes: Vec<FetchOutcome>,
}

impl RunReport {
    pub fn materialized(&self) -> impl Iterator<Item = &str> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            FetchOutcome::Materialized(name) => Some(name.as_str()),
            FetchOutcome::Skipped { .. } => None,
        })
    }

    pub fn skipped(&self) -> impl Iterator<Item = (&DownloadLink, &SkipReason)> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            FetchOutcome::Skipped { link, reason } => Some((link, reason)),
            FetchOutcome::Materialized(_) => None,
        })
    }
}
