//! File name routing
//!
//! LODES files are named `{region}_{category}_...` with underscore-separated
//! tokens, for example `va_rac_S000_JT00_2015.csv.gz` or
//! `de_od_main_JT00_2010.csv.gz`. The tokens alone decide the directory a
//! file lands in:
//!
//! - OD: `od/{jobtype}/{year}/`
//! - RAC/WAC: `{category}/{segment}/{jobtype}/{year}/`
//!
//! Routing is pure: it never touches the filesystem.

use std::path::PathBuf;
use std::sync::OnceLock;

use regex::Regex;

use crate::models::{Category, FileNameMetadata, SkipReason};

const COMPRESSED_SUFFIX: &str = ".gz";
const MIN_TOKENS: usize = 5;
/// `{region}_od_{jobtype}_{year}` has no part token
const MIN_OD_SHORT_TOKENS: usize = 4;

fn year_pattern() -> &'static Regex {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    YEAR.get_or_init(|| Regex::new(r"(?:19|20)\d{2}").unwrap())
}

/// Where one file goes, relative to the run root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub metadata: FileNameMetadata,
    /// Compressed name as it appears in the URL
    pub file_name: String,
    /// Name after the `.gz` suffix is stripped
    pub artifact_name: String,
}

impl Route {
    pub fn relative_dir(&self) -> PathBuf {
        let meta = &self.metadata;
        let mut dir = PathBuf::from(meta.category.as_str());
        if let Some(segment) = &meta.segment {
            dir.push(segment);
        }
        dir.push(&meta.job_type);
        dir.push(meta.year.to_string());
        dir
    }

    pub fn relative_artifact_path(&self) -> PathBuf {
        self.relative_dir().join(&self.artifact_name)
    }
}

/// Parse a file name into its destination.
///
/// Any name that does not follow the grammar yields a [`SkipReason`]; this
/// function never panics on input.
pub fn route(file_name: &str) -> Result<Route, SkipReason> {
    let stem = file_name.split('.').next().unwrap_or(file_name);
    let tokens: Vec<&str> = stem.split('_').collect();

    let od_short_form = tokens.len() == MIN_OD_SHORT_TOKENS && tokens[1].eq_ignore_ascii_case("od");
    if tokens.len() < MIN_TOKENS && !od_short_form {
        return Err(SkipReason::TooFewTokens {
            found: tokens.len(),
        });
    }

    let artifact_name = file_name
        .strip_suffix(COMPRESSED_SUFFIX)
        .filter(|name| !name.is_empty())
        .ok_or(SkipReason::NotCompressed)?;

    let category = tokens[1]
        .parse::<Category>()
        .map_err(|_| SkipReason::UnknownCategory(tokens[1].to_string()))?;

    let (segment, job_type) = match category {
        Category::Od if od_short_form => (None, tokens[2]),
        Category::Od => (None, tokens[3]),
        _ => (Some(checked_token(tokens[2])?), tokens[3]),
    };
    let job_type = checked_token(job_type)?;

    let year = year_pattern()
        .find(stem)
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .ok_or(SkipReason::MissingYear)?;

    Ok(Route {
        metadata: FileNameMetadata {
            category,
            segment,
            job_type,
            year,
        },
        file_name: file_name.to_string(),
        artifact_name: artifact_name.to_string(),
    })
}

fn checked_token(token: &str) -> Result<String, SkipReason> {
    if !token.is_empty() && token.bytes().all(|b| b.is_ascii_alphanumeric()) {
        Ok(token.to_string())
    } else {
        Err(SkipReason::InvalidToken(token.to_string()))
    }
}
