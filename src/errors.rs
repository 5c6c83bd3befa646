//! Run-level error types
//!
//! Every variant here aborts the whole run. Per-file problems that only
//! skip one download live in [`crate::models::SkipReason`] instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LodesError {
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("listing for {region}/{category} has no file list container")]
    MissingFileList { region: String, category: String },

    #[error("invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to create directory {}: {source}", .path.display())]
    Provision {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no provisioned directory {} for {file_name}", .path.display())]
    NotProvisioned { path: PathBuf, file_name: String },

    #[error("download of {url} stalled: no data for {idle:?}")]
    Stalled {
        url: String,
        idle: std::time::Duration,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decompress {}: {source}", .path.display())]
    Decompress {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LodesError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LodesError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn http(url: impl Into<String>, source: reqwest::Error) -> Self {
        LodesError::Http {
            url: url.into(),
            source,
        }
    }
}

pub type Result<T, E = LodesError> = std::result::Result<T, E>;
