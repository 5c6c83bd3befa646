//! Centralized configuration management for lodes-fetch

use std::num::NonZeroUsize;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use crate::errors::{LodesError, Result};
use crate::models::{Category, RegionCode};
use crate::provision::DirectoryLayout;

/// States, DC and Puerto Rico
pub const REGIONS: [&str; 52] = [
    "al", "ak", "az", "ar", "ca", "co", "ct", "de", "dc", "fl", "ga", "hi", "id", "il", "in",
    "ia", "ks", "ky", "la", "me", "md", "ma", "mi", "mn", "ms", "mo", "mt", "ne", "nv", "nh",
    "nj", "nm", "ny", "nc", "nd", "oh", "ok", "or", "pa", "ri", "sc", "sd", "tn", "tx", "ut",
    "vt", "va", "wa", "wv", "wi", "wy", "pr",
];

/// Workforce segments used by RAC and WAC files
pub const SEGMENTS: [&str; 10] = [
    "S000", "SA01", "SA02", "SA03", "SE01", "SE02", "SE03", "SI01", "SI02", "SI03",
];

pub const JOB_TYPES: [&str; 6] = ["JT00", "JT01", "JT02", "JT03", "JT04", "JT05"];

pub const FIRST_YEAR: u16 = 2002;
pub const LAST_YEAR: u16 = 2017;

pub const DEFAULT_LISTING_URL: &str = "https://lehd.ces.census.gov/php/inc_lodesFiles.php";
pub const DEFAULT_HOST: &str = "https://lehd.ces.census.gov";
pub const DEFAULT_VERSION: &str = "LODES7";

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory the timestamped run directory is created in
    pub output_dir: PathBuf,
    /// Parallel workers per pipeline phase
    pub workers: usize,
    pub regions: Vec<RegionCode>,
    pub categories: Vec<Category>,
    pub segments: Vec<String>,
    pub job_types: Vec<String>,
    pub first_year: u16,
    pub last_year: u16,
    /// Listing service configuration
    pub listing: ListingConfig,
    /// HTTP client configuration
    pub http: HttpConfig,
}

/// Where and how download links are discovered
#[derive(Debug, Clone)]
pub struct ListingConfig {
    /// Form endpoint returning the HTML file list
    pub url: String,
    /// Scheme and host prefixed to site-relative links
    pub host: String,
    /// Value of the `version` form field
    pub version: String,
}

/// HTTP client configuration
///
/// Data downloads have no total deadline: a large file may take as long as
/// it needs while bytes keep arriving.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Bound on establishing a connection, in seconds
    pub connect_timeout_seconds: u64,
    /// Total bound on one listing request, in seconds
    pub listing_timeout_seconds: u64,
    /// Longest wait for response headers or the next body chunk of a
    /// download, in seconds
    pub idle_timeout_seconds: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_LISTING_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            version: DEFAULT_VERSION.to_string(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_seconds: 30,
            listing_timeout_seconds: 120,
            idle_timeout_seconds: 60,
            user_agent: "lodes-fetch/0.1.0".to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            workers: 1,
            regions: REGIONS.iter().copied().map(RegionCode::from_static).collect(),
            categories: Category::ALL.to_vec(),
            segments: SEGMENTS.iter().map(|s| s.to_string()).collect(),
            job_types: JOB_TYPES.iter().map(|s| s.to_string()).collect(),
            first_year: FIRST_YEAR,
            last_year: LAST_YEAR,
            listing: ListingConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables and defaults
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let output_dir = lookup("LODES_OUTPUT_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.output_dir);

        let listing = ListingConfig {
            url: lookup("LODES_LISTING_URL").unwrap_or(defaults.listing.url),
            host: lookup("LODES_HOST").unwrap_or(defaults.listing.host),
            version: lookup("LODES_VERSION").unwrap_or(defaults.listing.version),
        };

        let http = HttpConfig {
            connect_timeout_seconds: parse_var(&lookup, "LODES_CONNECT_TIMEOUT_SECONDS")?
                .unwrap_or(defaults.http.connect_timeout_seconds),
            listing_timeout_seconds: parse_var(&lookup, "LODES_LISTING_TIMEOUT_SECONDS")?
                .unwrap_or(defaults.http.listing_timeout_seconds),
            idle_timeout_seconds: parse_var(&lookup, "LODES_IDLE_TIMEOUT_SECONDS")?
                .unwrap_or(defaults.http.idle_timeout_seconds),
            user_agent: lookup("LODES_USER_AGENT").unwrap_or(defaults.http.user_agent),
        };

        Ok(Config {
            output_dir,
            workers: parse_var(&lookup, "LODES_WORKERS")?.unwrap_or(defaults.workers),
            first_year: parse_var(&lookup, "LODES_FIRST_YEAR")?.unwrap_or(defaults.first_year),
            last_year: parse_var(&lookup, "LODES_LAST_YEAR")?.unwrap_or(defaults.last_year),
            listing,
            http,
            ..defaults
        })
    }

    /// Worker count as a non-zero value; call after [`Config::validate`]
    pub fn worker_count(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.workers).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn years(&self) -> RangeInclusive<u16> {
        self.first_year..=self.last_year
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.http.connect_timeout_seconds)
    }

    pub fn listing_timeout(&self) -> Duration {
        Duration::from_secs(self.http.listing_timeout_seconds)
    }

    /// Per-chunk stall bound for downloads
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.http.idle_timeout_seconds)
    }

    pub fn layout(&self) -> DirectoryLayout {
        DirectoryLayout::new(
            self.categories.clone(),
            self.segments.clone(),
            self.job_types.clone(),
            self.years(),
        )
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(LodesError::Config(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.first_year > self.last_year {
            return Err(LodesError::Config(format!(
                "first year {} is after last year {}",
                self.first_year, self.last_year
            )));
        }
        let http = &self.http;
        if http.connect_timeout_seconds == 0
            || http.listing_timeout_seconds == 0
            || http.idle_timeout_seconds == 0
        {
            return Err(LodesError::Config(
                "HTTP timeouts must be at least 1 second".to_string(),
            ));
        }
        if self.regions.is_empty() {
            return Err(LodesError::Config("no regions configured".to_string()));
        }
        if self.categories.is_empty() {
            return Err(LodesError::Config("no categories configured".to_string()));
        }
        url::Url::parse(&self.listing.host).map_err(|source| LodesError::InvalidUrl {
            url: self.listing.host.clone(),
            source,
        })?;
        Ok(())
    }
}

/// Helper function to parse a variable as a specific type
fn parse_var<T, F>(lookup: &F, var_name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var_name) {
        Some(val) => val.trim().parse::<T>().map(Some).map_err(|e| {
            LodesError::Config(format!(
                "Failed to parse environment variable {} = '{}': {}",
                var_name, val, e
            ))
        }),
        None => Ok(None),
    }
}
