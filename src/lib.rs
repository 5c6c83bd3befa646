//! lodes-fetch: bulk retrieval of LODES tabular files
//!
//! Discovers the download links for every configured (region, category)
//! pair, fetches each gzip file, and writes the decompressed CSV into a
//! `category/[segment/]jobtype/year/` tree derived from the file name.

pub mod config;
pub mod errors;
pub mod fetch;
pub mod links;
pub mod models;
pub mod pipeline;
pub mod pool;
pub mod provision;
pub mod router;

pub use config::Config;
pub use errors::LodesError;
pub use pipeline::Pipeline;
