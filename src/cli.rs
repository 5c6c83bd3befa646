use clap::Parser;
use std::path::PathBuf;

use lodes_fetch::models::{Category, RegionCode};
use lodes_fetch::Config;

#[derive(Parser)]
#[command(name = "lodes-fetch")]
#[command(about = "Download and unpack LODES OD, RAC and WAC files for every region")]
#[command(version)]
pub struct Cli {
    /// Directory the timestamped run directory is created in
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Parallel workers per phase
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Region codes to download (comma separated, e.g. va,de). Defaults to all
    #[arg(short, long, value_delimiter = ',')]
    pub region: Vec<RegionCode>,

    /// Categories to download (od, rac, wac). Defaults to all
    #[arg(short, long, value_delimiter = ',')]
    pub category: Vec<Category>,
}

impl Cli {
    /// Apply command line overrides on top of the environment configuration
    pub fn apply(self, mut config: Config) -> Config {
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if !self.region.is_empty() {
            config.regions = self.region;
        }
        if !self.category.is_empty() {
            config.categories = self.category;
        }
        config
    }
}
