//! Two-phase download pipeline
//!
//! 1. Provision the run directory tree.
//! 2. [`Pipeline::resolve_all`]: resolve links for every (region, category) task.
//! 3. [`Pipeline::fetch_all`]: fetch every link, given the complete phase-1 list.
//!
//! Any run-level error in any phase ends the run.

use std::collections::HashSet;
use std::path::Path;

use reqwest::Client;
use tracing::{debug, info};

use crate::config::Config;
use crate::errors::{LodesError, Result};
use crate::fetch::Fetcher;
use crate::links::LinkResolver;
use crate::models::{Category, DownloadLink, FetchOutcome, RegionCode, RunReport, Task};
use crate::pool::WorkerPool;
use crate::provision::{provision, ProvisionedTree};

/// Cross product of regions and categories, region-major.
pub fn build_tasks(regions: &[RegionCode], categories: &[Category]) -> Vec<Task> {
    regions
        .iter()
        .flat_map(|region| {
            categories.iter().map(move |category| Task {
                region: region.clone(),
                category: *category,
            })
        })
        .collect()
}

/// Flatten per-task link lists, keeping the first occurrence of each link.
pub fn flatten_links(batches: Vec<Vec<DownloadLink>>) -> Vec<DownloadLink> {
    let mut seen = HashSet::new();
    batches
        .into_iter()
        .flatten()
        .filter(|link| {
            let fresh = seen.insert(link.clone());
            if !fresh {
                debug!("Dropping duplicate link {}", link);
            }
            fresh
        })
        .collect()
}

pub struct Pipeline {
    config: Config,
    resolver: LinkResolver,
    fetcher: Fetcher,
    pool: WorkerPool,
}

impl Pipeline {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        // No client-wide deadline: listings get a per-request bound and
        // downloads a per-chunk one.
        let client = Client::builder()
            .user_agent(&config.http.user_agent)
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|e| LodesError::http(&config.listing.url, e))?;

        let resolver = LinkResolver::new(
            client.clone(),
            config.listing.clone(),
            config.listing_timeout(),
        )?;
        let fetcher = Fetcher::new(client, config.idle_timeout());
        let pool = WorkerPool::new(config.worker_count());

        Ok(Self {
            config,
            resolver,
            fetcher,
            pool,
        })
    }

    /// Run the whole pipeline into a fresh directory at `root`.
    pub async fn run(&self, root: &Path) -> Result<RunReport> {
        let tree = provision(root, &self.config.layout())?;

        let tasks = build_tasks(&self.config.regions, &self.config.categories);
        for task in &tasks {
            info!(
                region = %task.region,
                category = %task.category,
                "Downloading {} data for region {}",
                task.category.as_str().to_uppercase(),
                task.region.as_str().to_uppercase()
            );
        }

        let links = self.resolve_all(&tasks).await?;
        let outcomes = self.fetch_all(&links, &tree).await?;

        let report = RunReport {
            root: tree.root().to_path_buf(),
            tasks: tasks.len(),
            links: links.len(),
            outcomes,
        };
        info!(
            materialized = report.materialized().count(),
            skipped = report.skipped().count(),
            "Run finished"
        );
        Ok(report)
    }

    /// Phase 1: resolve every task, then return the deduplicated links.
    ///
    /// Returns only after all tasks have finished; the first failure ends
    /// the phase and nothing is returned.
    pub async fn resolve_all(&self, tasks: &[Task]) -> Result<Vec<DownloadLink>> {
        info!(
            tasks = tasks.len(),
            workers = self.pool.workers(),
            "Resolving links"
        );
        let batches = self
            .pool
            .run(tasks.iter(), |task| self.resolver.resolve(task))
            .await?;
        Ok(flatten_links(batches))
    }

    /// Phase 2: fetch and materialize every link into `tree`.
    pub async fn fetch_all(
        &self,
        links: &[DownloadLink],
        tree: &ProvisionedTree,
    ) -> Result<Vec<FetchOutcome>> {
        info!(
            files = links.len(),
            workers = self.pool.workers(),
            "Fetching files"
        );
        self.pool
            .run(links.iter(), |link| self.fetcher.fetch(link, tree))
            .await
    }
}
