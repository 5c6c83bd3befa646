//! Run directory provisioning
//!
//! The whole `category/[segment/]jobtype/year` tree is created up front so
//! that fetch workers only ever write files into directories that already
//! exist.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::errors::{LodesError, Result};
use crate::models::Category;
use crate::router::Route;

/// The fixed cross product of directories a run writes into
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryLayout {
    pub categories: Vec<Category>,
    pub segments: Vec<String>,
    pub job_types: Vec<String>,
    pub years: RangeInclusive<u16>,
}

impl DirectoryLayout {
    pub fn new(
        categories: Vec<Category>,
        segments: Vec<String>,
        job_types: Vec<String>,
        years: RangeInclusive<u16>,
    ) -> Self {
        Self {
            categories,
            segments,
            job_types,
            years,
        }
    }

    /// Every directory of the tree relative to the run root, parents first.
    pub fn directories(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        for category in &self.categories {
            let category_dir = PathBuf::from(category.as_str());
            dirs.push(category_dir.clone());

            if category.has_segments() {
                for segment in &self.segments {
                    let segment_dir = category_dir.join(segment);
                    dirs.push(segment_dir.clone());
                    self.push_job_type_dirs(&segment_dir, &mut dirs);
                }
            } else {
                self.push_job_type_dirs(&category_dir, &mut dirs);
            }
        }
        dirs
    }

    fn push_job_type_dirs(&self, parent: &Path, dirs: &mut Vec<PathBuf>) {
        for job_type in &self.job_types {
            let job_dir = parent.join(job_type);
            dirs.push(job_dir.clone());
            for year in self.years.clone() {
                dirs.push(job_dir.join(year.to_string()));
            }
        }
    }

    /// Whether the route's directory is one this layout provisions.
    pub fn contains(&self, route: &Route) -> bool {
        let meta = &route.metadata;
        let segment_ok = match &meta.segment {
            Some(segment) => {
                meta.category.has_segments() && self.segments.iter().any(|s| s == segment)
            }
            None => !meta.category.has_segments(),
        };
        self.categories.contains(&meta.category)
            && segment_ok
            && self.job_types.iter().any(|j| *j == meta.job_type)
            && self.years.contains(&meta.year)
    }
}

/// A run root whose directory tree has been fully created
#[derive(Debug, Clone)]
pub struct ProvisionedTree {
    root: PathBuf,
    layout: DirectoryLayout,
}

impl ProvisionedTree {
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute destination directory for a route.
    ///
    /// A route outside the layout means the configured tables no longer
    /// match what the server publishes; that ends the run.
    pub fn destination(&self, route: &Route) -> Result<PathBuf> {
        let relative = route.relative_dir();
        if self.layout.contains(route) {
            Ok(self.root.join(relative))
        } else {
            Err(LodesError::NotProvisioned {
                path: self.root.join(relative),
                file_name: route.file_name.clone(),
            })
        }
    }
}

/// Create `root` and the full layout beneath it.
///
/// `root` itself must not exist yet. Any failure is returned before a single
/// request is sent; the partially built tree is left as is.
pub fn provision(root: &Path, layout: &DirectoryLayout) -> Result<ProvisionedTree> {
    if let Some(parent) = root.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| LodesError::Provision {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    create(root)?;

    let dirs = layout.directories();
    for dir in &dirs {
        create(&root.join(dir))?;
    }

    info!(
        "Provisioned {} directories under {}",
        dirs.len(),
        root.display()
    );

    Ok(ProvisionedTree {
        root: root.to_path_buf(),
        layout: layout.clone(),
    })
}

fn create(path: &Path) -> Result<()> {
    debug!("Creating directory {}", path.display());
    std::fs::create_dir(path).map_err(|source| LodesError::Provision {
        path: path.to_path_buf(),
        source,
    })
}
