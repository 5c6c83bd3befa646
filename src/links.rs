//! Download link discovery
//!
//! The listing service takes a form POST (`version`, `type`, `state`) and
//! answers with an HTML fragment. Download links are the anchors inside the
//! `div#lodes_file_list` container; their `href`s are site-relative.

use std::time::Duration;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info};
use url::Url;

use crate::config::ListingConfig;
use crate::errors::{LodesError, Result};
use crate::models::{DownloadLink, Task};

const FILE_LIST_SELECTOR: &str = "div#lodes_file_list";
const ANCHOR_SELECTOR: &str = "a[href]";

/// Resolves the current download links for one (region, category) pair
#[derive(Debug, Clone)]
pub struct LinkResolver {
    client: Client,
    listing: ListingConfig,
    base: Url,
    timeout: Duration,
}

impl LinkResolver {
    /// `timeout` bounds each listing request from connect to the last body byte.
    pub fn new(client: Client, listing: ListingConfig, timeout: Duration) -> Result<Self> {
        let base = Url::parse(&listing.host).map_err(|source| LodesError::InvalidUrl {
            url: listing.host.clone(),
            source,
        })?;
        Ok(Self {
            client,
            listing,
            base,
            timeout,
        })
    }

    /// Query the listing endpoint for `task`.
    ///
    /// An empty list is a valid answer; a transport error, a non-success
    /// status or a body without the file list container is not.
    pub async fn resolve(&self, task: &Task) -> Result<Vec<DownloadLink>> {
        debug!(
            region = %task.region,
            category = %task.category,
            url = %self.listing.url,
            "Requesting file list"
        );

        let form = [
            ("version", self.listing.version.as_str()),
            ("type", task.category.as_str()),
            ("state", task.region.as_str()),
        ];
        let response = self
            .client
            .post(&self.listing.url)
            .form(&form)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| LodesError::http(&self.listing.url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LodesError::Status {
                url: self.listing.url.clone(),
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| LodesError::http(&self.listing.url, e))?;

        let links = extract_links(&body, &self.base)?.ok_or_else(|| {
            LodesError::MissingFileList {
                region: task.region.to_string(),
                category: task.category.to_string(),
            }
        })?;

        info!(
            region = %task.region,
            category = %task.category,
            "Found {} files",
            links.len()
        );
        Ok(links)
    }
}

/// Pull absolute download links out of a listing page.
///
/// Returns `Ok(None)` when the page has no file list container.
pub fn extract_links(html: &str, base: &Url) -> Result<Option<Vec<DownloadLink>>> {
    let document = Html::parse_document(html);
    let container_selector = Selector::parse(FILE_LIST_SELECTOR).unwrap();
    let anchor_selector = Selector::parse(ANCHOR_SELECTOR).unwrap();

    let Some(container) = document.select(&container_selector).next() else {
        return Ok(None);
    };
    let links = container
        .select(&anchor_selector)
        .filter_map(|anchor| anchor.value().attr("href"))
        .map(|href| {
            base.join(href.trim())
                .map(|url| DownloadLink(url.to_string()))
                .map_err(|source| LodesError::InvalidUrl {
                    url: href.to_string(),
                    source,
                })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(links))
}
