//! Fetch-and-materialize worker
//!
//! One link in, one decompressed file out. The compressed body is streamed
//! to `{destination}/{name}.gz`, inflated next to it, and the `.gz` is
//! removed afterwards.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use std::time::Duration;

use flate2::read::GzDecoder;
use futures::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use url::Url;

use crate::errors::{LodesError, Result};
use crate::models::{DownloadLink, FetchOutcome, SkipReason};
use crate::provision::ProvisionedTree;
use crate::router::{route, Route};

/// Downloads and materializes single links into a provisioned tree
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    idle_timeout: Duration,
}

impl Fetcher {
    /// `idle_timeout` bounds the wait for response headers and for each
    /// body chunk. There is no bound on the whole transfer.
    pub fn new(client: Client, idle_timeout: Duration) -> Self {
        Self {
            client,
            idle_timeout,
        }
    }

    /// Fetch one link.
    ///
    /// Returns `Ok(FetchOutcome::Skipped)` when the file name cannot be
    /// routed. A routed file without a provisioned directory, and every
    /// transfer or decompression failure, is returned as an error.
    pub async fn fetch(
        &self,
        link: &DownloadLink,
        tree: &ProvisionedTree,
    ) -> Result<FetchOutcome> {
        let route = match route_link(link) {
            Ok(route) => route,
            Err(reason) => {
                warn!(link = %link, reason = %reason, "✗ Skipping unroutable link");
                return Ok(FetchOutcome::Skipped {
                    link: link.clone(),
                    reason,
                });
            }
        };
        let destination = tree.destination(&route)?;

        let compressed = destination.join(&route.file_name);
        let artifact = destination.join(&route.artifact_name);

        let bytes = self.download(link, &compressed).await?;
        debug!(file = %route.file_name, bytes, "Wrote {}", compressed.display());

        let source = compressed.clone();
        let target = artifact.clone();
        tokio::task::spawn_blocking(move || decompress_gzip(&source, &target)).await??;

        tokio::fs::remove_file(&compressed)
            .await
            .map_err(|e| LodesError::io(&compressed, e))?;

        let relative = route.relative_artifact_path();
        info!(
            file = %route.artifact_name,
            path = %relative.display(),
            "✓ Materialized {}",
            artifact.display()
        );
        Ok(FetchOutcome::Materialized(route.artifact_name))
    }

    async fn download(&self, link: &DownloadLink, output_path: &Path) -> Result<u64> {
        debug!(link = %link, "Downloading");

        let response = timeout(self.idle_timeout, self.client.get(link.as_str()).send())
            .await
            .map_err(|_| self.stalled(link))?
            .map_err(|e| LodesError::http(link.as_str(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LodesError::Status {
                url: link.to_string(),
                status: status.as_u16(),
            });
        }

        let mut file = tokio::fs::File::create(output_path)
            .await
            .map_err(|e| LodesError::io(output_path, e))?;

        let mut written = 0u64;
        let mut stream = response.bytes_stream();
        loop {
            let next = timeout(self.idle_timeout, stream.next())
                .await
                .map_err(|_| self.stalled(link))?;
            let Some(chunk) = next else {
                break;
            };
            let chunk = chunk.map_err(|e| LodesError::http(link.as_str(), e))?;
            file.write_all(&chunk)
                .await
                .map_err(|e| LodesError::io(output_path, e))?;
            written += chunk.len() as u64;
        }
        file.flush()
            .await
            .map_err(|e| LodesError::io(output_path, e))?;

        Ok(written)
    }

    fn stalled(&self, link: &DownloadLink) -> LodesError {
        LodesError::Stalled {
            url: link.to_string(),
            idle: self.idle_timeout,
        }
    }
}

/// Route a link by the last segment of its URL.
fn route_link(link: &DownloadLink) -> std::result::Result<Route, SkipReason> {
    let file_name = file_name_from_url(link.as_str()).ok_or(SkipReason::NoFileName)?;
    route(&file_name)
}

/// Last non-empty path segment of a URL, percent-decoding not applied.
pub fn file_name_from_url(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .last()
        .map(|segment| segment.to_string())
}

/// Inflate a gzip file into `target`, replacing any existing file.
pub fn decompress_gzip(source: &Path, target: &Path) -> Result<u64> {
    let input = File::open(source).map_err(|e| LodesError::io(source, e))?;
    let mut decoder = GzDecoder::new(BufReader::new(input));

    let output = File::create(target).map_err(|e| LodesError::io(target, e))?;
    let mut writer = BufWriter::new(output);

    let bytes = std::io::copy(&mut decoder, &mut writer).map_err(|e| LodesError::Decompress {
        path: source.to_path_buf(),
        source: e,
    })?;
    writer
        .into_inner()
        .map_err(|e| LodesError::io(target, e.into_error()))?;

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;
    use crate::provision::{provision, DirectoryLayout};
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use std::time::Instant;
    use tempfile::TempDir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn gzip(data: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn rac_tree(temp_dir: &TempDir) -> ProvisionedTree {
        let layout = DirectoryLayout::new(
            vec![Category::Rac],
            vec!["S000".to_string()],
            vec!["JT00".to_string()],
            2015..=2015,
        );
        provision(&temp_dir.path().join("run"), &layout).unwrap()
    }

    /// Serve a single gzip response, writing the body `piece` bytes at a
    /// time with `pause` between writes. With `stall_after`, the server
    /// goes silent after that many pieces and keeps the connection open.
    async fn serve_slowly(
        body: Vec<u8>,
        piece: usize,
        pause: Duration,
        stall_after: Option<usize>,
    ) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    return;
                }
                request.extend_from_slice(&buf[..n]);
            }

            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/gzip\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            for (i, chunk) in body.chunks(piece).enumerate() {
                if stall_after == Some(i) {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    return;
                }
                if socket.write_all(chunk).await.is_err() {
                    return;
                }
                let _ = socket.flush().await;
                tokio::time::sleep(pause).await;
            }
        });

        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_slow_steady_download_outlasts_idle_bound() {
        let temp_dir = TempDir::new().unwrap();
        let tree = rac_tree(&temp_dir);

        let csv = "h_geocode,C000\n".to_string() + &"510010201001000,12\n".repeat(40);
        let body = gzip(csv.as_bytes());
        let piece = (body.len() / 8).max(1);
        let pieces = body.len().div_ceil(piece);
        let pause = Duration::from_millis(100);
        let base = serve_slowly(body, piece, pause, None).await;

        let idle = Duration::from_millis(400);
        let fetcher = Fetcher::new(Client::new(), idle);
        let link = DownloadLink(format!("{}/data/va_rac_S000_JT00_2015.csv.gz", base));

        let started = Instant::now();
        let outcome = fetcher.fetch(&link, &tree).await.unwrap();
        let elapsed = started.elapsed();

        assert_eq!(
            outcome,
            FetchOutcome::Materialized("va_rac_S000_JT00_2015.csv".to_string())
        );
        assert!(pieces >= 6);
        assert!(elapsed > idle, "transfer took only {:?}", elapsed);

        let dir = tree.root().join("rac/S000/JT00/2015");
        assert_eq!(
            std::fs::read_to_string(dir.join("va_rac_S000_JT00_2015.csv")).unwrap(),
            csv
        );
        assert!(!dir.join("va_rac_S000_JT00_2015.csv.gz").exists());
    }

    #[tokio::test]
    async fn test_stalled_download_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let tree = rac_tree(&temp_dir);

        let body = gzip(&b"h_geocode,C000\n".repeat(20));
        let base = serve_slowly(body, 8, Duration::from_millis(10), Some(1)).await;

        let fetcher = Fetcher::new(Client::new(), Duration::from_millis(300));
        let link = DownloadLink(format!("{}/data/va_rac_S000_JT00_2015.csv.gz", base));

        let result = fetcher.fetch(&link, &tree).await;
        assert!(
            matches!(result, Err(LodesError::Stalled { ref url, .. }) if url == link.as_str()),
            "unexpected result {:?}",
            result
        );
        assert!(!tree
            .root()
            .join("rac/S000/JT00/2015/va_rac_S000_JT00_2015.csv")
            .exists());
    }

    #[tokio::test]
    async fn test_route_outside_tree_is_fatal_before_request() {
        let temp_dir = TempDir::new().unwrap();
        let tree = rac_tree(&temp_dir);
        // Nothing listens on port 1; reaching the network would be an Http error.
        let fetcher = Fetcher::new(Client::new(), Duration::from_secs(1));

        let later_year = DownloadLink("http://127.0.0.1:1/va_rac_S000_JT00_2018.csv.gz".to_string());
        assert!(matches!(
            fetcher.fetch(&later_year, &tree).await,
            Err(LodesError::NotProvisioned { .. })
        ));

        let unroutable = DownloadLink("http://127.0.0.1:1/readme.txt".to_string());
        let outcome = fetcher.fetch(&unroutable, &tree).await.unwrap();
        assert!(outcome.is_skipped());
    }

    #[test]
    fn test_file_name_from_url() {
        assert_eq!(
            file_name_from_url("https://lehd.ces.census.gov/data/lodes/LODES7/va/rac/va_rac_S000_JT00_2015.csv.gz")
                .as_deref(),
            Some("va_rac_S000_JT00_2015.csv.gz")
        );
        assert_eq!(
            file_name_from_url("https://example.test/dir/foo.csv.gz/").as_deref(),
            Some("foo.csv.gz")
        );
        assert_eq!(file_name_from_url("https://example.test/"), None);
        assert_eq!(file_name_from_url("not a url"), None);
    }

    #[test]
    fn test_decompress_gzip() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("data.csv.gz");
        let target = temp_dir.path().join("data.csv");
        let csv = "w_geocode,C000\n510010201001000,12\n";
        std::fs::write(&source, gzip(csv.as_bytes())).unwrap();

        let bytes = decompress_gzip(&source, &target).unwrap();
        assert_eq!(bytes, csv.len() as u64);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), csv);
    }

    #[test]
    fn test_decompress_rejects_plain_bytes() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("data.csv.gz");
        std::fs::write(&source, b"definitely not gzip").unwrap();

        let result = decompress_gzip(&source, &temp_dir.path().join("data.csv"));
        assert!(matches!(result, Err(LodesError::Decompress { .. })));
    }
}
