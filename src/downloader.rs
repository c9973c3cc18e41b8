use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::{Client, ClientBuilder};
use tokio::sync::{Mutex, Semaphore};
use tracing::{debug, info, warn};
use url::{Origin, Url};

use crate::config::MirrorConfig;
use crate::css_rewriter::CssRewriter;
use crate::discovery::DiscoverySet;
use crate::error::{MirrorError, Result};
use crate::file_manager::FileManager;
use crate::url_resolver::{is_fetchable, local_path};

/// Builds the default HTTP client for a session.
pub fn build_http_client(config: &MirrorConfig) -> Result<Client> {
    let client = ClientBuilder::new()
        .use_rustls_tls()
        .user_agent(config.user_agent.as_str())
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()?;

    Ok(client)
}

/// A fetched response body.
#[derive(Debug)]
pub struct Fetched {
    pub body: Vec<u8>,
    pub content_type: Option<String>,
}

/// GETs `url` with a per-request timeout; any non-success status is an error.
pub async fn fetch(client: &Client, url: &str, timeout: Duration) -> std::result::Result<Fetched, String> {
    let response = client
        .get(url)
        .timeout(timeout)
        .send()
        .await
        .map_err(describe_request_error)?;

    let status = response.status();
    if !status.is_success() {
        return Err(format!("HTTP {}", status.as_u16()));
    }

    let content_type = content_type_of(&response);
    let body = response.bytes().await.map_err(describe_request_error)?;

    Ok(Fetched {
        body: body.to_vec(),
        content_type,
    })
}

fn describe_request_error(error: reqwest::Error) -> String {
    if error.is_timeout() {
        "timed out".to_string()
    } else {
        error.to_string()
    }
}

fn content_type_of(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Whether a payload is a stylesheet, by URL extension or declared type.
pub fn is_stylesheet(url: &Url, content_type: Option<&str>) -> bool {
    let by_extension = mime_guess::from_path(url.path())
        .first()
        .is_some_and(|guess| guess == mime::TEXT_CSS);
    let by_declared_type = content_type
        .and_then(|ct| ct.parse::<mime::Mime>().ok())
        .is_some_and(|ct| ct.essence_str() == mime::TEXT_CSS.essence_str());

    by_extension || by_declared_type
}

/// Where an asset was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetSource {
    /// Referenced by the page markup or its inline styles.
    Page,
    /// Referenced from inside a downloaded stylesheet.
    Stylesheet,
}

/// A single asset that could not be mirrored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFailure {
    pub url: String,
    pub reason: String,
}

/// Per-URL result of the download phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Downloaded {
        url: String,
        local_path: String,
        bytes: usize,
        source: AssetSource,
    },
    Failed {
        url: String,
        reason: String,
        source: AssetSource,
    },
}

/// Aggregated result of the download phase.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// Distinct URLs claimed for download, stylesheet discoveries included.
    pub discovered: usize,
    pub outcomes: Vec<FetchOutcome>,
}

impl DownloadReport {
    pub fn downloaded(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o, FetchOutcome::Downloaded { .. }))
            .count()
    }

    pub fn failures(&self) -> Vec<AssetFailure> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                FetchOutcome::Failed { url, reason, .. } => Some(AssetFailure {
                    url: url.clone(),
                    reason: reason.clone(),
                }),
                FetchOutcome::Downloaded { .. } => None,
            })
            .collect()
    }
}

/// Downloads a discovery set with bounded concurrency.
///
/// Every URL is fetched at most once: the top-level batch and the recursive
/// stylesheet pass claim URLs in the same seen-set before fetching.
pub struct DownloadScheduler {
    client: Client,
    limiter: Arc<Semaphore>,
    files: FileManager,
    target_origin: Origin,
    css: CssRewriter,
    seen: Mutex<HashSet<String>>,
    asset_timeout: Duration,
    css_asset_timeout: Duration,
    show_progress: bool,
}

impl DownloadScheduler {
    pub fn new(
        client: Client,
        limiter: Arc<Semaphore>,
        files: FileManager,
        target_origin: Origin,
        config: &MirrorConfig,
    ) -> Self {
        Self {
            client,
            limiter,
            files,
            css: CssRewriter::new(target_origin.clone()),
            target_origin,
            seen: Mutex::new(HashSet::new()),
            asset_timeout: config.asset_timeout,
            css_asset_timeout: config.css_asset_timeout,
            show_progress: config.show_progress,
        }
    }

    /// Fetches every member of `discovered`, then the assets their stylesheets reference.
    pub async fn run(&self, discovered: &DiscoverySet) -> DownloadReport {
        let urls: Vec<&str> = discovered.iter().collect();
        self.seen
            .lock()
            .await
            .extend(urls.iter().map(|url| url.to_string()));

        let progress_bar = if self.show_progress {
            let bar = ProgressBar::new(urls.len() as u64);
            if let Ok(style) = ProgressStyle::default_bar().template("{spinner} [{bar:40}] {pos}/{len} {msg}") {
                bar.set_style(style);
            }
            bar
        } else {
            ProgressBar::hidden()
        };

        info!("📥 Downloading {} assets...", urls.len());
        let batches = join_all(urls.into_iter().map(|url| {
            let progress_bar = progress_bar.clone();
            async move {
                let outcomes = self.download_top_level(url).await;
                progress_bar.inc(1);
                outcomes
            }
        }))
        .await;
        progress_bar.finish_and_clear();

        DownloadReport {
            discovered: self.seen.lock().await.len(),
            outcomes: batches.into_iter().flatten().collect(),
        }
    }

    /// Downloads one top-level asset under a worker-pool permit.
    async fn download_top_level(&self, url: &str) -> Vec<FetchOutcome> {
        let Ok(parsed) = Url::parse(url) else {
            return vec![self.record_failure(url, AssetSource::Page, "invalid URL".to_string())];
        };
        if !is_fetchable(&parsed) {
            return vec![self.record_failure(url, AssetSource::Page, "unsupported scheme".to_string())];
        }

        let _permit = match self.limiter.acquire().await {
            Ok(permit) => permit,
            Err(e) => return vec![self.record_failure(url, AssetSource::Page, e.to_string())],
        };

        let fetched = match fetch(&self.client, url, self.asset_timeout).await {
            Ok(fetched) => fetched,
            Err(reason) => return vec![self.record_failure(url, AssetSource::Page, reason)],
        };

        let local = local_path(&parsed, &self.target_origin);
        if let Err(e) = self.files.save_file(&local, &fetched.body).await {
            return vec![self.record_failure(url, AssetSource::Page, e.to_string())];
        }
        info!("✅ Downloaded: {}", local);

        let mut outcomes = vec![FetchOutcome::Downloaded {
            url: url.to_string(),
            local_path: local.clone(),
            bytes: fetched.body.len(),
            source: AssetSource::Page,
        }];

        if is_stylesheet(&parsed, fetched.content_type.as_deref()) {
            outcomes.extend(self.mirror_stylesheet(&parsed, &local, &fetched.body).await);
        }

        outcomes
    }

    /// Rewrites a downloaded stylesheet and fetches the assets it references.
    ///
    /// Stylesheets found here are saved but not scanned again.
    async fn mirror_stylesheet(&self, css_url: &Url, local: &str, body: &[u8]) -> Vec<FetchOutcome> {
        let css = String::from_utf8_lossy(body);
        let from_dir = Path::new(local).parent().unwrap_or(Path::new(""));
        let rewrite = self.css.rewrite(&css, css_url, from_dir);

        let mut outcomes = Vec::new();
        for embedded in &rewrite.discovered {
            if !self.claim(embedded.as_str()).await {
                debug!("Already mirrored: {}", embedded);
                continue;
            }
            outcomes.push(self.download_embedded(embedded).await);
        }

        if rewrite.substitutions > 0 {
            if let Err(e) = self.files.save_file(local, rewrite.text.as_bytes()).await {
                warn!("⚠️ Failed to write rewritten stylesheet {}: {}", local, e);
            }
        }

        outcomes
    }

    async fn download_embedded(&self, url: &Url) -> FetchOutcome {
        let fetched = match fetch(&self.client, url.as_str(), self.css_asset_timeout).await {
            Ok(fetched) => fetched,
            Err(reason) => return self.record_failure(url.as_str(), AssetSource::Stylesheet, reason),
        };

        let local = local_path(url, &self.target_origin);
        match self.files.save_file(&local, &fetched.body).await {
            Ok(_) => {
                info!("✅ Downloaded: {}", local);
                FetchOutcome::Downloaded {
                    url: url.to_string(),
                    local_path: local,
                    bytes: fetched.body.len(),
                    source: AssetSource::Stylesheet,
                }
            }
            Err(e) => self.record_failure(url.as_str(), AssetSource::Stylesheet, e.to_string()),
        }
    }

    /// Marks `url` as taken; `false` if some pass already claimed it.
    async fn claim(&self, url: &str) -> bool {
        self.seen.lock().await.insert(url.to_string())
    }

    fn record_failure(&self, url: &str, source: AssetSource, reason: String) -> FetchOutcome {
        warn!(
            "{}",
            MirrorError::AssetFetch {
                url: url.to_string(),
                reason: reason.clone(),
            }
        );
        FetchOutcome::Failed {
            url: url.to_string(),
            reason,
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stylesheet_detection() {
        let css = Url::parse("https://example.com/app.css?v=3").unwrap();
        let font = Url::parse("https://example.com/fonts/a.woff2").unwrap();
        let dynamic = Url::parse("https://example.com/styles").unwrap();

        assert!(is_stylesheet(&css, None));
        assert!(is_stylesheet(&css, Some("application/octet-stream")));
        assert!(!is_stylesheet(&font, Some("font/woff2")));
        assert!(is_stylesheet(&dynamic, Some("text/css; charset=utf-8")));
        assert!(!is_stylesheet(&dynamic, None));
    }
}
