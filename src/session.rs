use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::{debug, info};
use url::{Origin, Url};

use crate::config::MirrorConfig;
use crate::discovery::DiscoverySet;
use crate::downloader::{fetch, AssetFailure, DownloadScheduler};
use crate::error::{MirrorError, Result};
use crate::file_manager::FileManager;
use crate::html_parser::{Document, MarkupRewriter};
use crate::proxy::{ProxyPattern, ProxyUnwrapper};
use crate::url_resolver::is_fetchable;

/// The page being mirrored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub url: Url,
    pub origin: Origin,
    pub hostname: String,
}

impl Target {
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| MirrorError::InvalidTarget {
            url: raw.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(raw.trim()).map_err(|e| invalid(&e.to_string()))?;
        if !is_fetchable(&url) {
            return Err(invalid("only http and https pages can be mirrored"));
        }
        let hostname = url.host_str().ok_or_else(|| invalid("missing host"))?.to_string();

        Ok(Self {
            origin: url.origin(),
            url,
            hostname,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Created,
    FetchingDocument,
    RewritingMarkup,
    DownloadingAssets,
    WritingOutput,
    Done,
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "created",
            Self::FetchingDocument => "fetching document",
            Self::RewritingMarkup => "rewriting markup",
            Self::DownloadingAssets => "downloading assets",
            Self::WritingOutput => "writing output",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What a finished session produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSummary {
    pub target: String,
    pub output_directory: PathBuf,
    pub assets_discovered: usize,
    pub assets_downloaded: usize,
    pub failures: Vec<AssetFailure>,
}

impl MirrorSummary {
    pub fn message(&self) -> String {
        format!(
            "Successfully cloned the landing page of {} to {} (downloaded {} of {} assets)",
            self.target,
            self.output_directory.display(),
            self.assets_downloaded,
            self.assets_discovered
        )
    }
}

/// Result record handed to whatever drives the mirror.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MirrorOutcome {
    #[serde(rename_all = "camelCase")]
    Success {
        output_directory: String,
        assets_discovered: usize,
        assets_downloaded: usize,
        message: String,
    },
    Failure {
        error: String,
    },
}

impl MirrorOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

impl From<Result<MirrorSummary>> for MirrorOutcome {
    fn from(result: Result<MirrorSummary>) -> Self {
        match result {
            Ok(summary) => Self::Success {
                output_directory: summary.output_directory.display().to_string(),
                assets_discovered: summary.assets_discovered,
                assets_downloaded: summary.assets_downloaded,
                message: summary.message(),
            },
            Err(e) => Self::Failure {
                error: format!("Error cloning website: {}", e),
            },
        }
    }
}

/// Mirrors one page: fetch, rewrite, download, write.
///
/// The HTTP client and worker-pool limiter are passed in so sessions can
/// share them or run in isolation.
pub struct MirrorSession {
    client: Client,
    limiter: Arc<Semaphore>,
    config: MirrorConfig,
    proxies: ProxyUnwrapper,
    state: SessionState,
}

impl MirrorSession {
    pub fn new(client: Client, limiter: Arc<Semaphore>, config: MirrorConfig) -> Self {
        Self {
            client,
            limiter,
            config,
            proxies: ProxyUnwrapper::default(),
            state: SessionState::Created,
        }
    }

    /// Adds an image-proxy convention on top of the built-in ones.
    pub fn with_proxy_pattern(mut self, pattern: Box<dyn ProxyPattern>) -> Self {
        self.proxies = self.proxies.with_pattern(pattern);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session and folds any fatal error into a [`MirrorOutcome`].
    pub async fn run(&mut self, target: &str) -> MirrorOutcome {
        self.mirror(target).await.into()
    }

    pub async fn mirror(&mut self, target: &str) -> Result<MirrorSummary> {
        let result = self.mirror_inner(target).await;
        if result.is_err() {
            self.transition(SessionState::Failed);
        }
        result
    }

    async fn mirror_inner(&mut self, raw_target: &str) -> Result<MirrorSummary> {
        let target = Target::parse(raw_target)?;
        info!("🚀 Cloning {}", target.url);

        let files = FileManager::create(&self.config.output_root, &target.hostname).await?;
        info!("📁 Output directory: {}", files.base_dir().display());

        self.transition(SessionState::FetchingDocument);
        info!("📄 Fetching HTML...");
        let fetched = fetch(&self.client, target.url.as_str(), self.config.document_timeout)
            .await
            .map_err(|reason| MirrorError::DocumentFetch {
                url: target.url.to_string(),
                reason,
            })?;
        let html = String::from_utf8_lossy(&fetched.body);

        self.transition(SessionState::RewritingMarkup);
        info!("🔍 Processing markup...");
        // The document is serialized right away so no tree is held across the downloads.
        let (rewritten, discovered, rewrite_failures) = {
            let document = Document::parse(&html);
            let mut discovered = DiscoverySet::new();
            let stats = MarkupRewriter::new(&target.url, &self.proxies).rewrite(&document, &mut discovered);
            debug!(
                "Rewrote {} references, skipped {}",
                stats.references_rewritten, stats.references_skipped
            );
            (document.serialize()?, discovered, stats.failures)
        };

        self.transition(SessionState::DownloadingAssets);
        let scheduler = DownloadScheduler::new(
            self.client.clone(),
            self.limiter.clone(),
            files.clone(),
            target.origin.clone(),
            &self.config,
        );
        let report = scheduler.run(&discovered).await;

        self.transition(SessionState::WritingOutput);
        files.save_document(&rewritten).await?;

        self.transition(SessionState::Done);
        let summary = MirrorSummary {
            target: target.url.to_string(),
            output_directory: files.base_dir().to_path_buf(),
            assets_discovered: report.discovered,
            assets_downloaded: report.downloaded(),
            failures: rewrite_failures.into_iter().chain(report.failures()).collect(),
        };
        info!("✅ {}", summary.message());

        Ok(summary)
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {} -> {}", self.state, next);
        self.state = next;
    }
}
