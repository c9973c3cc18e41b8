use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_MAX_CONCURRENT: usize = 10;
pub const DEFAULT_DOCUMENT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_ASSET_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_CSS_ASSET_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Tunables for a single mirror session.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Directory in which `cloned-<hostname>` is created.
    pub output_root: PathBuf,
    /// Size of the worker pool for the top-level download batch.
    pub max_concurrent: usize,
    pub document_timeout: Duration,
    pub asset_timeout: Duration,
    /// Timeout for assets found inside downloaded stylesheets.
    pub css_asset_timeout: Duration,
    pub user_agent: String,
    pub show_progress: bool,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("."),
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            document_timeout: DEFAULT_DOCUMENT_TIMEOUT,
            asset_timeout: DEFAULT_ASSET_TIMEOUT,
            css_asset_timeout: DEFAULT_CSS_ASSET_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            show_progress: true,
        }
    }
}
