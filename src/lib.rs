pub mod cleanup;
pub mod cli;
pub mod config;
pub mod css_rewriter;
pub mod discovery;
pub mod downloader;
pub mod error;
pub mod file_manager;
pub mod html_parser;
pub mod proxy;
pub mod session;
pub mod url_resolver;

// Re-export main types for convenience
pub use cleanup::{fix_asset_paths, CleanupReport};
pub use cli::MirrorCommand;
pub use config::MirrorConfig;
pub use css_rewriter::{CssRewrite, CssRewriter};
pub use discovery::DiscoverySet;
pub use downloader::{build_http_client, AssetFailure, DownloadReport, DownloadScheduler, FetchOutcome};
pub use error::{MirrorError, Result};
pub use file_manager::FileManager;
pub use html_parser::{Document, MarkupRewriter};
pub use proxy::{NextImageProxy, ProxyPattern, ProxyUnwrapper};
pub use session::{MirrorOutcome, MirrorSession, MirrorSummary, SessionState, Target};
pub use url_resolver::{local_path, resolve};
