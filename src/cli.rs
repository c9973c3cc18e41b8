use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use crate::config::{MirrorConfig, DEFAULT_USER_AGENT};

#[derive(Parser, Debug)]
#[command(
    name = "page-mirror",
    about = "A CLI utility to mirror a single web page for offline viewing",
    version,
    long_about = "Downloads a page's HTML together with its images, stylesheets, scripts and fonts, rewrites every reference to point at the local copy, and stores the result under cloned-<hostname>/."
)]
pub struct MirrorCommand {
    #[command(subcommand)]
    pub command: Command,

    /// Log every state transition and skipped reference
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Mirror the page at URL
    Clone(CloneArgs),

    /// Clean up asset references in an existing mirror
    Fix {
        /// Directory produced by a previous clone
        directory: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct CloneArgs {
    /// The URL of the page to mirror
    #[arg(required = true)]
    pub url: String,

    /// Directory in which cloned-<hostname> is created
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Maximum concurrent downloads
    #[arg(short = 'c', long, default_value = "10", value_parser = clap::value_parser!(u32).range(1..=1024))]
    pub max_concurrent: u32,

    /// User agent string to use for requests
    #[arg(long, default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    /// Timeout for the page itself in seconds
    #[arg(long, default_value = "30", value_parser = clap::value_parser!(u64).range(1..))]
    pub document_timeout: u64,

    /// Timeout for each asset in seconds
    #[arg(long, default_value = "15", value_parser = clap::value_parser!(u64).range(1..))]
    pub asset_timeout: u64,

    /// Timeout for assets referenced from downloaded stylesheets in seconds
    #[arg(long, default_value = "10", value_parser = clap::value_parser!(u64).range(1..))]
    pub css_timeout: u64,

    /// Print the result record as JSON
    #[arg(long)]
    pub json: bool,

    /// Do not draw a progress bar
    #[arg(long)]
    pub no_progress: bool,
}

impl CloneArgs {
    pub fn mirror_config(&self) -> MirrorConfig {
        MirrorConfig {
            output_root: self.output_dir.clone(),
            max_concurrent: self.max_concurrent as usize,
            document_timeout: Duration::from_secs(self.document_timeout),
            asset_timeout: Duration::from_secs(self.asset_timeout),
            css_asset_timeout: Duration::from_secs(self.css_timeout),
            user_agent: self.user_agent.clone(),
            show_progress: !(self.no_progress || self.json),
        }
    }
}
