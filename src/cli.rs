//! CLI argument definitions using clap derive macros.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

use ctrelay_core::{DownloadMode, RelayConfig};

/// Stateless HTTP relay for CTFile share links.
///
/// Lists share folders recursively, resolves direct download URLs in batch,
/// and redirects to or streams single files with byte ranges preserved.
#[derive(Parser, Debug)]
#[command(name = "ctrelay")]
#[command(author, version, about)]
pub struct Args {
    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,

    /// Config file (default: $XDG_CONFIG_HOME/ctrelay/config.toml)
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Listen address [default: 0.0.0.0:8787]
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,

    /// Share API base URL [default: https://rest.ctfile.com]
    #[arg(long, value_name = "URL")]
    pub upstream: Option<String>,

    /// Upstream token for the credential pool (repeatable; replaces configured tokens)
    #[arg(short, long = "token", value_name = "TOKEN")]
    pub tokens: Vec<String>,

    /// Shared secret callers must pass as the `token` query parameter
    #[arg(long, value_name = "SECRET")]
    pub password: Option<String>,

    /// How /download delivers files: redirect or proxy [default: redirect]
    #[arg(short = 'm', long, value_name = "MODE")]
    pub download_mode: Option<DownloadMode>,

    /// Resolve calls in flight per batch (1-100)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=100))]
    pub resolve_concurrency: Option<u8>,

    /// Share API request timeout in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub api_timeout: Option<u64>,

    /// Idle read timeout while streaming downloads, in seconds (1-3600)
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=3600))]
    pub download_read_timeout: Option<u64>,
}

impl Args {
    /// Overlays explicitly passed flags; unset flags keep lower-priority values.
    pub fn apply_to(&self, config: &mut RelayConfig) {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if let Some(upstream) = &self.upstream {
            config.upstream_base_url.clone_from(upstream);
        }
        if !self.tokens.is_empty() {
            config.tokens.clone_from(&self.tokens);
        }
        if let Some(password) = &self.password {
            config.password = Some(password.clone()).filter(|p| !p.is_empty());
        }
        if let Some(mode) = self.download_mode {
            config.download_mode = mode;
        }
        if let Some(concurrency) = self.resolve_concurrency {
            config.resolve_concurrency = usize::from(concurrency);
        }
        if let Some(secs) = self.api_timeout {
            config.api_timeout_secs = secs;
        }
        if let Some(secs) = self.download_read_timeout {
            config.download_read_timeout_secs = secs;
        }
    }
}
