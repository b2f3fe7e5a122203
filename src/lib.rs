//! CTFile Relay Core Library
//!
//! A stateless HTTP relay in front of the CTFile share API. Callers pass a
//! share link; the relay authenticates with a pooled upstream token, walks
//! the share's folder tree, resolves time-limited download URLs, and either
//! redirects to them or streams the file through with byte ranges intact.
//!
//! # Architecture
//!
//! - [`credential`] - Upstream token pool
//! - [`link`] - Share link normalization
//! - [`upstream`] - Share API client behind the [`ShareApi`] trait
//! - [`pipeline`] - Recursive listing expansion and batch URL resolution
//! - [`proxy`] - Range-preserving download stream relay
//! - [`config`] - Defaults, config file and environment overlay
//! - [`server`] - axum routes, password gate, HTTP error mapping

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod credential;
pub mod error;
pub mod link;
pub mod pipeline;
pub mod proxy;
pub mod server;
pub mod upstream;
mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{DownloadMode, FileConfig, RelayConfig};
pub use credential::{Credential, TokenPool};
pub use error::RelayError;
pub use link::ShareLink;
pub use pipeline::{FlatFile, ResolvedDownload, expand, resolve_many};
pub use proxy::{ProxiedDownload, RangeHeaders, StreamProxy};
pub use server::{AppState, router, serve};
pub use upstream::{ListingEntry, ShareApi, UpstreamClient};
