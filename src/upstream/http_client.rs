//! Shared HTTP client construction policy for upstream traffic.
//!
//! Both the share API client and the download stream client are built here so
//! they stay consistent on timeouts, identity and proxy compatibility.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Duration;

use reqwest::{Client, ClientBuilder, Proxy};
use tracing::warn;

use crate::error::RelayError;

/// Network policy for one upstream client.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ClientPolicy {
    /// Fixed synthetic identity presented on every request.
    pub(crate) user_agent: &'static str,
    /// TCP/TLS connect deadline.
    pub(crate) connect_timeout: Duration,
    /// Deadline for the whole request including body. `None` for streams.
    pub(crate) total_timeout: Option<Duration>,
    /// Maximum idle time between body reads.
    pub(crate) read_timeout: Option<Duration>,
    /// Whether to negotiate and transparently decode gzip.
    pub(crate) decompress: bool,
}

/// Builds an upstream HTTP client using shared project policy.
///
/// `purpose` is used only for logging and error messages.
///
/// # Errors
///
/// Returns [`RelayError::Client`] when client construction fails.
pub(crate) fn build_http_client(purpose: &str, policy: ClientPolicy) -> Result<Client, RelayError> {
    match try_build_client(policy, false) {
        Ok(client) => Ok(client),
        Err(BuildClientFailure::Panic) => {
            // Some sandboxed environments panic when querying system proxy
            // settings. Retry with env-proxy support only.
            warn!(
                client = purpose,
                "HTTP client hit system proxy panic; using env-proxy fallback builder"
            );
            match try_build_client(policy, true) {
                Ok(client) => Ok(client),
                Err(BuildClientFailure::Panic) => Err(RelayError::Client(format!(
                    "{purpose} client construction panicked while loading proxy settings"
                ))),
                Err(BuildClientFailure::Build(error)) => {
                    Err(RelayError::Client(format!("{purpose}: {error}")))
                }
            }
        }
        Err(BuildClientFailure::Build(error)) => {
            Err(RelayError::Client(format!("{purpose}: {error}")))
        }
    }
}

enum BuildClientFailure {
    Panic,
    Build(reqwest::Error),
}

fn try_build_client(
    policy: ClientPolicy,
    disable_system_proxy_lookup: bool,
) -> Result<Client, BuildClientFailure> {
    catch_unwind(AssertUnwindSafe(move || {
        let mut builder = base_builder(policy);
        if disable_system_proxy_lookup {
            builder = apply_env_proxy_fallback(builder.no_proxy());
        }
        builder.build().map_err(BuildClientFailure::Build)
    }))
    .map_err(|_| BuildClientFailure::Panic)?
}

fn base_builder(policy: ClientPolicy) -> ClientBuilder {
    let mut builder = Client::builder()
        .connect_timeout(policy.connect_timeout)
        .user_agent(policy.user_agent)
        .gzip(policy.decompress);

    if let Some(total) = policy.total_timeout {
        builder = builder.timeout(total);
    }
    if let Some(read) = policy.read_timeout {
        builder = builder.read_timeout(read);
    }

    builder
}

const HTTPS_PROXY_VARS: [&str; 4] = ["HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"];
const HTTP_PROXY_VARS: [&str; 4] = ["HTTP_PROXY", "http_proxy", "ALL_PROXY", "all_proxy"];

/// Re-adds the proxies named in the environment after `no_proxy()` cleared
/// system discovery. Unparsable values are ignored.
fn apply_env_proxy_fallback(builder: ClientBuilder) -> ClientBuilder {
    let lookup = |name: &str| std::env::var(name).ok();
    let https = first_set(&HTTPS_PROXY_VARS, lookup).and_then(|p| Proxy::https(p.as_str()).ok());
    let http = first_set(&HTTP_PROXY_VARS, lookup).and_then(|p| Proxy::http(p.as_str()).ok());
    [https, http].into_iter().flatten().fold(builder, ClientBuilder::proxy)
}

/// First variable in `names` with a non-blank value, trimmed.
fn first_set(names: &[&str], lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
    names
        .iter()
        .filter_map(|&name| lookup(name))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}
