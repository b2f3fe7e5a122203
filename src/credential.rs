//! Upstream credential pool.
//!
//! The pool is loaded once at startup and never mutated afterwards, so it is
//! shared across request tasks without locking.

use std::fmt;
use std::sync::Arc;

use rand::seq::SliceRandom;
use serde::Serialize;
use tracing::debug;

use crate::error::RelayError;

/// An opaque upstream auth token.
///
/// `Debug` is redacted so credentials never reach logs.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wraps a raw token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw token for placement in an upstream request body.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Configured set of upstream tokens.
#[derive(Debug, Clone, Default)]
pub struct TokenPool {
    tokens: Arc<[Credential]>,
}

impl TokenPool {
    /// Builds a pool from raw tokens, dropping blank entries.
    #[must_use]
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<Credential> = tokens
            .into_iter()
            .map(Into::into)
            .map(|token: String| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .map(Credential)
            .collect();
        Self {
            tokens: tokens.into(),
        }
    }

    /// Number of pooled credentials.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns true when no credential is configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Picks the credential for one request.
    ///
    /// A non-empty `explicit` token is returned verbatim and bypasses the pool.
    /// Otherwise one pooled credential is chosen uniformly at random, with no
    /// affinity between calls.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::NoCredentialAvailable`] when no explicit token was
    /// given and the pool is empty.
    pub fn select(&self, explicit: Option<&str>) -> Result<Credential, RelayError> {
        if let Some(token) = explicit.filter(|token| !token.is_empty()) {
            debug!("using caller-supplied credential");
            return Ok(Credential::new(token));
        }

        self.tokens
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or(RelayError::NoCredentialAvailable)
    }
}
