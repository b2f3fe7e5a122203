//! Shared-secret gate in front of the relay routes.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use subtle::ConstantTimeEq;

use super::AppState;
use super::params::RelayQuery;
use crate::error::RelayError;

/// Rejects requests whose `token` does not match the configured password.
///
/// A relay without a password accepts every request.
pub(crate) async fn require_password(
    State(state): State<AppState>,
    query: RelayQuery,
    request: Request,
    next: Next,
) -> Result<Response, RelayError> {
    check_password(&state, &query)?;
    Ok(next.run(request).await)
}

/// Password check shared by the gated routes and the fallback.
pub(crate) fn check_password(state: &AppState, query: &RelayQuery) -> Result<(), RelayError> {
    match state.password.as_deref() {
        Some(expected)
            if !secrets_match(expected, query.password.as_deref().unwrap_or_default()) =>
        {
            Err(RelayError::Unauthorized)
        }
        _ => Ok(()),
    }
}

/// Constant-time comparison so response timing does not leak a prefix match.
fn secrets_match(expected: &str, supplied: &str) -> bool {
    expected.as_bytes().ct_eq(supplied.as_bytes()).into()
}
