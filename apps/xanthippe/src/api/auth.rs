//! # Authentication
//!
//! Bearer keys, one per route scope.
//!
//! | scope         | routes                   | variable                |
//! |---------------|--------------------------|-------------------------|
//! | `Intake`      | `POST /`                 | `XANTHIPPE_INTAKE_KEY`  |
//! | `Maintenance` | `GET /status`, `POST /forget` | `XANTHIPPE_API_KEY` |
//!
//! A scope whose variable is unset or empty is open. `GET /health` is never
//! guarded. The intake is usually fed by a web page, so it is open by
//! default while the maintenance routes are the ones worth a key.
//! ```text
//! Authorization: Bearer <key>
//! ```

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode, header},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use subtle::ConstantTimeEq;

/// Environment variable holding the maintenance key.
pub const API_KEY_ENV: &str = "XANTHIPPE_API_KEY";

/// Environment variable holding the intake key.
pub const INTAKE_KEY_ENV: &str = "XANTHIPPE_INTAKE_KEY";

// =============================================================================
// SCOPES
// =============================================================================

/// Route group sharing one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Sequence requests from the outside.
    Intake,
    /// Status and store edits from the operator's CLI.
    Maintenance,
}

impl Scope {
    /// Variable holding this scope's key.
    pub const fn env(self) -> &'static str {
        match self {
            Self::Intake => INTAKE_KEY_ENV,
            Self::Maintenance => API_KEY_ENV,
        }
    }

    /// The configured key, or `None` when the scope is open.
    pub fn key_from_env(self) -> Option<String> {
        std::env::var(self.env()).ok().filter(|k| !k.is_empty())
    }
}

/// State of [`require_key`]: the scope and the key it demands.
#[derive(Debug, Clone)]
pub struct ScopeKey {
    pub scope: Scope,
    pub key: Arc<str>,
}

impl ScopeKey {
    /// The guard for `scope`, if its key is configured.
    pub fn from_env(scope: Scope) -> Option<Self> {
        scope.key_from_env().map(|key| Self {
            scope,
            key: Arc::from(key),
        })
    }
}

// =============================================================================
// KEY CHECK
// =============================================================================

/// Constant-time key comparison.
///
/// Both sides are padded to a common length before `ct_eq` so the running
/// time does not depend on where the keys differ.
fn keys_match(provided: &[u8], expected: &[u8]) -> bool {
    let width = provided.len().max(expected.len());
    let mut left = vec![0u8; width];
    let mut right = vec![0u8; width];
    left[..provided.len()].copy_from_slice(provided);
    right[..expected.len()].copy_from_slice(expected);
    let same: bool = left.ct_eq(&right).into();
    same && provided.len() == expected.len()
}

/// Reject requests that do not carry the scope's key.
pub async fn require_key(
    State(guard): State<ScopeKey>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.strip_prefix("Bearer ").unwrap_or(v));

    match provided {
        Some(key) if keys_match(key.as_bytes(), guard.key.as_bytes()) => {
            Ok(next.run(request).await)
        }
        provided => {
            tracing::warn!(
                event = "auth_failure",
                scope = ?guard.scope,
                path = %request.uri().path(),
                missing = provided.is_none(),
                "Rejected request without a valid key"
            );
            Err((StatusCode::UNAUTHORIZED, "Unauthorized"))
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_match_requires_equal_bytes_and_length() {
        assert!(keys_match(b"secret", b"secret"));
        assert!(!keys_match(b"secret", b"secreT"));
        assert!(!keys_match(b"secret", b"secret\0"));
        assert!(!keys_match(b"", b"secret"));
    }

    #[test]
    fn scopes_read_their_own_variable() {
        assert_eq!(Scope::Intake.env(), "XANTHIPPE_INTAKE_KEY");
        assert_eq!(Scope::Maintenance.env(), "XANTHIPPE_API_KEY");
    }
}
