//! # API Response Types
//!
//! JSON bodies of the status and maintenance endpoints. The intake endpoint
//! answers with an empty body and has no type here.

use serde::{Deserialize, Serialize};
use xanthippe_core::CoverageStats;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Coverage store counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub success: bool,
    pub stats: Option<CoverageStats>,
    pub error: Option<String>,
}

impl StatusResponse {
    pub fn success(stats: CoverageStats) -> Self {
        Self {
            success: true,
            stats: Some(stats),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            stats: None,
            error: Some(msg.into()),
        }
    }
}

// =============================================================================
// FORGET REQUEST/RESPONSE
// =============================================================================

/// Body of `POST /forget`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgetRequest {
    /// Button symbols of the prefix to clear.
    pub prefix: String,
    /// Only count the rows under the prefix.
    #[serde(default)]
    pub dry_run: bool,
}

/// Rows under a prefix, counted or cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForgetResponse {
    pub success: bool,
    pub prefix: String,
    /// Rows under the prefix (dry run) or rows cleared.
    pub affected: Option<usize>,
    pub error: Option<String>,
}

impl ForgetResponse {
    pub fn success(prefix: impl Into<String>, affected: usize) -> Self {
        Self {
            success: true,
            prefix: prefix.into(),
            affected: Some(affected),
            error: None,
        }
    }

    pub fn error(prefix: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            prefix: prefix.into(),
            affected: None,
            error: Some(msg.into()),
        }
    }
}
