//! # Application Configuration
//!
//! The TOML file read at startup. Every section is optional and falls back
//! to the reference hardware defaults; a missing file is the same as an
//! empty one.
//!
//! ```toml
//! [buttons]
//! reset = "3"
//! "2" = "T"
//!
//! [timing]
//! showing_budget_ms = 500
//!
//! [explore]
//! strategies = ["requested", "lexicographic"]
//!
//! [intake]
//! max_body_bytes = 10000
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use xanthippe_core::primitives::DEFAULT_MAX_INTAKE_BYTES;
use xanthippe_core::{ButtonTable, ExploreSettings, Timing, XanthippeError};

// =============================================================================
// SECTIONS
// =============================================================================

/// `[intake]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IntakeSettings {
    /// Payloads larger than this are ignored.
    pub max_body_bytes: usize,
}

impl Default for IntakeSettings {
    fn default() -> Self {
        Self {
            max_body_bytes: DEFAULT_MAX_INTAKE_BYTES,
        }
    }
}

/// The whole configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Button name to symbol; empty means the reference bindings.
    pub buttons: BTreeMap<String, String>,
    pub timing: Timing,
    pub explore: ExploreSettings,
    pub intake: IntakeSettings,
}

// =============================================================================
// LOADING
// =============================================================================

impl AppConfig {
    /// Load and validate the file at `path`, or the defaults if it does not
    /// exist.
    pub fn load(path: &Path) -> Result<Self, XanthippeError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no configuration file, using defaults");
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| {
            XanthippeError::IoError(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config = Self::parse(&text)?;
        tracing::info!(path = %path.display(), "configuration loaded");
        Ok(config)
    }

    /// Parse and validate TOML text.
    pub fn parse(text: &str) -> Result<Self, XanthippeError> {
        let config: Self =
            toml::from_str(text).map_err(|e| XanthippeError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<(), XanthippeError> {
        self.timing.validate()?;
        self.explore.validate()?;
        self.button_table()?;
        if self.intake.max_body_bytes == 0 {
            return Err(XanthippeError::Config(
                "intake.max_body_bytes must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The configured button table.
    pub fn button_table(&self) -> Result<ButtonTable, XanthippeError> {
        if self.buttons.is_empty() {
            ButtonTable::reference()
        } else {
            ButtonTable::from_config(&self.buttons)
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use xanthippe_core::StrategyKind;

    #[test]
    fn empty_file_is_defaults() {
        let config = AppConfig::parse("").expect("parse");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.button_table().expect("table").alphabet().len(), 6);
    }

    #[test]
    fn missing_file_is_defaults() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let config = AppConfig::load(&dir.path().join("absent.toml")).expect("load");
        assert_eq!(config.intake.max_body_bytes, DEFAULT_MAX_INTAKE_BYTES);
    }

    #[test]
    fn sections_override_defaults() {
        let config = AppConfig::parse(
            r#"
            [buttons]
            reset = "3"
            "2" = "T"
            "=" = "i"

            [timing]
            showing_budget_ms = 800

            [explore]
            strategies = ["requested", "lexicographic"]
            seed = 7
            "#,
        )
        .expect("parse");
        assert_eq!(config.timing.showing_budget_ms, 800);
        assert_eq!(
            config.explore.strategies,
            [StrategyKind::Requested, StrategyKind::Lexicographic]
        );
        assert_eq!(config.explore.seed, Some(7));
        assert_eq!(config.button_table().expect("table").alphabet(), ['T', 'i']);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(AppConfig::parse("[timing]\nrefresh_period_us = 0").is_err());
        assert!(AppConfig::parse("[buttons]\n\"2\" = \"T\"").is_err());
        assert!(AppConfig::parse("[intake]\nmax_body_bytes = 0").is_err());
        assert!(AppConfig::parse("[unknown]\nx = 1").is_err());
    }
}
