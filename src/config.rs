//! Service configuration.
//!
//! Loaded from a TOML file; every field has a default so a partial file is
//! enough. Validation runs once at startup and failure is fatal there, so
//! the rest of the crate can take the settings at face value.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::CadastreError;

pub const DEFAULT_UPDATE_INTERVAL_SECS: i64 = 86_400;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CadastreConfig {
    /// Base URL of the authoritative asset service.
    pub source_host: String,
    /// Category names accepted from the external snapshot. Assets of any
    /// other category are dropped during reconciliation.
    pub categories: Vec<String>,
    /// Category whose assets may seed a structure query.
    pub leaf_category: String,
    /// Categories attached to each structure root as auxiliary children.
    pub auxiliary_categories: Vec<String>,
    /// Seconds between synchronization runs. Must be positive.
    pub update_interval_secs: i64,
}

impl Default for CadastreConfig {
    fn default() -> CadastreConfig {
        CadastreConfig {
            source_host: String::new(),
            categories: vec![
                "Apartment".to_string(),
                "Building".to_string(),
                "Complex".to_string(),
                "Sports ground".to_string(),
                "Playground".to_string(),
            ],
            leaf_category: "Apartment".to_string(),
            auxiliary_categories: vec!["Sports ground".to_string(), "Playground".to_string()],
            update_interval_secs: DEFAULT_UPDATE_INTERVAL_SECS,
        }
    }
}

impl CadastreConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<CadastreConfig, CadastreError> {
        let raw = std::fs::read_to_string(path)?;
        let config: CadastreConfig = toml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), CadastreError> {
        if self.source_host.trim().is_empty() {
            return Err(CadastreError::Config(
                "source_host must be set".to_string(),
            ));
        }
        if self.update_interval_secs <= 0 {
            return Err(CadastreError::Config(format!(
                "update_interval_secs must be positive, got {}",
                self.update_interval_secs
            )));
        }
        Ok(())
    }

    /// Interval between synchronization runs. Callers must `validate()`
    /// first; a non-positive interval maps to a zero duration, which
    /// `tokio::time::interval` rejects, rather than being silently clamped
    /// to some runnable period.
    pub fn update_interval(&self) -> Duration {
        debug_assert!(self.update_interval_secs > 0, "config was not validated");
        Duration::from_secs(self.update_interval_secs.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_the_standard_category_policy() {
        let config = CadastreConfig::default();
        assert_eq!(config.leaf_category, "Apartment");
        assert_eq!(
            config.auxiliary_categories,
            vec!["Sports ground", "Playground"]
        );
        assert_eq!(config.update_interval_secs, 86_400);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let config: CadastreConfig = toml::from_str(
            r#"
            source_host = "http://assets.internal"
            update_interval_secs = 600
            "#,
        )
        .unwrap();

        assert_eq!(config.source_host, "http://assets.internal");
        assert_eq!(config.update_interval_secs, 600);
        assert_eq!(config.leaf_category, "Apartment");
        config.validate().unwrap();
    }

    #[test]
    fn update_interval_reflects_the_configured_seconds() {
        let config = CadastreConfig {
            source_host: "http://assets.internal".to_string(),
            update_interval_secs: 600,
            ..CadastreConfig::default()
        };
        config.validate().unwrap();
        assert_eq!(config.update_interval(), Duration::from_secs(600));
    }

    #[test]
    #[should_panic(expected = "config was not validated")]
    fn update_interval_refuses_an_unvalidated_non_positive_interval() {
        let mut config = CadastreConfig::default();
        config.update_interval_secs = 0;
        let _ = config.update_interval();
    }

    #[test]
    fn non_positive_interval_is_rejected() {
        let mut config = CadastreConfig {
            source_host: "http://assets.internal".to_string(),
            ..CadastreConfig::default()
        };
        config.update_interval_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(CadastreError::Config(_))
        ));
    }

    #[test]
    fn missing_host_is_rejected() {
        let config = CadastreConfig::default();
        assert!(matches!(
            config.validate(),
            Err(CadastreError::Config(_))
        ));
    }
}
