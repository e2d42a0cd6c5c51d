//! Ledger configuration.
//!
//! Parsed from a TOML file by the host tool. The configuration hash
//! participates in the protocol fingerprint (a config change under an
//! activated season is drift), so the struct serializes through the
//! same canonical profile as every artifact.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::canonical;
use crate::crypto::{ArtifactHasher, Hash32};

/// Domain tag for the configuration hash.
pub const CONFIG_DOMAIN: &[u8] = b"SL_CONFIG_V1";

/// Default per-user share ceiling: 15% in parts-per-million.
pub const DEFAULT_MAX_SHARE_PPM: u32 = 150_000;

/// Default governance limit on allocation entries per community.
pub const DEFAULT_MAX_ENTRIES_PER_COMMUNITY: u32 = 10_000;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("cannot read config file: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML failed to parse.
    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration is structurally valid but semantically wrong.
    #[error("invalid config: {message}")]
    Invalid {
        /// What is wrong.
        message: String,
    },
}

fn default_max_share_ppm() -> u32 {
    DEFAULT_MAX_SHARE_PPM
}

fn default_max_entries() -> u32 {
    DEFAULT_MAX_ENTRIES_PER_COMMUNITY
}

fn default_pack_prefix() -> String {
    "seasonpack".to_string()
}

fn default_signal_weights() -> BTreeMap<String, u64> {
    BTreeMap::from([
        ("post".to_string(), 10),
        ("comment".to_string(), 5),
        ("reaction".to_string(), 1),
        ("share".to_string(), 3),
        ("subscription".to_string(), 20),
        ("purchase".to_string(), 50),
    ])
}

/// The ledger configuration in force for a deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LedgerConfig {
    /// Weighted mass contributed by each signal type. Types not listed
    /// contribute nothing.
    #[serde(default = "default_signal_weights")]
    pub signal_weights: BTreeMap<String, u64>,

    /// Default per-user share ceiling in parts-per-million (the whale
    /// clamp). Seasons may override it downward or upward through
    /// their compiled constraints.
    #[serde(default = "default_max_share_ppm")]
    pub default_max_share_ppm: u32,

    /// Default governance limit on allocation entries per community.
    #[serde(default = "default_max_entries")]
    pub default_max_entries_per_community: u32,

    /// Seasons the governance gate refuses outright.
    #[serde(default)]
    pub blocked_seasons: Vec<String>,

    /// Filename prefix for exported audit packs.
    #[serde(default = "default_pack_prefix")]
    pub audit_pack_prefix: String,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            signal_weights: default_signal_weights(),
            default_max_share_ppm: DEFAULT_MAX_SHARE_PPM,
            default_max_entries_per_community: DEFAULT_MAX_ENTRIES_PER_COMMUNITY,
            blocked_seasons: Vec::new(),
            audit_pack_prefix: default_pack_prefix(),
        }
    }
}

impl LedgerConfig {
    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read, parsed, or
    /// validated.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the TOML is invalid or fails
    /// validation.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validates semantic constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] on an empty weight table, a
    /// zero or over-unity share ceiling, or a zero entry limit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.signal_weights.is_empty() {
            return Err(ConfigError::Invalid {
                message: "signal weight table is empty".to_string(),
            });
        }
        if self.signal_weights.values().all(|w| *w == 0) {
            return Err(ConfigError::Invalid {
                message: "every signal weight is zero".to_string(),
            });
        }
        if self.default_max_share_ppm == 0 || self.default_max_share_ppm > 1_000_000 {
            return Err(ConfigError::Invalid {
                message: format!(
                    "default_max_share_ppm must be in (0, 1000000], got {}",
                    self.default_max_share_ppm
                ),
            });
        }
        if self.default_max_entries_per_community == 0 {
            return Err(ConfigError::Invalid {
                message: "default_max_entries_per_community must be positive".to_string(),
            });
        }
        Ok(())
    }

    /// Canonical hash of the configuration.
    ///
    /// Captured into the freeze baseline at activation time.
    #[must_use]
    pub fn config_hash(&self) -> Hash32 {
        serde_json::to_value(self)
            .ok()
            .and_then(|v| canonical::canonical_bytes(&v).ok())
            .map_or_else(
                || ArtifactHasher::hash_domain(CONFIG_DOMAIN, format!("{self:?}").as_bytes()),
                |bytes| ArtifactHasher::hash_domain(CONFIG_DOMAIN, &bytes),
            )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = LedgerConfig::default();
        config.validate().unwrap();
    }

    #[test]
    fn test_from_toml_overrides() {
        let config = LedgerConfig::from_toml(
            r#"
default_max_share_ppm = 100000
blocked_seasons = ["S-embargoed"]

[signal_weights]
post = 7
boost = 2
"#,
        )
        .unwrap();
        assert_eq!(config.default_max_share_ppm, 100_000);
        assert_eq!(config.signal_weights["boost"], 2);
        assert_eq!(config.blocked_seasons, vec!["S-embargoed"]);
    }

    #[test]
    fn test_zero_ceiling_rejected() {
        let err = LedgerConfig::from_toml("default_max_share_ppm = 0").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_config_hash_changes_with_weights() {
        let a = LedgerConfig::default();
        let mut b = LedgerConfig::default();
        b.signal_weights.insert("boost".to_string(), 2);
        assert_ne!(a.config_hash(), b.config_hash());
    }
}
