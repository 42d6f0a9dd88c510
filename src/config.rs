//! Configuration for artifact-sync.

use crate::error::{Error, Result};
use crate::source::ArtifactVariant;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Updater configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Directory artifacts are installed into.
    #[serde(default = "default_install_dir")]
    pub install_dir: PathBuf,

    /// Variants to keep current.
    #[serde(default = "default_variants")]
    pub variants: Vec<ArtifactVariant>,

    /// Seconds between poll cycles for each variant.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// HTTP timeout in seconds, applied to metadata and download requests.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_secs: u64,

    /// Seconds between a detected update and the restart request taking
    /// effect.
    #[serde(default = "default_restart_delay")]
    pub restart_delay_secs: u64,

    /// Log level.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for UpdaterConfig {
    fn default() -> Self {
        Self {
            install_dir: default_install_dir(),
            variants: default_variants(),
            poll_interval_secs: default_poll_interval(),
            http_timeout_secs: default_http_timeout(),
            restart_delay_secs: default_restart_delay(),
            log_level: default_log_level(),
        }
    }
}

fn default_install_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "artifact-sync")
        .map(|dirs| dirs.data_dir().join("artifacts"))
        .unwrap_or_else(|| PathBuf::from(".artifact-sync/artifacts"))
}

fn default_variants() -> Vec<ArtifactVariant> {
    vec![ArtifactVariant::Primary]
}

const fn default_poll_interval() -> u64 {
    600 // 10 minutes
}

const fn default_http_timeout() -> u64 {
    30
}

const fn default_restart_delay() -> u64 {
    60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl UpdaterConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Save configuration to a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn to_file(&self, path: &std::path::Path) -> Result<()> {
        let content = toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Check the configuration for values the service cannot run with.
    ///
    /// # Errors
    ///
    /// Returns an error if no variant is selected, a variant is listed
    /// twice, or an interval is zero.
    pub fn validate(&self) -> Result<()> {
        if self.variants.is_empty() {
            return Err(Error::Config("at least one variant must be selected".into()));
        }
        let mut seen = std::collections::HashSet::new();
        for variant in &self.variants {
            if !seen.insert(variant) {
                return Err(Error::Config(format!("variant '{variant}' listed twice")));
            }
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Config("poll_interval_secs must be non-zero".into()));
        }
        if self.http_timeout_secs == 0 {
            return Err(Error::Config("http_timeout_secs must be non-zero".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = UpdaterConfig::default();
        config.validate().unwrap();
        assert_eq!(config.poll_interval_secs, 600);
        assert_eq!(config.variants, vec![ArtifactVariant::Primary]);
    }

    #[test]
    fn toml_round_trip() {
        let config = UpdaterConfig {
            variants: vec![
                ArtifactVariant::Primary,
                ArtifactVariant::LegacyCompatibility,
            ],
            poll_interval_secs: 120,
            ..UpdaterConfig::default()
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        config.to_file(&path).unwrap();

        let loaded = UpdaterConfig::from_file(&path).unwrap();
        assert_eq!(loaded.variants, config.variants);
        assert_eq!(loaded.poll_interval_secs, 120);
    }

    #[test]
    fn variant_selectors_deserialize_kebab_case() {
        let config: UpdaterConfig = toml::from_str(
            r#"variants = ["primary", "compatibility-backport", "legacy-compatibility"]"#,
        )
        .unwrap();
        assert_eq!(config.variants.len(), 3);
    }

    #[test]
    fn empty_variants_rejected() {
        let config = UpdaterConfig {
            variants: Vec::new(),
            ..UpdaterConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn duplicate_variants_rejected() {
        let config = UpdaterConfig {
            variants: vec![ArtifactVariant::Primary, ArtifactVariant::Primary],
            ..UpdaterConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn zero_interval_rejected() {
        let config = UpdaterConfig {
            poll_interval_secs: 0,
            ..UpdaterConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }
}
