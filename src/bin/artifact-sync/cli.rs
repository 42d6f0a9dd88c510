//! Command-line interface definition.

use artifact_sync::config::UpdaterConfig;
use artifact_sync::source::ArtifactVariant;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Daemon that keeps installed CI build artifacts current.
#[derive(Parser, Debug)]
#[command(name = "artifact-sync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directory artifacts are installed into.
    #[arg(long, env = "ARTIFACT_SYNC_INSTALL_DIR")]
    pub install_dir: Option<PathBuf>,

    /// Variants to keep current (repeat or comma-separate for several).
    #[arg(
        long = "variant",
        value_enum,
        env = "ARTIFACT_SYNC_VARIANTS",
        value_delimiter = ','
    )]
    pub variants: Vec<CliVariant>,

    /// Seconds between poll cycles.
    #[arg(long, env = "ARTIFACT_SYNC_POLL_INTERVAL")]
    pub poll_interval_secs: Option<u64>,

    /// HTTP timeout in seconds for metadata and download requests.
    #[arg(long, env = "ARTIFACT_SYNC_HTTP_TIMEOUT")]
    pub http_timeout_secs: Option<u64>,

    /// Seconds between a detected update and the restart taking effect.
    #[arg(long, env = "ARTIFACT_SYNC_RESTART_DELAY")]
    pub restart_delay_secs: Option<u64>,

    /// Log level.
    #[arg(long, default_value = "info", env = "RUST_LOG")]
    pub log_level: String,

    /// Path to configuration file.
    #[arg(long, short)]
    pub config: Option<PathBuf>,
}

/// Variant CLI enum.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum CliVariant {
    /// Primary deployment artifact.
    Primary,
    /// Backport artifact serving older downstream clients.
    CompatibilityBackport,
    /// Artifact covering legacy client compatibility.
    LegacyCompatibility,
}

impl Cli {
    /// Convert CLI arguments into an `UpdaterConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file is specified but cannot be loaded.
    pub fn into_config(self) -> color_eyre::Result<UpdaterConfig> {
        // Start with default config or load from file
        let mut config = if let Some(ref path) = self.config {
            UpdaterConfig::from_file(path)?
        } else {
            UpdaterConfig::default()
        };

        // Override with CLI arguments
        if let Some(install_dir) = self.install_dir {
            config.install_dir = install_dir;
        }
        if !self.variants.is_empty() {
            config.variants = self.variants.into_iter().map(Into::into).collect();
        }
        if let Some(secs) = self.poll_interval_secs {
            config.poll_interval_secs = secs;
        }
        if let Some(secs) = self.http_timeout_secs {
            config.http_timeout_secs = secs;
        }
        if let Some(secs) = self.restart_delay_secs {
            config.restart_delay_secs = secs;
        }
        config.log_level = self.log_level;

        Ok(config)
    }
}

impl From<CliVariant> for ArtifactVariant {
    fn from(v: CliVariant) -> Self {
        match v {
            CliVariant::Primary => Self::Primary,
            CliVariant::CompatibilityBackport => Self::CompatibilityBackport,
            CliVariant::LegacyCompatibility => Self::LegacyCompatibility,
        }
    }
}
