//! The recurring check-and-install cycle.
//!
//! One [`UpdatePoller`] exists per tracked variant. Each invocation of
//! [`UpdatePoller::run_cycle`] performs exactly one poll: fetch the
//! last-build metadata, compare the reported artifact name against the
//! installed file, and download and swap the artifact when they differ.
//! Scheduling between cycles belongs to the service, not the poller.

pub mod install;
pub mod metadata;

use crate::error::{Error, Result};
use crate::event::{UpdaterEvent, UpdaterEventsSender};
use crate::source::{ArtifactSource, ArtifactVariant};
use install::DeferredDeletes;
use metadata::{BuildInfo, BROWSER_USER_AGENT};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The reported build matches the installed artifact; nothing was done.
    UpToDate,
    /// A new build was downloaded and moved into place.
    Installed {
        /// File name of the newly installed artifact.
        file_name: String,
    },
}

/// Polls one artifact family and installs new builds.
pub struct UpdatePoller {
    variant: ArtifactVariant,
    source: ArtifactSource,
    client: reqwest::Client,
    install_dir: PathBuf,
    installed: Option<PathBuf>,
    deferred: DeferredDeletes,
    events: UpdaterEventsSender,
}

impl UpdatePoller {
    /// Create a poller against the variant's fixed production source.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the HTTP client cannot be
    /// constructed.
    pub fn new(
        variant: ArtifactVariant,
        install_dir: PathBuf,
        installed: Option<PathBuf>,
        http_timeout: Duration,
        events: UpdaterEventsSender,
        deferred: DeferredDeletes,
    ) -> Result<Self> {
        let source = ArtifactSource::for_variant(variant);
        Self::with_source(
            variant,
            source,
            install_dir,
            installed,
            http_timeout,
            events,
            deferred,
        )
    }

    /// Create a poller against an explicit source.
    ///
    /// Used by tests to point the poller at a mock CI server.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] if the HTTP client cannot be
    /// constructed.
    pub fn with_source(
        variant: ArtifactVariant,
        source: ArtifactSource,
        install_dir: PathBuf,
        installed: Option<PathBuf>,
        http_timeout: Duration,
        events: UpdaterEventsSender,
        deferred: DeferredDeletes,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(http_timeout)
            .build()
            .map_err(|e| Error::InvalidConfiguration(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            variant,
            source,
            client,
            install_dir,
            installed,
            deferred,
            events,
        })
    }

    /// The variant this poller tracks.
    #[must_use]
    pub const fn variant(&self) -> ArtifactVariant {
        self.variant
    }

    /// Path of the currently installed artifact, if any.
    #[must_use]
    pub fn installed_file(&self) -> Option<&Path> {
        self.installed.as_deref()
    }

    /// Run one poll cycle.
    ///
    /// Steps run strictly sequentially: fetch metadata, extract the first
    /// artifact, compare names, then download and swap when the names
    /// differ. On a successful install the superseded file is removed (or
    /// parked for deletion at shutdown) and `UpdateInstalled` plus
    /// `RestartRequested` events are emitted.
    ///
    /// # Errors
    ///
    /// All errors are cycle-scoped: the caller logs them and waits for the
    /// next scheduled cycle. No retry happens within a cycle.
    pub async fn run_cycle(&mut self) -> Result<CycleOutcome> {
        debug!(variant = %self.variant, "checking for updates");

        let body = self.fetch_metadata().await?;
        let build = BuildInfo::from_json(&body)?;

        if self.is_current(&build.file_name) {
            debug!(
                variant = %self.variant,
                file = %build.file_name,
                "installed artifact is current"
            );
            let _ = self.events.send(UpdaterEvent::UpToDate {
                variant: self.variant,
            });
            return Ok(CycleOutcome::UpToDate);
        }

        info!(variant = %self.variant, file = %build.file_name, "new build available");

        let url = self.source.download_url(&build.relative_path);
        let new_path =
            install::download_into(&self.client, &url, &self.install_dir, &build.file_name).await?;

        if let Some(old_path) = self.installed.replace(new_path.clone()) {
            install::remove_superseded(&old_path, &new_path, &self.deferred);
        }

        info!(
            variant = %self.variant,
            file = %build.file_name,
            "artifact installed, requesting restart"
        );
        let _ = self.events.send(UpdaterEvent::UpdateInstalled {
            variant: self.variant,
            file_name: build.file_name.clone(),
        });
        let _ = self.events.send(UpdaterEvent::RestartRequested {
            variant: self.variant,
        });

        Ok(CycleOutcome::Installed {
            file_name: build.file_name,
        })
    }

    async fn fetch_metadata(&self) -> Result<String> {
        let url = self.source.metadata_url(rand::random::<f64>());
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Fetch(e.to_string()))?;
        if !response.status().is_success() {
            return Err(Error::Fetch(format!(
                "CI server returned {}",
                response.status()
            )));
        }
        response.text().await.map_err(|e| Error::Fetch(e.to_string()))
    }

    /// Case-insensitive comparison of the reported file name against the
    /// installed one. Deliberately nothing more: no version ordering,
    /// timestamps, or content hashes.
    fn is_current(&self, file_name: &str) -> bool {
        self.installed
            .as_deref()
            .and_then(Path::file_name)
            .and_then(std::ffi::OsStr::to_str)
            .is_some_and(|current| current.eq_ignore_ascii_case(file_name))
    }
}
