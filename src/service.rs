//! Updater service - owns the polling loops and the restart countdown.
//!
//! The service plays the host role around the pollers: it schedules cycles,
//! tracks the install directory, discovers the artifact already on disk at
//! startup, reacts to restart requests, and makes the final best-effort pass
//! over deferred deletions on the way out.

use crate::config::UpdaterConfig;
use crate::error::Result;
use crate::event::{
    create_event_channel, UpdaterEvent, UpdaterEventsChannel, UpdaterEventsSender,
};
use crate::poller::install::DeferredDeletes;
use crate::poller::{CycleOutcome, UpdatePoller};
use crate::source::ArtifactVariant;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{info, warn};

/// Exit code the binary uses when the service stopped to apply an update.
///
/// A supervisor maps this to "restart the process" (e.g. systemd
/// `RestartForceExitStatus=75`).
pub const RESTART_EXIT_CODE: i32 = 75;

/// Why the service stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServiceOutcome {
    /// Plain shutdown (signal or explicit request).
    Shutdown,
    /// An update was installed and the restart countdown elapsed.
    RestartRequested,
}

/// Builder for constructing the updater service.
pub struct ServiceBuilder {
    config: UpdaterConfig,
}

impl ServiceBuilder {
    /// Create a new service builder with the given configuration.
    #[must_use]
    pub const fn new(config: UpdaterConfig) -> Self {
        Self { config }
    }

    /// Build the service.
    ///
    /// Discovers any artifact already present in the install directory and
    /// constructs one poller per configured variant.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the install
    /// directory cannot be created, or a poller fails to construct.
    pub fn build(self) -> Result<RunningService> {
        self.config.validate()?;
        std::fs::create_dir_all(&self.config.install_dir)?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = create_event_channel();
        let deferred = DeferredDeletes::new();

        let http_timeout = Duration::from_secs(self.config.http_timeout_secs);
        let mut pollers = Vec::with_capacity(self.config.variants.len());
        for &variant in &self.config.variants {
            let installed = discover_installed(&self.config.install_dir, variant)?;
            match &installed {
                Some(path) => info!(
                    variant = %variant,
                    file = %path.display(),
                    "found installed artifact"
                ),
                None => info!(variant = %variant, "no installed artifact yet"),
            }
            pollers.push(UpdatePoller::new(
                variant,
                self.config.install_dir.clone(),
                installed,
                http_timeout,
                events_tx.clone(),
                deferred.clone(),
            )?);
        }

        Ok(RunningService {
            config: self.config,
            shutdown_tx,
            shutdown_rx,
            events_tx,
            events_rx: Some(events_rx),
            pollers: Some(pollers),
            deferred,
        })
    }
}

/// A running updater service.
pub struct RunningService {
    config: UpdaterConfig,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    events_tx: UpdaterEventsSender,
    events_rx: Option<UpdaterEventsChannel>,
    pollers: Option<Vec<UpdatePoller>>,
    deferred: DeferredDeletes,
}

impl RunningService {
    /// The directory artifacts are installed into.
    #[must_use]
    pub fn install_dir(&self) -> &Path {
        &self.config.install_dir
    }

    /// Get a receiver for updater events.
    ///
    /// Note: Can only be called once. Subsequent calls return None.
    pub fn events(&mut self) -> Option<UpdaterEventsChannel> {
        self.events_rx.take()
    }

    /// Subscribe to updater events.
    #[must_use]
    pub fn subscribe_events(&self) -> UpdaterEventsChannel {
        self.events_tx.subscribe()
    }

    /// Run the service until shutdown or a completed restart countdown.
    ///
    /// Spawns one polling loop per variant. Each loop runs a cycle, then
    /// sleeps the poll interval - exactly one reschedule per cycle, with the
    /// shutdown signal as the only suppressor. Cycle errors are logged and
    /// swallowed here; they never stop the loop.
    ///
    /// # Errors
    ///
    /// Currently infallible at runtime; the `Result` mirrors construction
    /// errors surfacing from future host integrations.
    pub async fn run(&mut self) -> Result<ServiceOutcome> {
        info!("Starting artifact-sync");
        let _ = self.events_tx.send(UpdaterEvent::Started);

        // Subscribe before the loops start so no event is missed.
        let mut events_rx = self.events_tx.subscribe();

        let poll_interval = Duration::from_secs(self.config.poll_interval_secs);
        let mut handles = Vec::new();
        for mut poller in self.pollers.take().unwrap_or_default() {
            let events_tx = self.events_tx.clone();
            let mut shutdown_rx = self.shutdown_rx.clone();
            handles.push(tokio::spawn(async move {
                loop {
                    run_one_cycle(&mut poller, &events_tx).await;
                    tokio::select! {
                        _ = shutdown_rx.changed() => {
                            if *shutdown_rx.borrow() {
                                break;
                            }
                        }
                        () = tokio::time::sleep(poll_interval) => {}
                    }
                }
            }));
        }

        let mut outcome = ServiceOutcome::Shutdown;
        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, initiating shutdown");
                    self.shutdown();
                    break;
                }
                event = events_rx.recv() => {
                    match event {
                        Ok(UpdaterEvent::RestartRequested { variant }) => {
                            info!(
                                variant = %variant,
                                delay_secs = self.config.restart_delay_secs,
                                "restart requested, starting countdown"
                            );
                            if self.restart_countdown().await {
                                outcome = ServiceOutcome::RestartRequested;
                            }
                            self.shutdown();
                            break;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "event receiver lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            }
        }

        let _ = self.events_tx.send(UpdaterEvent::ShuttingDown);

        // Let in-flight cycles finish before the final cleanup pass.
        for handle in handles {
            let _ = handle.await;
        }
        self.deferred.drain();

        info!("Updater shutdown complete");
        Ok(outcome)
    }

    /// Request the service to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    /// Wait out the restart delay.
    ///
    /// Returns `false` if a shutdown request arrived before the countdown
    /// elapsed.
    async fn restart_countdown(&mut self) -> bool {
        let delay = Duration::from_secs(self.config.restart_delay_secs);
        tokio::select! {
            _ = self.shutdown_rx.changed() => false,
            () = tokio::time::sleep(delay) => true,
        }
    }
}

async fn run_one_cycle(poller: &mut UpdatePoller, events: &UpdaterEventsSender) {
    let variant = poller.variant();
    match poller.run_cycle().await {
        Ok(CycleOutcome::Installed { file_name }) => {
            info!(variant = %variant, file = %file_name, "update installed");
        }
        Ok(CycleOutcome::UpToDate) => {}
        Err(e) => {
            warn!(variant = %variant, error = %e, "update check failed");
            let _ = events.send(UpdaterEvent::CheckFailed {
                variant,
                message: e.to_string(),
            });
        }
    }
}

/// Locate the variant's installed artifact, if one is already on disk.
///
/// The artifact's file name always begins with the variant's job name, so a
/// case-insensitive prefix scan of the install directory finds it. After the
/// first successful install there is at most one such file per variant.
fn discover_installed(install_dir: &Path, variant: ArtifactVariant) -> Result<Option<PathBuf>> {
    let entries = match std::fs::read_dir(install_dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let prefix = variant.job_name().to_ascii_lowercase();
    for entry in entries {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if name.to_ascii_lowercase().starts_with(&prefix) {
            return Ok(Some(entry.path()));
        }
    }
    Ok(None)
}
