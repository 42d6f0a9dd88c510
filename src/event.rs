//! Updater event system.

use crate::source::ArtifactVariant;
use tokio::sync::broadcast;

/// Events emitted by the updater service.
#[derive(Debug, Clone)]
pub enum UpdaterEvent {
    /// Service has started successfully.
    Started,

    /// Service is shutting down.
    ShuttingDown,

    /// A poll cycle found the installed artifact already current.
    UpToDate {
        /// Variant that was checked.
        variant: ArtifactVariant,
    },

    /// A new artifact was downloaded and moved into place.
    UpdateInstalled {
        /// Variant that was updated.
        variant: ArtifactVariant,
        /// File name of the newly installed artifact.
        file_name: String,
    },

    /// The host should begin its restart countdown to pick up an update.
    RestartRequested {
        /// Variant whose update triggered the request.
        variant: ArtifactVariant,
    },

    /// A poll cycle failed; the next scheduled cycle is the retry.
    CheckFailed {
        /// Variant whose check failed.
        variant: ArtifactVariant,
        /// Error message.
        message: String,
    },
}

/// Channel for receiving updater events.
pub type UpdaterEventsChannel = broadcast::Receiver<UpdaterEvent>;

/// Sender for updater events.
pub type UpdaterEventsSender = broadcast::Sender<UpdaterEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (UpdaterEventsSender, UpdaterEventsChannel) {
    broadcast::channel(256)
}
