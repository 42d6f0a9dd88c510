//! Error types for artifact-sync.

use thiserror::Error;

/// Errors produced by the updater.
#[derive(Debug, Error)]
pub enum Error {
    /// The variant selector or another construction-time parameter was not
    /// recognised. Fatal: the service refuses to start.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The last-build metadata request failed (transport error or
    /// non-success status).
    #[error("metadata fetch failed: {0}")]
    Fetch(String),

    /// The metadata body was not valid JSON.
    #[error("metadata parse failed: {0}")]
    Parse(#[from] serde_json::Error),

    /// The metadata was valid JSON but did not carry the expected artifact
    /// fields.
    #[error("malformed metadata response: {0}")]
    MalformedResponse(String),

    /// The artifact download failed (transport error or non-success status).
    #[error("artifact download failed: {0}")]
    Download(String),

    /// The downloaded artifact could not be staged or moved into place.
    #[error("artifact install failed: {0}")]
    Install(String),

    /// Configuration file error.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for artifact-sync operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Whether the error is scoped to a single poll cycle.
    ///
    /// Cycle-scoped errors are logged and swallowed by the service loop; the
    /// next scheduled cycle is the only retry mechanism. Everything else is
    /// fatal at construction or startup time.
    #[must_use]
    pub const fn is_cycle_scoped(&self) -> bool {
        matches!(
            self,
            Self::Fetch(_)
                | Self::Parse(_)
                | Self::MalformedResponse(_)
                | Self::Download(_)
                | Self::Install(_)
                | Self::Io(_)
        )
    }
}
