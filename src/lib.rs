//! artifact-sync keeps an installed CI build artifact current.
//!
//! The daemon polls a CI server's last-build endpoint on a fixed interval,
//! compares the reported artifact name against the file already installed,
//! and on a change downloads the new build, swaps it into place atomically
//! and asks the supervisor for a restart.
//!
//! The crate is organised around:
//! - [`UpdatePoller`] - one fetch/compare/install cycle per invocation
//! - [`RunningService`] - the host loop that schedules cycles, runs the
//!   restart countdown and cleans up deferred deletions at shutdown
//! - [`ArtifactVariant`] - the closed set of artifact families tracked

pub mod config;
pub mod error;
pub mod event;
pub mod poller;
pub mod service;
pub mod source;

pub use config::UpdaterConfig;
pub use error::{Error, Result};
pub use event::{UpdaterEvent, UpdaterEventsChannel, UpdaterEventsSender};
pub use poller::{CycleOutcome, UpdatePoller};
pub use service::{RunningService, ServiceBuilder, ServiceOutcome, RESTART_EXIT_CODE};
pub use source::{ArtifactSource, ArtifactVariant};
