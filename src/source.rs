//! Fixed artifact sources for the supported deployment variants.
//!
//! Exactly three variants exist; each resolves to a pair of URL templates on
//! the upstream CI server at construction time and is never mutated
//! afterwards. Unknown selectors are a fatal construction-time error.

use crate::error::{Error, Result};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Root of the upstream CI server hosting all three artifact families.
const CI_ROOT: &str = "https://ci.viaversion.com";

/// Characters escaped when substituting an artifact's relative path into a
/// download URL. `/` is deliberately not escaped: relative paths are nested
/// (`build/libs/Foo.jar`) and the separators must survive intact.
const PATH_ESCAPE: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'<')
    .add(b'>')
    .add(b'`')
    .add(b'#')
    .add(b'?')
    .add(b'{')
    .add(b'}');

/// Deployment variant tracked by the updater.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ArtifactVariant {
    /// Primary deployment artifact.
    #[default]
    Primary,
    /// Backport artifact serving older downstream clients.
    CompatibilityBackport,
    /// Artifact covering legacy client compatibility.
    LegacyCompatibility,
}

impl ArtifactVariant {
    /// Resolve a selector string into a variant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidConfiguration`] for anything outside the
    /// closed set `primary`, `compatibility-backport`,
    /// `legacy-compatibility`.
    pub fn from_selector(selector: &str) -> Result<Self> {
        match selector {
            "primary" => Ok(Self::Primary),
            "compatibility-backport" => Ok(Self::CompatibilityBackport),
            "legacy-compatibility" => Ok(Self::LegacyCompatibility),
            other => Err(Error::InvalidConfiguration(format!(
                "unknown variant selector '{other}'"
            ))),
        }
    }

    /// The selector string for this variant.
    #[must_use]
    pub const fn selector(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::CompatibilityBackport => "compatibility-backport",
            Self::LegacyCompatibility => "legacy-compatibility",
        }
    }

    /// The CI job publishing this variant's artifacts.
    #[must_use]
    pub const fn job_name(self) -> &'static str {
        match self {
            Self::Primary => "ViaVersion",
            Self::CompatibilityBackport => "ViaBackwards",
            Self::LegacyCompatibility => "ViaRewind",
        }
    }
}

impl fmt::Display for ArtifactVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.selector())
    }
}

impl std::str::FromStr for ArtifactVariant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_selector(s)
    }
}

/// URL templates for one artifact family.
///
/// Holds the last-build metadata endpoint and the artifact download root for
/// a single CI job. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSource {
    last_build_url: String,
    artifact_base_url: String,
}

impl ArtifactSource {
    /// The fixed production source for a variant.
    #[must_use]
    pub fn for_variant(variant: ArtifactVariant) -> Self {
        Self::with_root(CI_ROOT, variant.job_name())
    }

    /// A source rooted at an arbitrary CI server.
    ///
    /// Production code goes through [`Self::for_variant`]; this constructor
    /// exists so tests can point the updater at a local mock server.
    #[must_use]
    pub fn with_root(root: &str, job: &str) -> Self {
        let root = root.trim_end_matches('/');
        Self {
            last_build_url: format!("{root}/job/{job}/lastBuild/api/json"),
            artifact_base_url: format!("{root}/job/{job}/lastBuild/artifact"),
        }
    }

    /// Build the metadata URL with a fresh cache-busting nonce.
    ///
    /// The upstream server sits behind caches that would otherwise serve a
    /// stale last-build document; the random query parameter defeats them.
    #[must_use]
    pub fn metadata_url(&self, nonce: f64) -> String {
        format!("{}?random={nonce}", self.last_build_url)
    }

    /// Build the download URL for an artifact's relative path.
    ///
    /// The path is percent-escaped per standard rules, keeping `/` so nested
    /// artifact paths stay nested.
    #[must_use]
    pub fn download_url(&self, relative_path: &str) -> String {
        format!(
            "{}/{}",
            self.artifact_base_url,
            utf8_percent_encode(relative_path, PATH_ESCAPE)
        )
    }
}
