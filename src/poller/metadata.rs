//! Last-build metadata extraction.
//!
//! The CI server's last-build endpoint returns a large JSON document; only
//! the first entry of its `artifacts` list is of interest here.

use crate::error::{Error, Result};
use serde::Deserialize;

/// Browser-identifying `User-Agent` sent on every request. The upstream CI
/// server rejects default HTTP client identifiers.
pub(crate) const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_1) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/79.0.3945.79 Safari/537.36";

/// The artifact fields read from a last-build document.
///
/// Created once per poll cycle and discarded after use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildInfo {
    /// File name of the newest build artifact.
    pub file_name: String,
    /// Path of the artifact relative to the build's artifact root.
    pub relative_path: String,
}

#[derive(Debug, Deserialize)]
struct LastBuild {
    #[serde(default)]
    artifacts: Vec<ArtifactEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ArtifactEntry {
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    relative_path: Option<String>,
}

impl BuildInfo {
    /// Extract build info from a last-build JSON document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the body is not valid JSON, and
    /// [`Error::MalformedResponse`] if the document carries no artifacts or
    /// the first artifact is missing `fileName`/`relativePath`.
    pub fn from_json(body: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(body)?;
        let doc: LastBuild = serde_json::from_value(value)
            .map_err(|e| Error::MalformedResponse(e.to_string()))?;

        let first = doc
            .artifacts
            .into_iter()
            .next()
            .ok_or_else(|| Error::MalformedResponse("no artifacts in last-build document".into()))?;

        let file_name = first
            .file_name
            .ok_or_else(|| Error::MalformedResponse("artifact entry missing fileName".into()))?;
        let relative_path = first
            .relative_path
            .ok_or_else(|| Error::MalformedResponse("artifact entry missing relativePath".into()))?;

        Ok(Self {
            file_name,
            relative_path,
        })
    }
}
