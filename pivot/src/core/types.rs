//! Shared deterministic types for the pivot engine.
//!
//! The decode types mirror the JSON emitted by `skopeo inspect` and
//! `rpm-ostree status --json`. Only the fields the engine reads are modelled;
//! everything else in those documents is ignored.

use std::collections::HashMap;

use serde::{Deserialize, Deserializer};

/// Image label carrying the OSTree commit checksum embedded in the image.
pub const OSTREE_COMMIT_LABEL: &str = "com.coreos.ostree-commit";
/// Optional human-readable version label, used for logging only.
pub const VERSION_LABEL: &str = "version";

/// Result of `skopeo inspect docker://<ref>`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ImageInspection {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tag: Option<String>,
    pub digest: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub repo_tags: Vec<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub docker_version: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub layers: Vec<String>,
}

impl ImageInspection {
    /// Canonical `name@digest` id for the inspected image.
    pub fn image_id(&self) -> String {
        format!("{}@{}", self.name, self.digest)
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }
}

/// Top-level document of `rpm-ostree status --json`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RpmOstreeState {
    pub deployments: Vec<Deployment>,
}

/// One deployment record. The first entry of `custom_origin` is the origin URL.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Deployment {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub osname: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub booted: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub custom_origin: Vec<String>,
}

/// A kernel boot argument named by a tuning directive.
///
/// Only bare arguments (`value == None`) are applied; `key=value` arguments are
/// recognized but left alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TuneArgument {
    pub key: String,
    pub value: Option<String>,
}

impl TuneArgument {
    pub fn bare(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: None,
        }
    }

    pub fn is_bare(&self) -> bool {
        self.value.is_none()
    }

    /// Render as it appears on the kernel command line.
    pub fn as_karg(&self) -> String {
        match &self.value {
            Some(value) => format!("{}={}", self.key, value),
            None => self.key.clone(),
        }
    }
}

/// Kernel argument changes still needed on this host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TuningPlan {
    pub additions: Vec<TuneArgument>,
    pub deletions: Vec<TuneArgument>,
}

impl TuningPlan {
    pub fn is_empty(&self) -> bool {
        self.additions.is_empty() && self.deletions.is_empty()
    }
}

/// Outcome of one pivot workflow run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PivotResult {
    /// Resolved `name@digest` of the target image.
    pub image_id: String,
    /// True when a rebase was performed.
    pub changed: bool,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
