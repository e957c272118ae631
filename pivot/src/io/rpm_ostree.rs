//! Deployment manager operations through `rpm-ostree`.

use std::path::Path;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, instrument};

use crate::core::origin::PIVOT_ORIGIN_DESCRIPTION;
use crate::core::types::{Deployment, RpmOstreeState};
use crate::io::fs::path_arg;
use crate::io::process::{Cmd, CommandRunner};

pub struct RpmOstree<'a, R: CommandRunner> {
    runner: &'a R,
}

impl<'a, R: CommandRunner> RpmOstree<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    /// The first deployment reported by `rpm-ostree status --json`.
    #[instrument(skip_all)]
    pub fn booted_deployment(&self) -> Result<Deployment> {
        let out = self
            .runner
            .run_captured(&Cmd::new("rpm-ostree").args(["status", "--json"]))?;
        let deployment = parse_status(&out)?;
        debug!(id = ?deployment.id, custom_origin = ?deployment.custom_origin, "current deployment");
        Ok(deployment)
    }

    /// Rebase onto `commit` in the local repository at `repo`, recording
    /// `origin_url` as the new deployment's custom origin.
    #[instrument(skip_all, fields(commit = %commit))]
    pub fn rebase(&self, repo: &Path, commit: &str, origin_url: &str) -> Result<()> {
        self.runner.run(
            &Cmd::new("rpm-ostree")
                .args(["rebase", "--experimental"])
                .arg(format!("{}:{commit}", path_arg(repo)))
                .args(["--custom-origin-url", origin_url])
                .args(["--custom-origin-description", PIVOT_ORIGIN_DESCRIPTION]),
        )
    }

    pub fn kargs_append(&self, karg: &str) -> Result<()> {
        self.runner
            .run(&Cmd::new("rpm-ostree").arg("kargs").arg(format!("--append={karg}")))
    }

    pub fn kargs_delete(&self, karg: &str) -> Result<()> {
        self.runner
            .run(&Cmd::new("rpm-ostree").arg("kargs").arg(format!("--delete={karg}")))
    }
}

/// Decode `rpm-ostree status --json` and return its first deployment.
pub fn parse_status(json: &str) -> Result<Deployment> {
    let state: RpmOstreeState = serde_json::from_str(json)
        .context("failed to parse `rpm-ostree status --json` output")?;
    state
        .deployments
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("not currently booted in a deployment"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_deployment_is_returned() {
        let json = r#"{"deployments": [
            {"id": "a", "booted": true, "custom-origin": ["pivot://quay.io/a/b@sha256:00"]},
            {"id": "b", "booted": false}
        ]}"#;
        let deployment = parse_status(json).expect("parse");
        assert_eq!(deployment.id.as_deref(), Some("a"));
        assert!(deployment.booted);
    }

    #[test]
    fn zero_deployments_is_an_error() {
        let err = parse_status(r#"{"deployments": []}"#).unwrap_err();
        assert_eq!(err.to_string(), "not currently booted in a deployment");
    }

    #[test]
    fn garbage_is_an_error() {
        let err = parse_status("not json").unwrap_err();
        assert!(err.to_string().contains("rpm-ostree status --json"));
    }
}
