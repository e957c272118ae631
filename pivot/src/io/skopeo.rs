//! Image inspection through `skopeo`.

use anyhow::{Context, Result};
use tracing::{debug, instrument};

use crate::core::types::ImageInspection;
use crate::io::process::{Cmd, CommandRunner, Output};
use crate::io::registry::RegistryAccess;

/// Inspect `reference` in its registry. Retried per `access.retry`.
#[instrument(skip_all, fields(reference = %reference))]
pub fn inspect<R: CommandRunner>(
    runner: &R,
    access: &RegistryAccess,
    reference: &str,
) -> Result<ImageInspection> {
    let cmd = Cmd::new("skopeo")
        .arg("inspect")
        .args(access.auth_args())
        .arg(format!("docker://{reference}"))
        .timeout(access.timeout);
    let output = runner.run_with_retry(&access.retry, Output::Capture, &cmd)?;
    let inspection = parse_inspection(&output)
        .with_context(|| format!("failed to parse `skopeo inspect` output for {reference}"))?;
    debug!(name = %inspection.name, digest = %inspection.digest, "image inspected");
    Ok(inspection)
}

pub fn parse_inspection(json: &str) -> Result<ImageInspection> {
    Ok(serde_json::from_str(json)?)
}
