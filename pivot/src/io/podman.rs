//! Container runtime operations through `podman`.
//!
//! The helper container is never started; it exists only so `podman mount`
//! can expose the image filesystem.

use std::path::PathBuf;

use anyhow::{Result, anyhow};
use tracing::instrument;

use crate::io::process::{Cmd, CommandRunner, Output};
use crate::io::registry::RegistryAccess;

/// Fixed name of the helper container. Only one pivot may run per host.
pub const HELPER_CONTAINER: &str = "ostree-container-pivot";

pub struct Podman<'a, R: CommandRunner> {
    runner: &'a R,
}

impl<'a, R: CommandRunner> Podman<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    /// Pull `image`. Retried per `access.retry`.
    #[instrument(skip_all, fields(image = %image))]
    pub fn pull(&self, image: &str, access: &RegistryAccess) -> Result<()> {
        let cmd = Cmd::new("podman")
            .arg("pull")
            .args(access.auth_args())
            .arg(image)
            .timeout(access.timeout);
        self.runner
            .run_with_retry(&access.retry, Output::Inherit, &cmd)?;
        Ok(())
    }

    /// Create a stopped container with networking disabled; returns its id.
    pub fn create(&self, image: &str, name: &str) -> Result<String> {
        let id = self.runner.run_captured(
            &Cmd::new("podman").args(["create", "--net=none", "--name", name, image]),
        )?;
        if id.is_empty() {
            return Err(anyhow!("podman create returned no container id"));
        }
        Ok(id)
    }

    /// Mount the container filesystem and return the mount point.
    pub fn mount(&self, container: &str) -> Result<PathBuf> {
        let path = self
            .runner
            .run_captured(&Cmd::new("podman").args(["mount", container]))?;
        if path.is_empty() {
            return Err(anyhow!("podman mount returned no path for {container}"));
        }
        Ok(PathBuf::from(path))
    }

    /// Kill and remove a container. Best-effort: it may already be gone.
    pub fn remove_container(&self, container: &str) {
        self.runner
            .run_ignoring_errors(&Cmd::new("podman").args(["kill", container]));
        self.runner
            .run_ignoring_errors(&Cmd::new("podman").args(["rm", "-f", container]));
    }

    /// Remove a locally stored image. Best-effort.
    pub fn remove_image(&self, image: &str) {
        self.runner
            .run_ignoring_errors(&Cmd::new("podman").args(["rmi", image]));
    }
}
