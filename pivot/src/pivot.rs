//! Pull an OS container image and rebase the host onto the OSTree commit it
//! carries.
//!
//! The flow is:
//! 1. Read the booted deployment's custom origin to find the previous pivot.
//! 2. Resolve the requested reference to `name@digest` with `skopeo inspect`.
//! 3. If it matches the previous pivot, stop: nothing to do.
//! 4. Otherwise pull the image, mount it through a helper container, pick the
//!    commit from its labels or its embedded repository, and `rpm-ostree rebase`.
//!
//! The helper container is always removed once it has been created, whether
//! or not the rebase succeeded.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, instrument};

use crate::core::commit::{commit_from_labels, select_single_ref};
use crate::core::origin::{custom_origin_url, previous_pivot};
use crate::core::reference::same_image;
use crate::core::types::{ImageInspection, OSTREE_COMMIT_LABEL, PivotResult};
use crate::io::config::PivotConfig;
use crate::io::ostree::Ostree;
use crate::io::podman::{HELPER_CONTAINER, Podman};
use crate::io::process::CommandRunner;
use crate::io::registry::RegistryAccess;
use crate::io::rpm_ostree::RpmOstree;
use crate::io::skopeo;

/// Path of the OSTree repository inside an OS container image.
pub const IMAGE_REPO_SUBDIR: &str = "srv/repo";

/// Bring the host to `reference`, or report that it is already there.
#[instrument(skip_all, fields(reference = %reference))]
pub fn pull_and_rebase<R: CommandRunner>(
    runner: &R,
    config: &PivotConfig,
    reference: &str,
) -> Result<PivotResult> {
    let rpm_ostree = RpmOstree::new(runner);
    let booted = rpm_ostree.booted_deployment()?;
    let previous = previous_pivot(&booted);
    if let Some(previous) = previous {
        info!("Previous pivot: {previous}");
    }

    let access = RegistryAccess::from_config(config);
    let inspection = skopeo::inspect(runner, &access, reference)?;
    let image_id = inspection.image_id();
    info!("Resolved to: {image_id}");

    if let Some(previous) = previous
        && same_image(previous, &image_id)?
    {
        return Ok(PivotResult {
            image_id,
            changed: false,
        });
    }

    let podman = Podman::new(runner);
    podman.pull(&image_id, &access)?;

    // A crashed earlier run may have left the helper behind.
    podman.remove_container(HELPER_CONTAINER);
    let container = podman.create(&image_id, HELPER_CONTAINER)?;
    let rebased = mount_and_rebase(runner, &container, &inspection, &image_id);
    podman.remove_container(HELPER_CONTAINER);
    rebased?;

    Ok(PivotResult {
        image_id,
        changed: true,
    })
}

fn mount_and_rebase<R: CommandRunner>(
    runner: &R,
    container: &str,
    inspection: &ImageInspection,
    image_id: &str,
) -> Result<()> {
    let mount = Podman::new(runner).mount(container)?;
    let repo = image_repo(&mount);
    let commit = determine_commit(runner, inspection, &repo)?;
    RpmOstree::new(runner)
        .rebase(&repo, &commit, &custom_origin_url(image_id))
        .with_context(|| format!("failed to rebase onto {commit}"))
}

/// The embedded repository under a mounted image root.
pub fn image_repo(mount: &Path) -> PathBuf {
    mount.join(IMAGE_REPO_SUBDIR)
}

/// Commit to rebase onto: the commit label when present, otherwise the
/// single ref of the embedded repository.
pub fn determine_commit<R: CommandRunner>(
    runner: &R,
    inspection: &ImageInspection,
    repo: &Path,
) -> Result<String> {
    if let Some(labelled) = commit_from_labels(inspection) {
        match labelled.version {
            Some(version) => info!("Pivoting to: {version} ({})", labelled.commit),
            None => info!("Pivoting to: {}", labelled.commit),
        }
        return Ok(labelled.commit.to_string());
    }

    info!("No {OSTREE_COMMIT_LABEL} label found in metadata! Inspecting...");
    let ostree = Ostree::new(runner);
    let refs = ostree.refs(repo)?;
    let refspec = select_single_ref(&refs)?;
    info!("Using ref {refspec}");
    ostree.rev_parse(repo, refspec)
}
