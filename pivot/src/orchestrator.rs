//! One pivot run, from choosing the image to deciding whether to reboot.

use anyhow::{Context, Result, bail};
use tracing::{info, instrument};

use crate::exit_codes;
use crate::io::config::PivotConfig;
use crate::io::fs::{file_exists, read_trimmed, remove_file_if_present};
use crate::io::podman::Podman;
use crate::io::process::{Cmd, CommandRunner};
use crate::pivot::pull_and_rebase;
use crate::tuning::update_tuning_args;

/// Flags for a single run, built once from the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PivotOptions {
    /// Image pullspec. Read from the spool file when absent.
    pub image: Option<String>,
    /// Keep the pulled image in local container storage.
    pub keep: bool,
    /// Reboot whenever the host changed.
    pub reboot: bool,
    /// Exit with [`exit_codes::UNCHANGED`] when there was nothing to do.
    pub unchanged_exit_77: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Unchanged,
    /// The host changed. `rebooted` is set when a reboot was requested.
    Changed { rebooted: bool },
}

/// Where the pullspec came from.
enum ImageSource {
    Argument,
    SpoolFile,
}

/// Run the full pivot: rebase, clean up, tune kernel arguments, maybe reboot.
#[instrument(skip_all)]
pub fn execute<R: CommandRunner>(
    runner: &R,
    options: &PivotOptions,
    config: &PivotConfig,
) -> Result<Outcome> {
    let (image, source) = resolve_image(options, config)?;

    let result = pull_and_rebase(runner, config, &image)?;

    if matches!(source, ImageSource::SpoolFile) {
        remove_file_if_present(&config.paths.spool_file)?;
    }

    if !options.keep {
        Podman::new(runner).remove_image(&result.image_id);
    }

    let tuned = update_tuning_args(runner, config)?;

    if !result.changed && !tuned {
        info!("Already at target pivot; exiting...");
        return Ok(Outcome::Unchanged);
    }

    let reboot = options.reboot || file_exists(&config.paths.reboot_marker);
    if reboot {
        runner
            .run(&Cmd::new("systemctl").arg("reboot"))
            .context("failed to reboot")?;
    }
    Ok(Outcome::Changed { rebooted: reboot })
}

/// Process exit code for a finished run.
pub fn exit_code(outcome: Outcome, options: &PivotOptions) -> i32 {
    match outcome {
        Outcome::Unchanged if options.unchanged_exit_77 => exit_codes::UNCHANGED,
        _ => exit_codes::OK,
    }
}

fn resolve_image(options: &PivotOptions, config: &PivotConfig) -> Result<(String, ImageSource)> {
    if let Some(image) = &options.image {
        return Ok((image.clone(), ImageSource::Argument));
    }
    let spool = &config.paths.spool_file;
    let image = read_trimmed(spool)?;
    if image.is_empty() {
        bail!("no image pullspec in {}", spool.display());
    }
    Ok((image, ImageSource::SpoolFile))
}
