//! Kernel argument tuning: read the directive file, plan, apply.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument, warn};

use crate::core::tuning::{KargMatch, SkipReason, SkippedLine, needs_cmdline, plan_tuning};
use crate::core::types::TuningPlan;
use crate::io::config::PivotConfig;
use crate::io::process::CommandRunner;
use crate::io::rpm_ostree::RpmOstree;

/// Plan kernel argument changes from `tuning_path` against `cmdline_path`.
///
/// A missing tuning file is the normal "nothing to tune" case and yields an
/// empty plan. The command line is only read when some directive names a
/// whitelisted argument.
pub fn parse_tuning_file(
    tuning_path: &Path,
    cmdline_path: &Path,
    mode: KargMatch,
) -> Result<TuningPlan> {
    if !tuning_path.exists() {
        debug!(
            "no kernel tuning needed as {} does not exist",
            tuning_path.display()
        );
        return Ok(TuningPlan::default());
    }
    let contents = fs::read_to_string(tuning_path)
        .with_context(|| format!("unable to read {}", tuning_path.display()))?;
    let cmdline = if needs_cmdline(&contents) {
        fs::read_to_string(cmdline_path)
            .with_context(|| format!("unable to read {}", cmdline_path.display()))?
    } else {
        String::new()
    };

    let report = plan_tuning(&contents, &cmdline, mode);
    for skipped in &report.skipped {
        log_skipped(tuning_path, skipped);
    }
    Ok(report.plan)
}

/// Apply `plan` through `rpm-ostree kargs`. Returns true if anything ran.
#[instrument(skip_all, fields(additions = plan.additions.len(), deletions = plan.deletions.len()))]
pub fn apply_tuning_plan<R: CommandRunner>(runner: &R, plan: &TuningPlan) -> Result<bool> {
    let rpm_ostree = RpmOstree::new(runner);
    let mut changed = false;

    for arg in &plan.additions {
        if !arg.is_bare() {
            warn!("not adding {}: key=value arguments are not supported", arg.as_karg());
            continue;
        }
        rpm_ostree.kargs_append(&arg.key)?;
        changed = true;
    }
    for arg in &plan.deletions {
        if !arg.is_bare() {
            warn!("not deleting {}: key=value arguments are not supported", arg.as_karg());
            continue;
        }
        rpm_ostree.kargs_delete(&arg.key)?;
        changed = true;
    }
    Ok(changed)
}

/// Plan and apply using the configured paths.
///
/// A plan that cannot be computed is logged and treated as "nothing to tune".
/// A failing `rpm-ostree kargs` is an error.
pub fn update_tuning_args<R: CommandRunner>(runner: &R, config: &PivotConfig) -> Result<bool> {
    let plan = match parse_tuning_file(
        &config.paths.tuning_file,
        &config.paths.cmdline_file,
        config.kargs.match_mode,
    ) {
        Ok(plan) => plan,
        Err(err) => {
            warn!("unable to plan kernel argument tuning: {err:#}");
            return Ok(false);
        }
    };
    apply_tuning_plan(runner, &plan).context("failed to update kernel arguments")
}

fn log_skipped(tuning_path: &Path, skipped: &SkippedLine) {
    let line = skipped.line.trim();
    match skipped.reason {
        SkipReason::Malformed => {
            debug!("skipping malformed line in {}: {:?}", tuning_path.display(), skipped.line);
        }
        SkipReason::NotWhitelisted => info!("{line} not a whitelisted kernel argument"),
        SkipReason::AlreadyPresent => info!("skipping {line:?} as it is already in use"),
        SkipReason::NotPresent => {
            info!("skipping {line:?} as it is not present in the current argument list");
        }
    }
}
