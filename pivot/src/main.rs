//! `pivot`: rebase an OSTree host onto the commit shipped in a container image.
//!
//! Reads the image pullspec from the command line or from the spool file,
//! rebases when the image differs from the last pivot, applies kernel argument
//! tuning, and optionally reboots.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use pivot::exit_codes;
use pivot::io::config::{DEFAULT_CONFIG_PATH, load_config};
use pivot::io::process::SystemRunner;
use pivot::logging;
use pivot::orchestrator::{PivotOptions, execute, exit_code};

#[derive(Parser)]
#[command(
    name = "pivot",
    version,
    about = "Allows moving from one OSTree deployment to another",
    override_usage = "pivot [FLAGS] [IMAGE_PULLSPEC]"
)]
struct Cli {
    /// Image to pivot to. Defaults to the contents of the spool file.
    #[arg(value_name = "IMAGE_PULLSPEC")]
    image: Option<String>,
    /// Do not remove the container image after pivoting.
    #[arg(short, long)]
    keep: bool,
    /// Reboot if the host changed.
    #[arg(short, long)]
    reboot: bool,
    /// Exit with code 77 if no changes were made.
    #[arg(long = "unchanged-exit-77")]
    unchanged_exit_77: bool,
    /// Path to the pivot configuration file.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

impl Cli {
    fn options(&self) -> PivotOptions {
        PivotOptions {
            image: self.image.clone(),
            keep: self.keep,
            reboot: self.reboot,
            unchanged_exit_77: self.unchanged_exit_77,
        }
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::FAILED);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)
        .with_context(|| format!("load config {}", cli.config.display()))?;
    let options = cli.options();
    let outcome = execute(&SystemRunner, &options, &config)?;
    Ok(exit_code(outcome, &options))
}
