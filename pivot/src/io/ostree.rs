//! Read-only queries against an OSTree repository.

use std::path::Path;

use anyhow::{Result, anyhow};

use crate::io::fs::path_arg;
use crate::io::process::{Cmd, CommandRunner};

pub struct Ostree<'a, R: CommandRunner> {
    runner: &'a R,
}

impl<'a, R: CommandRunner> Ostree<'a, R> {
    pub fn new(runner: &'a R) -> Self {
        Self { runner }
    }

    /// List refs in `repo`, in the order `ostree refs` prints them.
    pub fn refs(&self, repo: &Path) -> Result<Vec<String>> {
        let out = self
            .runner
            .run_captured(&Cmd::new("ostree").args(["refs", "--repo"]).arg(path_arg(repo)))?;
        Ok(parse_refs(&out))
    }

    /// Resolve `refspec` to a commit checksum.
    pub fn rev_parse(&self, repo: &Path, refspec: &str) -> Result<String> {
        let commit = self.runner.run_captured(
            &Cmd::new("ostree")
                .args(["rev-parse", "--repo"])
                .arg(path_arg(repo))
                .arg(refspec),
        )?;
        if commit.is_empty() {
            return Err(anyhow!("ostree rev-parse returned nothing for {refspec}"));
        }
        Ok(commit)
    }
}

fn parse_refs(out: &str) -> Vec<String> {
    out.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
