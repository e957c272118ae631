//! Test-only helpers: a scripted command runner and a throwaway host layout.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow};
use serde_json::json;
use tempfile::TempDir;

use crate::io::config::PivotConfig;
use crate::io::process::{Cmd, CommandRunner, Output};

pub const DIGEST_A: &str =
    "sha256:0c5a0e80ce2fa9ff6e0b3e8f6a3a3bfd1bc57f1e9a36a9bbdc3f5bd3fb4d9a21";
pub const DIGEST_B: &str =
    "sha256:7d3a2b1e4f5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8f9012a3b4c5d6e7";
pub const COMMIT: &str = "9a2d7bd4d1b0a8f63e4c9d1f1e2f4a5b6c7d8e9f0a1b2c3d4e5f60718293a4b5";

struct Rule {
    prefix: String,
    responses: VecDeque<Result<String, String>>,
}

/// Runner that records every command and replies from per-prefix queues.
///
/// A command is answered by the rule with the longest matching prefix. Each
/// rule pops its responses in order and keeps repeating the last one.
/// Commands without a rule succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    rules: RefCell<Vec<Rule>>,
    calls: RefCell<Vec<String>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful reply with `stdout` for commands starting with `prefix`.
    pub fn respond(self, prefix: &str, stdout: impl Into<String>) -> Self {
        self.push(prefix, Ok(stdout.into()));
        self
    }

    /// Queue a failure for commands starting with `prefix`.
    pub fn fail(self, prefix: &str, message: impl Into<String>) -> Self {
        self.push(prefix, Err(message.into()));
        self
    }

    fn push(&self, prefix: &str, response: Result<String, String>) {
        let mut rules = self.rules.borrow_mut();
        match rules.iter_mut().find(|rule| rule.prefix == prefix) {
            Some(rule) => rule.responses.push_back(response),
            None => rules.push(Rule {
                prefix: prefix.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
    }

    /// Every command run so far, rendered as `program arg...`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }

    pub fn called(&self, prefix: &str) -> bool {
        self.count(prefix) > 0
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls
            .borrow()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// Index of the first call starting with `prefix`.
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.calls
            .borrow()
            .iter()
            .position(|call| call.starts_with(prefix))
    }

    fn next_response(&self, line: &str) -> Result<String, String> {
        let mut rules = self.rules.borrow_mut();
        let Some(rule) = rules
            .iter_mut()
            .filter(|rule| line.starts_with(&rule.prefix))
            .max_by_key(|rule| rule.prefix.len())
        else {
            return Ok(String::new());
        };
        if rule.responses.len() > 1 {
            rule.responses.pop_front().unwrap_or_else(|| Ok(String::new()))
        } else {
            rule.responses.front().cloned().unwrap_or_else(|| Ok(String::new()))
        }
    }
}

impl CommandRunner for ScriptedRunner {
    fn exec(&self, cmd: &Cmd, output: Output) -> Result<String> {
        let line = cmd.to_string();
        self.calls.borrow_mut().push(line.clone());
        match self.next_response(&line) {
            Ok(stdout) if output == Output::Capture => Ok(stdout),
            Ok(_) => Ok(String::new()),
            Err(message) => Err(anyhow!("{}: {message}", cmd.program())),
        }
    }
}

/// A temporary directory standing in for the host filesystem, with a config
/// whose paths all point into it and whose retries never sleep.
pub struct TestHost {
    pub temp: TempDir,
    pub config: PivotConfig,
}

impl TestHost {
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("tempdir");
        let root = temp.path();
        let mut config = PivotConfig::default();
        config.paths.spool_file = root.join("image-pullspec");
        config.paths.reboot_marker = root.join("reboot-needed");
        config.paths.auth_file = root.join("config.json");
        config.paths.tuning_file = root.join("kernel-args");
        config.paths.cmdline_file = root.join("cmdline");
        config.network.retry_delay_secs = 0;
        Self { temp, config }
    }

    pub fn write(&self, path: &Path, contents: &str) -> PathBuf {
        fs::write(path, contents).expect("write test file");
        path.to_path_buf()
    }

    pub fn write_spool(&self, pullspec: &str) {
        self.write(&self.config.paths.spool_file, pullspec);
    }

    pub fn write_tuning(&self, directives: &str, cmdline: &str) {
        self.write(&self.config.paths.tuning_file, directives);
        self.write(&self.config.paths.cmdline_file, cmdline);
    }

    pub fn mark_reboot_needed(&self) {
        self.write(&self.config.paths.reboot_marker, "");
    }
}

impl Default for TestHost {
    fn default() -> Self {
        Self::new()
    }
}

/// `rpm-ostree status --json` output with one booted deployment.
pub fn status_json(custom_origin: Option<&str>) -> String {
    let mut deployment = json!({
        "id": "rhcos-0",
        "osname": "rhcos",
        "checksum": "b2a8f3c1",
        "booted": true,
    });
    if let Some(origin) = custom_origin {
        deployment["custom-origin"] = json!([origin, "Managed by pivot tool"]);
    }
    json!({ "deployments": [deployment] }).to_string()
}

/// `skopeo inspect` output for `name@digest` with the given labels.
pub fn inspect_json(name: &str, digest: &str, labels: &[(&str, &str)]) -> String {
    let labels: serde_json::Map<String, serde_json::Value> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), json!(v)))
        .collect();
    json!({
        "Name": name,
        "Digest": digest,
        "RepoTags": [],
        "Created": "2019-01-15T17:46:23Z",
        "DockerVersion": "",
        "Labels": labels,
        "Architecture": "amd64",
        "Os": "linux",
        "Layers": [],
    })
    .to_string()
}

/// Assert a call list contains `expected` in order, possibly with gaps.
pub fn assert_in_order(calls: &[String], expected: &[&str]) {
    let mut rest = calls.iter();
    for want in expected {
        assert!(
            rest.any(|call| call.starts_with(want)),
            "expected {want:?} in order within {calls:#?}"
        );
    }
}

