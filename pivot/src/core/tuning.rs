//! Deterministic planning of kernel argument changes.
//!
//! A tuning file holds one directive per line, `ADD <arg>` or `DELETE <arg>`.
//! Each directive passes two independent gates before it is planned: the
//! argument must be whitelisted, and the live command line must not already
//! reflect it. Re-planning against an already tuned host yields an empty plan.

use serde::{Deserialize, Serialize};

use crate::core::types::{TuneArgument, TuningPlan};

/// Kernel arguments pivot is allowed to add or remove.
pub const TUNABLE_ARGS: &[&str] = &["nosmt"];

/// How an argument is looked up in the live kernel command line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KargMatch {
    /// Plain substring containment. `nosmt` is "present" in `nosmt=force`.
    #[default]
    Substring,
    /// Whitespace-delimited token equality.
    Token,
}

/// One parsed line of a tuning file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Add(TuneArgument),
    Delete(TuneArgument),
}

impl Directive {
    pub fn argument(&self) -> &TuneArgument {
        match self {
            Directive::Add(arg) | Directive::Delete(arg) => arg,
        }
    }
}

/// True if any line of `contents` is a directive for a whitelisted argument,
/// i.e. planning it needs the live command line.
pub fn needs_cmdline(contents: &str) -> bool {
    contents
        .lines()
        .filter_map(parse_directive)
        .any(|directive| is_arg_tunable(&directive.argument().key))
}

/// Why a line of the tuning file produced no action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Malformed,
    NotWhitelisted,
    AlreadyPresent,
    NotPresent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedLine {
    pub line: String,
    pub reason: SkipReason,
}

/// Plan plus the lines that were dropped on the way.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TuningReport {
    pub plan: TuningPlan,
    pub skipped: Vec<SkippedLine>,
}

pub fn is_arg_tunable(key: &str) -> bool {
    TUNABLE_ARGS.contains(&key)
}

/// True if `arg` is already part of `cmdline`.
pub fn is_arg_in_use(arg: &str, cmdline: &str, mode: KargMatch) -> bool {
    match mode {
        KargMatch::Substring => cmdline.contains(arg),
        KargMatch::Token => cmdline.split_whitespace().any(|token| token == arg),
    }
}

/// Parse a single tuning line. Returns `None` for anything that is not a
/// well-formed `ADD`/`DELETE` directive.
pub fn parse_directive(line: &str) -> Option<Directive> {
    if let Some(rest) = line.strip_prefix("ADD ") {
        return parse_argument(rest).map(Directive::Add);
    }
    if let Some(rest) = line.strip_prefix("DELETE ") {
        return parse_argument(rest).map(Directive::Delete);
    }
    None
}

fn parse_argument(raw: &str) -> Option<TuneArgument> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let argument = match raw.split_once('=') {
        Some((key, value)) => TuneArgument {
            key: key.to_string(),
            value: Some(value.to_string()),
        },
        None => TuneArgument::bare(raw),
    };
    Some(argument)
}

/// Compute the tuning plan for `contents` against the live `cmdline`.
pub fn plan_tuning(contents: &str, cmdline: &str, mode: KargMatch) -> TuningReport {
    let mut report = TuningReport::default();

    for line in contents.lines() {
        let skip = |reason| SkippedLine {
            line: line.to_string(),
            reason,
        };
        let Some(directive) = parse_directive(line) else {
            report.skipped.push(skip(SkipReason::Malformed));
            continue;
        };
        match directive {
            Directive::Add(arg) => {
                if !is_arg_tunable(&arg.key) {
                    report.skipped.push(skip(SkipReason::NotWhitelisted));
                } else if is_arg_in_use(&arg.as_karg(), cmdline, mode) {
                    report.skipped.push(skip(SkipReason::AlreadyPresent));
                } else {
                    report.plan.additions.push(arg);
                }
            }
            Directive::Delete(arg) => {
                if !is_arg_tunable(&arg.key) {
                    report.skipped.push(skip(SkipReason::NotWhitelisted));
                } else if !is_arg_in_use(&arg.as_karg(), cmdline, mode) {
                    report.skipped.push(skip(SkipReason::NotPresent));
                } else {
                    report.plan.deletions.push(arg);
                }
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const CMDLINE: &str = "BOOT_IMAGE=/a/vmlinuz.x86_64 resume=/dev/mapper/swap rhgb quiet root=/a/b/c/root ostree=/ostree/boot.0/a/0";
    const CMDLINE_NOSMT: &str = "BOOT_IMAGE=/a/vmlinuz.x86_64 nosmt resume=/dev/mapper/swap rhgb quiet root=/a/b/c/root ostree=/ostree/boot.0/a/0";
    const DIRECTIVES: &str = "ADD nosmt\nADD aaaa\nDELETE nosmt\nDELETE nope";

    #[test]
    fn plans_addition_when_absent() {
        let report = plan_tuning(DIRECTIVES, CMDLINE, KargMatch::Substring);
        assert_eq!(report.plan.additions, vec![TuneArgument::bare("nosmt")]);
        assert!(report.plan.deletions.is_empty());
    }

    #[test]
    fn plans_deletion_when_present() {
        let report = plan_tuning(DIRECTIVES, CMDLINE_NOSMT, KargMatch::Substring);
        assert!(report.plan.additions.is_empty());
        assert_eq!(report.plan.deletions, vec![TuneArgument::bare("nosmt")]);
    }

    #[test]
    fn non_whitelisted_keys_never_planned() {
        let cmdline = format!("{CMDLINE} aaaa nope");
        let report = plan_tuning("ADD aaaa\nDELETE nope", &cmdline, KargMatch::Substring);
        assert!(report.plan.is_empty());
        assert!(
            report
                .skipped
                .iter()
                .all(|s| s.reason == SkipReason::NotWhitelisted)
        );
    }

    #[test]
    fn replanning_is_deterministic() {
        let first = plan_tuning(DIRECTIVES, CMDLINE, KargMatch::Substring);
        let second = plan_tuning(DIRECTIVES, CMDLINE, KargMatch::Substring);
        assert_eq!(first, second);
    }

    #[test]
    fn empty_contents_yield_empty_plan() {
        let report = plan_tuning("", CMDLINE, KargMatch::Substring);
        assert!(report.plan.is_empty());
        assert!(report.skipped.is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let report = plan_tuning(
            "ADDnosmt\n\nREMOVE nosmt\nADD \n# comment",
            CMDLINE,
            KargMatch::Substring,
        );
        assert!(report.plan.is_empty());
        assert_eq!(report.skipped.len(), 5);
        assert!(
            report
                .skipped
                .iter()
                .all(|s| s.reason == SkipReason::Malformed)
        );
    }

    #[test]
    fn substring_match_sees_prefixed_argument() {
        assert!(is_arg_in_use("nosmt", "quiet nosmt=force", KargMatch::Substring));
        assert!(!is_arg_in_use("nosmt", "quiet nosmt=force", KargMatch::Token));
        assert!(is_arg_in_use("nosmt", "quiet nosmt", KargMatch::Token));
    }

    #[test]
    fn is_arg_in_use_detects_present_and_absent() {
        assert!(is_arg_in_use("quiet", CMDLINE, KargMatch::Substring));
        assert!(!is_arg_in_use("idonotexist", CMDLINE, KargMatch::Substring));
    }

    #[test]
    fn cmdline_needed_only_for_whitelisted_directives() {
        assert!(needs_cmdline("ADD aaaa\nDELETE nosmt"));
        assert!(!needs_cmdline("ADD aaaa\nbogus\nDELETE nope"));
        assert!(!needs_cmdline(""));
    }

    #[test]
    fn key_value_directives_are_parsed() {
        assert_eq!(
            parse_directive("ADD nosmt=force"),
            Some(Directive::Add(TuneArgument {
                key: "nosmt".to_string(),
                value: Some("force".to_string()),
            }))
        );
        assert_eq!(
            parse_directive("DELETE  nosmt "),
            Some(Directive::Delete(TuneArgument::bare("nosmt")))
        );
    }
}
