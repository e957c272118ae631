//! Stable exit codes for the pivot CLI.

/// The run finished; the host changed or was already up to date.
pub const OK: i32 = 0;
/// Invalid arguments or config, or any failure during the run.
pub const FAILED: i32 = 1;
/// Nothing to do, and `--unchanged-exit-77` was given.
pub const UNCHANGED: i32 = 77;
