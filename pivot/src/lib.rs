//! Move an OSTree host from one deployment to another, using an OS container
//! image as the transport.
//!
//! The crate keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (reference comparison, commit
//!   selection, kernel argument planning). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (child processes, external tools,
//!   files, configuration). Isolated behind [`io::process::CommandRunner`] so
//!   tests can script every external command.
//!
//! Orchestration modules ([`pivot`], [`tuning`], [`orchestrator`]) coordinate
//! core logic with I/O to implement the CLI.

pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod orchestrator;
pub mod pivot;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tuning;
