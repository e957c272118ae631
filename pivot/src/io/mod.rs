//! Side-effecting adapters: child processes, external tools, files, config.

pub mod config;
pub mod fs;
pub mod ostree;
pub mod podman;
pub mod process;
pub mod registry;
pub mod retry;
pub mod rpm_ostree;
pub mod skopeo;
