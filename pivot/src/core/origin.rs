//! Pivot's marker in deployment origins.
//!
//! A pivoted deployment carries `pivot://<name>@<digest>` as its custom origin
//! URL. Other tooling relies on that prefix to detect pivot-managed hosts.

use crate::core::types::Deployment;

pub const PIVOT_ORIGIN_PREFIX: &str = "pivot://";
pub const PIVOT_ORIGIN_DESCRIPTION: &str = "Managed by pivot tool";

/// Image id recorded by a previous pivot, if this deployment came from one.
pub fn previous_pivot(deployment: &Deployment) -> Option<&str> {
    let origin = deployment.custom_origin.first()?;
    origin
        .strip_prefix(PIVOT_ORIGIN_PREFIX)
        .filter(|image_id| !image_id.is_empty())
}

pub fn custom_origin_url(image_id: &str) -> String {
    format!("{PIVOT_ORIGIN_PREFIX}{image_id}")
}
