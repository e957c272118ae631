//! Choosing the OSTree commit to rebase onto.

use thiserror::Error;

use crate::core::types::{ImageInspection, OSTREE_COMMIT_LABEL, VERSION_LABEL};

/// Commit declared by image labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelledCommit<'a> {
    pub commit: &'a str,
    pub version: Option<&'a str>,
}

/// The embedded repository does not have exactly one ref.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RefSelectionError {
    #[error("no refs found in repo")]
    NoRefs,
    #[error("multiple refs found in repo: {}", .0.join(", "))]
    MultipleRefs(Vec<String>),
}

/// Commit from the `com.coreos.ostree-commit` label, if the image declares one.
pub fn commit_from_labels(inspection: &ImageInspection) -> Option<LabelledCommit<'_>> {
    let commit = inspection.label(OSTREE_COMMIT_LABEL)?;
    Some(LabelledCommit {
        commit,
        version: inspection.label(VERSION_LABEL),
    })
}

/// Pick the only ref of the embedded repository.
pub fn select_single_ref(refs: &[String]) -> Result<&str, RefSelectionError> {
    match refs {
        [] => Err(RefSelectionError::NoRefs),
        [only] => Ok(only.as_str()),
        many => Err(RefSelectionError::MultipleRefs(many.to_vec())),
    }
}
