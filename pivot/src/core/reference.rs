//! Container image reference parsing and digest comparison.
//!
//! References follow the distribution grammar:
//! `[domain[:port]/]path[:tag][@algorithm:hex]`. A reference is *canonical*
//! when it carries a digest, which is what pivot records in deployment
//! origins and compares against on later runs.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Upper bound on the repository name (domain + path) length.
pub const NAME_TOTAL_LENGTH_MAX: usize = 255;

static REFERENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?P<name>",
        r"(?:(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9])",
        r"(?:\.(?:[a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9-]*[a-zA-Z0-9]))*",
        r"(?::[0-9]+)?/)?",
        r"[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*",
        r"(?:/[a-z0-9]+(?:(?:[._]|__|-+)[a-z0-9]+)*)*",
        r")",
        r"(?::(?P<tag>[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}))?",
        r"(?:@(?P<digest>[A-Za-z][A-Za-z0-9]*(?:[-_+.][A-Za-z][A-Za-z0-9]*)*:[0-9a-fA-F]{32,}))?$",
    ))
    .expect("reference grammar is a valid regex")
});

/// Errors from parsing or canonicalizing a single reference.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("parsing reference {reference:?}: invalid reference format")]
    InvalidFormat { reference: String },
    #[error(
        "parsing reference {reference:?}: repository name must not be more than {max} characters",
        max = NAME_TOTAL_LENGTH_MAX
    )]
    NameTooLong { reference: String },
    #[error("parsing reference {reference:?}: unsupported digest algorithm {algorithm:?}")]
    UnsupportedDigest {
        reference: String,
        algorithm: String,
    },
    #[error("parsing reference {reference:?}: invalid {algorithm} digest")]
    InvalidDigest {
        reference: String,
        algorithm: String,
    },
    #[error("not canonical form: {reference:?}")]
    NotCanonical { reference: String },
}

/// Which side of an image comparison failed to resolve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Current,
    Desired,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Current => f.write_str("current"),
            Side::Desired => f.write_str("desired"),
        }
    }
}

/// A reference on one side of [`same_image`] could not be resolved to a digest.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("parsing {side} image reference")]
pub struct CompareError {
    pub side: Side,
    #[source]
    pub source: ReferenceError,
}

/// Parsed image reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    /// Domain and repository path, e.g. `quay.io/openshift/os`.
    pub name: String,
    pub tag: Option<String>,
    /// `algorithm:hex`, e.g. `sha256:0743...`.
    pub digest: Option<String>,
}

impl ImageReference {
    pub fn parse(reference: &str) -> Result<Self, ReferenceError> {
        let caps = REFERENCE_RE
            .captures(reference)
            .ok_or_else(|| ReferenceError::InvalidFormat {
                reference: reference.to_string(),
            })?;

        let name = caps.name("name").map_or("", |m| m.as_str());
        if name.len() > NAME_TOTAL_LENGTH_MAX {
            return Err(ReferenceError::NameTooLong {
                reference: reference.to_string(),
            });
        }

        let digest = caps.name("digest").map(|m| m.as_str().to_string());
        if let Some(digest) = &digest {
            validate_digest(reference, digest)?;
        }

        Ok(Self {
            name: name.to_string(),
            tag: caps.name("tag").map(|m| m.as_str().to_string()),
            digest,
        })
    }

    pub fn is_canonical(&self) -> bool {
        self.digest.is_some()
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

/// Return the digest of a canonical reference.
///
/// Fails if `reference` does not parse or carries no digest.
pub fn canonical_digest(reference: &str) -> Result<String, ReferenceError> {
    ImageReference::parse(reference)?
        .digest
        .ok_or_else(|| ReferenceError::NotCanonical {
            reference: reference.to_string(),
        })
}

/// Whether `current` and `desired` denote the same image content.
///
/// Identical strings match without parsing. Otherwise both sides must be
/// canonical and match when their digests are equal, regardless of name.
pub fn same_image(current: &str, desired: &str) -> Result<bool, CompareError> {
    if current == desired {
        return Ok(true);
    }
    let current_digest = canonical_digest(current).map_err(|source| CompareError {
        side: Side::Current,
        source,
    })?;
    let desired_digest = canonical_digest(desired).map_err(|source| CompareError {
        side: Side::Desired,
        source,
    })?;
    Ok(current_digest == desired_digest)
}

fn validate_digest(reference: &str, digest: &str) -> Result<(), ReferenceError> {
    let (algorithm, hex) = digest
        .split_once(':')
        .ok_or_else(|| ReferenceError::InvalidFormat {
            reference: reference.to_string(),
        })?;
    let expected_len = match algorithm {
        "sha256" => 64,
        "sha384" => 96,
        "sha512" => 128,
        other => {
            return Err(ReferenceError::UnsupportedDigest {
                reference: reference.to_string(),
                algorithm: other.to_string(),
            });
        }
    };
    let lower_hex = hex
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
    if hex.len() != expected_len || !lower_hex {
        return Err(ReferenceError::InvalidDigest {
            reference: reference.to_string(),
            algorithm: algorithm.to_string(),
        });
    }
    Ok(())
}
