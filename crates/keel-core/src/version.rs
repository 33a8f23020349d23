//! Opaque version strings.
//!
//! The cache never orders versions. The only question it ever asks is
//! "is the client already at this version?", so the type offers equality
//! and nothing else. The default (empty) value is the initial state:
//! nothing delivered yet.

use std::fmt;

/// Version of a resource or resource type, compared only for equality.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ResourceVersion(String);

impl ResourceVersion {
    /// Wrap a version string.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    /// Whether this is the initial state (no version assigned yet).
    #[must_use]
    pub fn is_initial(&self) -> bool {
        self.0.is_empty()
    }

    /// The version as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether a client-reported version string is this version.
    #[must_use]
    pub fn matches(&self, reported: &str) -> bool {
        self.0 == reported
    }
}

impl fmt::Display for ResourceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ResourceVersion {
    fn from(version: String) -> Self {
        Self(version)
    }
}

impl From<&str> for ResourceVersion {
    fn from(version: &str) -> Self {
        Self(version.to_string())
    }
}

impl AsRef<str> for ResourceVersion {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Versions compare directly against the raw strings requests carry.
impl PartialEq<str> for ResourceVersion {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ResourceVersion {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
