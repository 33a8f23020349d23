//! Resource family tags.
//!
//! A snapshot groups its resources under opaque tags, and every request or
//! watch is scoped to exactly one of them. By xDS convention the tag is
//! the protobuf type URL of the family; the cache itself never looks
//! inside it.

use std::fmt;

/// Type URLs of the standard Envoy resource families.
///
/// Nothing in the cache depends on these; they exist so embedders and
/// tests do not spell the message paths out by hand.
pub mod well_known {
    /// Cluster Discovery Service (CDS).
    pub const CLUSTER: &str = "type.googleapis.com/envoy.config.cluster.v3.Cluster";

    /// Endpoint Discovery Service (EDS).
    pub const ENDPOINT: &str =
        "type.googleapis.com/envoy.config.endpoint.v3.ClusterLoadAssignment";

    /// Listener Discovery Service (LDS).
    pub const LISTENER: &str = "type.googleapis.com/envoy.config.listener.v3.Listener";

    /// Route Discovery Service (RDS).
    pub const ROUTE: &str = "type.googleapis.com/envoy.config.route.v3.RouteConfiguration";

    /// Secret Discovery Service (SDS).
    pub const SECRET: &str =
        "type.googleapis.com/envoy.extensions.transport_sockets.tls.v3.Secret";

    /// Runtime Discovery Service (RTDS).
    pub const RUNTIME: &str = "type.googleapis.com/envoy.service.runtime.v3.Runtime";
}

/// Opaque tag naming a resource family within a snapshot.
///
/// Two tags name the same family exactly when they are equal; the cache
/// neither parses nor validates them, so any string works as long as the
/// producer and its clients agree on it.
///
/// # Example
///
/// ```rust
/// use keel_core::{well_known, TypeUrl};
///
/// let cds: TypeUrl = well_known::CLUSTER.into();
/// assert_eq!(cds.as_str(), well_known::CLUSTER);
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TypeUrl(String);

impl TypeUrl {
    /// Wrap a string as a family tag.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// The tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TypeUrl {
    fn from(url: String) -> Self {
        Self(url)
    }
}

impl From<&str> for TypeUrl {
    fn from(url: &str) -> Self {
        Self(url.to_string())
    }
}

impl From<TypeUrl> for String {
    fn from(url: TypeUrl) -> Self {
        url.0
    }
}

impl AsRef<str> for TypeUrl {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
