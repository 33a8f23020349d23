//! Resource trait and TTL pairing.
//!
//! The cache is agnostic to resource payload shape: it stores values
//! implementing [`Resource`], keyed by name and grouped by type URL.
//! [`ResourceWithTtl`] attaches the optional heartbeat TTL the snapshot
//! cache consults when emitting periodic refreshes.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Trait for cacheable discovery resources.
///
/// Implement this trait to store custom resource types in a snapshot.
///
/// # Example
///
/// ```rust
/// use keel_core::{well_known, Resource};
/// use std::any::Any as StdAny;
///
/// #[derive(Debug)]
/// struct MyCluster {
///     name: String,
/// }
///
/// impl Resource for MyCluster {
///     fn type_url(&self) -> &str {
///         well_known::CLUSTER
///     }
///
///     fn name(&self) -> &str {
///         &self.name
///     }
///
///     fn encode(&self) -> Result<prost_types::Any, Box<dyn std::error::Error + Send + Sync>> {
///         Ok(prost_types::Any {
///             type_url: self.type_url().to_string(),
///             value: vec![],
///         })
///     }
///
///     fn as_any(&self) -> &dyn StdAny {
///         self
///     }
/// }
/// ```
pub trait Resource: Send + Sync + fmt::Debug {
    /// Get the type URL for this resource.
    fn type_url(&self) -> &str;

    /// Get the resource name, unique within its type inside a snapshot.
    fn name(&self) -> &str;

    /// Encode the resource to a protobuf `Any` message.
    fn encode(&self) -> Result<prost_types::Any, Box<dyn std::error::Error + Send + Sync>>;

    /// Convert to `Any` for downcasting.
    fn as_any(&self) -> &dyn Any;
}

/// Type alias for a shared, type-erased resource.
pub type BoxResource = Arc<dyn Resource>;

/// A resource paired with its optional heartbeat TTL.
///
/// A `None` TTL means the resource never heartbeats; a `Some` TTL marks it
/// eligible for periodic refresh responses.
#[derive(Clone, Debug)]
pub struct ResourceWithTtl {
    resource: BoxResource,
    ttl: Option<Duration>,
}

impl ResourceWithTtl {
    /// Wrap a resource with no TTL.
    #[must_use]
    pub fn new(resource: BoxResource) -> Self {
        Self {
            resource,
            ttl: None,
        }
    }

    /// Wrap a resource with a heartbeat TTL.
    #[must_use]
    pub fn with_ttl(resource: BoxResource, ttl: Duration) -> Self {
        Self {
            resource,
            ttl: Some(ttl),
        }
    }

    /// The wrapped resource.
    #[inline]
    pub fn resource(&self) -> &BoxResource {
        &self.resource
    }

    /// The heartbeat TTL, if any.
    #[inline]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Name of the wrapped resource.
    #[inline]
    pub fn name(&self) -> &str {
        self.resource.name()
    }
}

/// A raw protobuf `Any` payload exposed as a [`Resource`].
///
/// Lets producers store pre-encoded messages without decoding them.
#[derive(Debug, Clone)]
pub struct AnyResource {
    type_url: String,
    name: String,
    any: prost_types::Any,
}

impl AnyResource {
    /// Create a new `AnyResource`.
    #[must_use]
    pub fn new(
        type_url: impl Into<String>,
        name: impl Into<String>,
        any: prost_types::Any,
    ) -> Self {
        Self {
            type_url: type_url.into(),
            name: name.into(),
            any,
        }
    }

    /// Get the inner `Any` message.
    #[must_use]
    pub fn inner(&self) -> &prost_types::Any {
        &self.any
    }
}

impl Resource for AnyResource {
    fn type_url(&self) -> &str {
        &self.type_url
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn encode(&self) -> Result<prost_types::Any, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.any.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
