//! Requests, responses, watch records, and cancel handles.
//!
//! Response sinks are bounded [`tokio::sync::mpsc`] channels owned by the
//! embedding server. The cache only ever uses non-blocking sends, so the
//! caller must keep one slot of spare capacity per outstanding response;
//! a full channel is treated as a broken contract, not back-pressure.

use std::collections::HashMap;
use std::fmt;

use keel_core::{BoxResource, Node, ResourceWithTtl, TypeUrl};
use tokio::sync::mpsc;

use crate::stream::SharedStreamState;

/// A state-of-the-world discovery request.
#[derive(Clone, Debug, Default)]
pub struct Request {
    /// The client identity making the request.
    pub node: Node,
    /// The resource family requested.
    pub type_url: TypeUrl,
    /// The version the client last acknowledged; empty on first request.
    pub version_info: String,
    /// Specific resources requested. Empty means every resource of the type.
    pub resource_names: Vec<String>,
}

/// An incremental (delta) discovery request.
#[derive(Clone, Debug, Default)]
pub struct DeltaRequest {
    /// The client identity making the request.
    pub node: Node,
    /// The resource family requested.
    pub type_url: TypeUrl,
    /// Resource names the client is subscribing to with this request.
    pub resource_names_subscribe: Vec<String>,
    /// Resource names the client is dropping with this request.
    pub resource_names_unsubscribe: Vec<String>,
    /// Versions the client already holds, reported on reconnect.
    pub initial_resource_versions: HashMap<String, String>,
}

/// A state-of-the-world response.
///
/// Carries the full (or request-filtered) resource set of one type at the
/// snapshot's type version, together with the request that triggered it.
#[derive(Clone, Debug)]
pub struct Response {
    /// The request this response answers.
    pub request: Request,
    /// The type version of the snapshot the resources come from.
    pub version: String,
    /// The resources, TTLs preserved.
    pub resources: Vec<ResourceWithTtl>,
    /// Whether this is a TTL heartbeat rather than a content update.
    pub heartbeat: bool,
}

/// A single resource inside a delta response.
#[derive(Clone, Debug)]
pub struct DeltaResource {
    /// Resource name.
    pub name: String,
    /// Per-resource version from the snapshot's version map.
    pub version: String,
    /// The resource itself.
    pub resource: BoxResource,
}

/// An incremental (delta) response.
#[derive(Clone, Debug)]
pub struct DeltaResponse {
    /// The resource family of this response.
    pub type_url: TypeUrl,
    /// The snapshot's type version at the time of the diff.
    pub system_version_info: String,
    /// Added or changed resources since the stream's known state.
    pub resources: Vec<DeltaResource>,
    /// Names the stream knew that are gone from the snapshot.
    pub removed_resources: Vec<String>,
}

/// Sink for state-of-the-world responses.
pub type ResponseSink = mpsc::Sender<Response>;

/// Sink for delta responses.
pub type DeltaResponseSink = mpsc::Sender<DeltaResponse>;

/// An open state-of-the-world watch.
#[derive(Debug)]
pub(crate) struct ResponseWatch {
    pub(crate) request: Request,
    pub(crate) sink: ResponseSink,
}

/// An open delta watch.
#[derive(Debug)]
pub(crate) struct DeltaWatch {
    pub(crate) request: DeltaRequest,
    pub(crate) sink: DeltaResponseSink,
    pub(crate) stream: SharedStreamState,
}

/// Handle for cancelling an open watch.
///
/// Cancelling removes the watch from its node's table; it never touches the
/// sink, so the handle stays valid after the embedder has dropped the
/// receiving side. Watches answered synchronously return a no-op handle.
pub struct WatchCancel {
    inner: Option<Box<dyn FnOnce() + Send>>,
}

impl WatchCancel {
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            inner: Some(Box::new(cancel)),
        }
    }

    /// A handle for a watch that was answered immediately.
    #[must_use]
    pub fn noop() -> Self {
        Self { inner: None }
    }

    /// Whether cancelling would do anything.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.inner.is_none()
    }

    /// Cancel the watch. The watch receives no further responses, though a
    /// response already handed to the sink may still arrive.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.inner.take() {
            cancel();
        }
    }
}

impl fmt::Debug for WatchCancel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchCancel")
            .field("noop", &self.inner.is_none())
            .finish()
    }
}
