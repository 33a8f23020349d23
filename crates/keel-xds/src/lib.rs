//! # keel-xds
//!
//! Snapshot-driven configuration cache for xDS control planes.
//!
//! keel keeps a single authoritative, versioned snapshot of typed resources
//! per client node and dispatches it to consumers over three serving
//! models:
//!
//! - State-of-the-World watches (full replacement on version change)
//! - Delta watches (incremental updates against per-stream state)
//! - One-shot fetches (REST-style polling)
//!
//! It also supports ADS response consistency and periodic heartbeats for
//! TTL-bearing resources.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keel_xds::prelude::*;
//! use tokio_util::sync::CancellationToken;
//!
//! // Create a cache in ADS mode, keyed by node ID.
//! let cache = SnapshotCache::new(true, IdHash);
//!
//! // Build and install a snapshot for a node.
//! let snapshot = Snapshot::builder()
//!     .version("v1")
//!     .build();
//! cache.set_snapshot(&CancellationToken::new(), "node-1", snapshot)?;
//!
//! // The discovery server opens watches against the cache.
//! let cancel = cache.create_watch(&request, &stream_state, sink);
//! ```
//!
//! ## Architecture
//!
//! This library is organized into two crates:
//!
//! - `keel-core` - Core types, traits, and error handling
//! - `keel-cache` - The snapshot cache with watch dispatch and heartbeats
//!
//! This crate (`keel-xds`) re-exports both for convenience. The gRPC/REST
//! transport embedding the cache lives outside this repository; the cache
//! exposes a programmatic contract only.
//!
//! ## Design Principles
//!
//! 1. **No panics in library code** - All errors are returned as `Result`
//! 2. **No I/O under locks** - Responses go through non-blocking sends into
//!    caller-provisioned channels
//! 3. **Opaque payloads** - Resources are values with a name and a type URL

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

// Re-export the sub-crates.
pub use keel_cache as cache;
pub use keel_core as core;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use keel_xds::prelude::*;
/// ```
pub mod prelude {
    // Core types
    pub use keel_core::{
        well_known, AnyResource, BoxResource, FnvHash, IdHash, Node, NodeHash, Resource,
        ResourceVersion, ResourceWithTtl, TypeUrl, XdsError,
    };

    // Cache types
    pub use keel_cache::{
        shared, Cache, CacheStats, DeltaRequest, DeltaResponse, Request, Response, SharedStreamState,
        Snapshot, SnapshotBuilder, SnapshotCache, StatusInfo, StreamState, WatchCancel,
    };
}

/// Version information for this crate.
pub mod version {
    /// Crate version.
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");

    /// Minimum supported Rust version.
    pub const MSRV: &str = "1.75";

    /// Get version info as a string.
    pub fn version_string() -> String {
        format!("keel-xds {} (MSRV {})", VERSION, MSRV)
    }
}
