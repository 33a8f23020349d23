//! # keel-cache
//!
//! Node-partitioned, version-addressed snapshot cache.
//!
//! This crate is the serving core of keel. It keeps one authoritative
//! [`Snapshot`] per client node and mediates between a configuration
//! producer and many long-lived consumers:
//!
//! - [`SnapshotCache`] - the cache itself: snapshot installs, watch
//!   dispatch, one-shot fetches, and an optional TTL heartbeat loop
//! - [`Snapshot`] - immutable per-node resource bundle with per-type
//!   versions and a lazily-derived per-resource version map
//! - [`StreamState`] - per-connection knowledge used for the subset
//!   fast-path and delta diffing
//! - [`StatusInfo`] - per-node watch tables and diagnostics
//!
//! ## Key Design Decisions
//!
//! - One reader-writer lock over the snapshot/status maps, one inner mutex
//!   per status entry; lock order is always cache → status
//! - Responses are emitted under the lock via non-blocking sends into
//!   bounded channels the embedder keeps capacity in
//! - Snapshots are immutable and atomically replaced; version comparison is
//!   equality only
//! - Delta version digests are built lazily, only when a delta watch is open
//!
//! ## Example
//!
//! ```rust,ignore
//! use keel_cache::{Snapshot, SnapshotCache};
//! use keel_core::IdHash;
//! use tokio_util::sync::CancellationToken;
//!
//! let cache = SnapshotCache::new(true, IdHash);
//!
//! let snapshot = Snapshot::builder()
//!     .version("v1")
//!     .build();
//!
//! cache.set_snapshot(&CancellationToken::new(), "node-1", snapshot)?;
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![deny(unsafe_code)]
#![warn(missing_docs)]

mod cache;
mod delta;
mod snapshot;
mod stats;
mod status;
mod stream;
mod types;

#[cfg(test)]
mod testutil;

pub use cache::{Cache, SnapshotCache};
pub use snapshot::{Snapshot, SnapshotBuilder, SnapshotResources, VersionMap};
pub use stats::CacheStats;
pub use status::StatusInfo;
pub use stream::{shared, SharedStreamState, StreamState};
pub use types::{
    DeltaRequest, DeltaResource, DeltaResponse, DeltaResponseSink, Request, Response,
    ResponseSink, WatchCancel,
};
