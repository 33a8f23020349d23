//! Node identification and hashing.
//!
//! Snapshots are partitioned by node: every client identity maps to exactly
//! one cache key through a [`NodeHash`] supplied by the embedder at cache
//! construction. The hash must be deterministic and collision-free within a
//! deployment; the cache does not detect collisions.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use fnv::FnvHasher;

/// Client identity descriptor.
///
/// The cache treats the descriptor as opaque: it is passed to the
/// [`NodeHash`] to derive the cache key and retained in per-node status for
/// diagnostics. Which fields participate in the key is the hasher's choice.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Node {
    /// Unique identifier of the client instance.
    pub id: String,
    /// Service cluster the client belongs to.
    pub cluster: String,
    /// Opaque key/value metadata supplied by the client.
    pub metadata: HashMap<String, String>,
}

impl Node {
    /// Create a node descriptor with the given ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    /// Set the service cluster.
    #[must_use]
    pub fn with_cluster(mut self, cluster: impl Into<String>) -> Self {
        self.cluster = cluster.into();
        self
    }

    /// Attach a metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// Capability trait mapping a [`Node`] descriptor to its cache key.
///
/// Implementations must be pure and total: the same descriptor always maps
/// to the same key, and every descriptor maps to some key.
///
/// # Example
///
/// ```rust
/// use keel_core::{Node, NodeHash};
///
/// #[derive(Debug)]
/// struct ClusterHash;
///
/// impl NodeHash for ClusterHash {
///     fn id(&self, node: &Node) -> String {
///         node.cluster.clone()
///     }
/// }
/// ```
pub trait NodeHash: Send + Sync + fmt::Debug {
    /// Derive the cache key for a node.
    fn id(&self, node: &Node) -> String;
}

/// Hasher that keys snapshots by the node ID verbatim.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdHash;

impl NodeHash for IdHash {
    fn id(&self, node: &Node) -> String {
        node.id.clone()
    }
}

/// Hasher producing a fixed-width FNV-1a key from the node ID.
///
/// Useful when node IDs are long or carry characters awkward for logs; the
/// key is sixteen lowercase hex digits.
#[derive(Clone, Copy, Debug, Default)]
pub struct FnvHash;

impl NodeHash for FnvHash {
    fn id(&self, node: &Node) -> String {
        let mut hasher = FnvHasher::default();
        node.id.hash(&mut hasher);
        format!("{:016x}", hasher.finish())
    }
}
