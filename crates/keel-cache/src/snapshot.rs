//! Snapshot: immutable, per-node bundle of typed resources.
//!
//! A snapshot represents a consistent view of all resources for a node,
//! with one version per resource type. Snapshots are:
//!
//! - **Immutable**: Once built, a snapshot cannot be modified
//! - **Type-organized**: Resources are grouped by their type URL
//! - **Versioned per type**: Each type carries its own opaque version
//!
//! For delta serving, a snapshot lazily derives a per-resource version map
//! (a digest of each encoded payload). The map is memoized on first use and
//! shared by every delta watch serviced afterwards.

use std::collections::HashMap;
use std::hash::Hasher;
use std::sync::OnceLock;

use fnv::FnvHasher;
use keel_core::{ResourceVersion, ResourceWithTtl, TypeUrl, XdsError};

/// Per-resource versions for one type, keyed by resource name.
pub type VersionMap = HashMap<String, ResourceVersion>;

/// Resources of a single type within a snapshot.
#[derive(Debug, Clone, Default)]
pub struct SnapshotResources {
    /// Version string for this resource type.
    version: ResourceVersion,
    /// Resources keyed by name.
    items: HashMap<String, ResourceWithTtl>,
}

impl SnapshotResources {
    fn new(version: impl Into<ResourceVersion>) -> Self {
        Self {
            version: version.into(),
            items: HashMap::new(),
        }
    }

    /// Get the version for this resource type.
    #[inline]
    pub fn version(&self) -> &str {
        self.version.as_str()
    }

    /// Get the number of resources.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if there are no resources.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Get a resource by name.
    #[inline]
    pub fn get(&self, name: &str) -> Option<&ResourceWithTtl> {
        self.items.get(name)
    }

    /// Check if a resource name is present.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.items.contains_key(name)
    }

    /// Iterate over all resources.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ResourceWithTtl)> {
        self.items.iter()
    }

    /// All resource names of this type.
    #[inline]
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.items.keys()
    }

    /// The underlying name → resource map.
    #[inline]
    pub fn entries(&self) -> &HashMap<String, ResourceWithTtl> {
        &self.items
    }
}

/// An immutable snapshot of resources for a node.
///
/// Snapshots are the unit of cache storage: a producer builds one with
/// [`Snapshot::builder`] and installs it with
/// [`SnapshotCache::set_snapshot`](crate::SnapshotCache::set_snapshot).
/// The cache compares type versions only by equality; reusing a version
/// across installs means "unchanged" and wakes no watches.
#[derive(Debug, Default)]
pub struct Snapshot {
    /// Resources grouped by type URL.
    resources: HashMap<TypeUrl, SnapshotResources>,
    /// Lazily-built per-resource version map, used only by delta serving.
    version_map: OnceLock<HashMap<TypeUrl, VersionMap>>,
}

impl Snapshot {
    /// Create a new snapshot builder.
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::new()
    }

    /// Get the version for a resource type.
    ///
    /// Returns the empty string if the type is not present.
    #[inline]
    pub fn version(&self, type_url: &TypeUrl) -> &str {
        self.resources
            .get(type_url)
            .map(SnapshotResources::version)
            .unwrap_or("")
    }

    /// Get the resources of a type, if present.
    #[inline]
    pub fn resources(&self, type_url: &TypeUrl) -> Option<&SnapshotResources> {
        self.resources.get(type_url)
    }

    /// Check if this snapshot contains a resource type.
    #[inline]
    pub fn contains_type(&self, type_url: &TypeUrl) -> bool {
        self.resources.contains_key(type_url)
    }

    /// All type URLs present in this snapshot.
    pub fn type_urls(&self) -> impl Iterator<Item = &TypeUrl> {
        self.resources.keys()
    }

    /// Total number of resources across all types.
    pub fn total_resources(&self) -> usize {
        self.resources.values().map(SnapshotResources::len).sum()
    }

    /// Check if this snapshot holds no resources.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty() || self.resources.values().all(SnapshotResources::is_empty)
    }

    /// Build the per-resource version map if it has not been built yet.
    ///
    /// Idempotent, and cheap after the first call. Safe to call while
    /// holding the cache lock: the digests are pure CPU work over the
    /// encoded payloads. Only delta serving consults the map, so SOTW-only
    /// deployments never pay for it.
    pub fn construct_version_map(&self) -> Result<(), XdsError> {
        if self.version_map.get().is_some() {
            return Ok(());
        }

        let mut map = HashMap::with_capacity(self.resources.len());
        for (type_url, set) in &self.resources {
            let mut versions = VersionMap::with_capacity(set.len());
            for (name, entry) in set.iter() {
                let any = entry.resource().encode().map_err(|err| XdsError::EncodingError {
                    type_url: type_url.to_string(),
                    message: err.to_string(),
                })?;
                versions.insert(name.clone(), ResourceVersion::new(digest(&any)));
            }
            map.insert(type_url.clone(), versions);
        }

        // A concurrent builder computed the identical map; either result is fine.
        let _ = self.version_map.set(map);
        Ok(())
    }

    /// Per-resource versions for a type.
    ///
    /// Returns `None` until [`Snapshot::construct_version_map`] has run, or
    /// when the type is not present in the snapshot.
    #[inline]
    pub fn version_map(&self, type_url: &TypeUrl) -> Option<&VersionMap> {
        self.version_map.get().and_then(|m| m.get(type_url))
    }
}

impl Clone for Snapshot {
    fn clone(&self) -> Self {
        let version_map = OnceLock::new();
        if let Some(map) = self.version_map.get() {
            let _ = version_map.set(map.clone());
        }
        Self {
            resources: self.resources.clone(),
            version_map,
        }
    }
}

/// FNV-1a digest of an encoded payload, as sixteen hex digits.
fn digest(any: &prost_types::Any) -> String {
    let mut hasher = FnvHasher::default();
    hasher.write(any.type_url.as_bytes());
    hasher.write(&any.value);
    format!("{:016x}", hasher.finish())
}

/// Builder for creating snapshots.
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    version: String,
    resources: HashMap<TypeUrl, SnapshotResources>,
}

impl SnapshotBuilder {
    /// Create a new snapshot builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the default version applied to types added with
    /// [`SnapshotBuilder::resources`].
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Add resources of a type at the default version.
    pub fn resources(
        self,
        type_url: impl Into<TypeUrl>,
        resources: impl IntoIterator<Item = ResourceWithTtl>,
    ) -> Self {
        let version = self.version.clone();
        self.resources_with_version(type_url, version, resources)
    }

    /// Add resources of a type with an explicit version.
    pub fn resources_with_version(
        mut self,
        type_url: impl Into<TypeUrl>,
        version: impl Into<ResourceVersion>,
        resources: impl IntoIterator<Item = ResourceWithTtl>,
    ) -> Self {
        let mut set = SnapshotResources::new(version);
        for resource in resources {
            set.items.insert(resource.name().to_string(), resource);
        }
        self.resources.insert(type_url.into(), set);
        self
    }

    /// Build the snapshot.
    pub fn build(self) -> Snapshot {
        Snapshot {
            resources: self.resources,
            version_map: OnceLock::new(),
        }
    }
}
