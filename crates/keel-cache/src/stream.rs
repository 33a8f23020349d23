//! Per-connection stream state.
//!
//! A [`StreamState`] records what one client connection currently knows:
//! which resource names it has acknowledged per type (state-of-the-world),
//! and which resources at which versions it has been delivered (delta).
//! The state is owned by the embedding server; the cache borrows it while
//! answering requests and, for delta watches, holds a shared handle so the
//! diff on the next snapshot install sees the stream's latest knowledge.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use keel_core::TypeUrl;

/// Mutable knowledge of a single client connection.
#[derive(Debug, Default)]
pub struct StreamState {
    /// Whether the stream subscribes to every resource of its type.
    wildcard: bool,
    /// Explicit delta subscription set.
    subscribed: HashSet<String>,
    /// Per-resource versions last delivered on this stream (delta).
    resource_versions: HashMap<String, String>,
    /// Names the client has acknowledged, per type (state-of-the-world).
    known_resource_names: HashMap<TypeUrl, HashSet<String>>,
}

impl StreamState {
    /// Create stream state for a new connection.
    ///
    /// `initial_resource_versions` carries the versions a reconnecting
    /// client reports it already holds.
    #[must_use]
    pub fn new(wildcard: bool, initial_resource_versions: HashMap<String, String>) -> Self {
        Self {
            wildcard,
            subscribed: HashSet::new(),
            resource_versions: initial_resource_versions,
            known_resource_names: HashMap::new(),
        }
    }

    /// Whether the stream is in wildcard mode.
    #[inline]
    pub fn wildcard(&self) -> bool {
        self.wildcard
    }

    /// Switch wildcard mode on or off.
    pub fn set_wildcard(&mut self, wildcard: bool) {
        self.wildcard = wildcard;
    }

    /// Add names to the explicit subscription set.
    pub fn subscribe(&mut self, names: impl IntoIterator<Item = String>) {
        for name in names {
            self.subscribed.insert(name);
        }
    }

    /// Drop names from the subscription set, forgetting their delivered
    /// versions as well.
    pub fn unsubscribe(&mut self, names: impl IntoIterator<Item = String>) {
        for name in names {
            self.subscribed.remove(&name);
            self.resource_versions.remove(&name);
        }
    }

    /// Whether the stream is interested in a resource name.
    #[inline]
    pub fn is_subscribed(&self, name: &str) -> bool {
        self.wildcard || self.subscribed.contains(name)
    }

    /// The explicit subscription set.
    #[inline]
    pub fn subscribed(&self) -> &HashSet<String> {
        &self.subscribed
    }

    /// The version last delivered for a resource, if any.
    #[inline]
    pub fn delivered_version(&self, name: &str) -> Option<&str> {
        self.resource_versions.get(name).map(String::as_str)
    }

    /// Record that a resource was delivered at a version.
    pub fn mark_delivered(&mut self, name: impl Into<String>, version: impl Into<String>) {
        self.resource_versions.insert(name.into(), version.into());
    }

    /// Forget a resource that was removed from the snapshot.
    pub fn forget(&mut self, name: &str) {
        self.resource_versions.remove(name);
    }

    /// All per-resource versions the stream currently tracks.
    #[inline]
    pub fn resource_versions(&self) -> &HashMap<String, String> {
        &self.resource_versions
    }

    /// Names the client has acknowledged for a type (state-of-the-world).
    #[inline]
    pub fn known_resource_names(&self, type_url: &TypeUrl) -> Option<&HashSet<String>> {
        self.known_resource_names.get(type_url)
    }

    /// Record names the client acknowledged for a type.
    pub fn add_known_resource_names(
        &mut self,
        type_url: &TypeUrl,
        names: impl IntoIterator<Item = String>,
    ) {
        let set = self.known_resource_names.entry(type_url.clone()).or_default();
        for name in names {
            set.insert(name);
        }
    }

    /// Replace the acknowledged names for a type.
    pub fn set_known_resource_names(&mut self, type_url: &TypeUrl, names: HashSet<String>) {
        self.known_resource_names.insert(type_url.clone(), names);
    }
}

/// Stream state shared between the embedding server and delta watches.
pub type SharedStreamState = Arc<Mutex<StreamState>>;

/// Wrap stream state for sharing with delta watches.
#[must_use]
pub fn shared(state: StreamState) -> SharedStreamState {
    Arc::new(Mutex::new(state))
}
