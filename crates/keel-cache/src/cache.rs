//! Snapshot cache: per-node snapshots, watch dispatch, and heartbeats.
//!
//! The cache keeps one authoritative [`Snapshot`] per node key and answers
//! three kinds of consumers:
//!
//! - **State-of-the-world watches** get a full replacement response whenever
//!   the type version changes.
//! - **Delta watches** get only the resources whose per-resource version
//!   differs from what their stream already holds.
//! - **Fetches** are one-shot polls that either return the current state or
//!   signal "no update".
//!
//! In ADS mode a response is held back until the request names every
//! resource the snapshot holds for its type; the client is expected to
//! retry with a broader request.
//!
//! ## Locking
//!
//! One reader-writer lock guards the snapshot and status maps; each status
//! entry carries its own mutex over its watch tables. Lock order is always
//! cache → status (→ stream state, for delta watches). Responses are
//! emitted inside the lock through non-blocking sends, so sinks must keep a
//! slot of spare capacity per outstanding response.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use keel_core::{NodeHash, ResourceWithTtl, XdsError};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::delta;
use crate::snapshot::{Snapshot, SnapshotResources};
use crate::stats::CacheStats;
use crate::status::StatusInfo;
use crate::stream::{SharedStreamState, StreamState};
use crate::types::{
    DeltaRequest, DeltaResponseSink, DeltaWatch, Request, Response, ResponseSink, ResponseWatch,
    WatchCancel,
};

/// Consumer-side interface of the snapshot cache.
///
/// The embedding discovery server talks to the cache exclusively through
/// this trait; producers use the inherent [`SnapshotCache`] methods.
pub trait Cache: Send + Sync {
    /// Open a watch for a state-of-the-world request.
    ///
    /// The watch is answered synchronously when the snapshot already has
    /// something newer than the request, otherwise it is registered and
    /// satisfied by a later [`SnapshotCache::set_snapshot`] or heartbeat
    /// tick. The returned handle cancels a registered watch; synchronous
    /// answers return a no-op handle.
    fn create_watch(
        &self,
        request: &Request,
        stream: &StreamState,
        sink: ResponseSink,
    ) -> WatchCancel;

    /// Open a watch for a delta request.
    ///
    /// The stream state is shared: the cache reads and updates it whenever
    /// it answers the watch, so the next diff starts from what the stream
    /// actually received.
    fn create_delta_watch(
        &self,
        request: &DeltaRequest,
        stream: SharedStreamState,
        sink: DeltaResponseSink,
    ) -> WatchCancel;

    /// One-shot fetch. Never registers a watch and never mutates status.
    ///
    /// Fails with [`XdsError::MissingSnapshot`] when the node has no
    /// snapshot and with the [`XdsError::SkipFetch`] sentinel when the
    /// request version is already current.
    fn fetch(&self, token: &CancellationToken, request: &Request) -> Result<Response, XdsError>;
}

#[derive(Debug, Default)]
struct CacheState {
    /// Snapshots indexed by node key.
    snapshots: HashMap<String, Arc<Snapshot>>,
    /// Status information indexed by node key.
    status: HashMap<String, Arc<StatusInfo>>,
}

#[derive(Debug)]
struct CacheInner {
    /// Hold responses until the request names all snapshot resources.
    ads: bool,
    /// Embedder-supplied node hashing function.
    hash: Box<dyn NodeHash>,
    /// Snapshot and status maps, guarded together.
    state: RwLock<CacheState>,
    /// Monotonic watch id counter, shared by SOTW and delta watches.
    watch_count: AtomicU64,
    /// Operation counters.
    stats: CacheStats,
}

#[derive(Clone, Copy, Debug)]
enum WatchKind {
    Sotw,
    Delta,
}

/// A snapshot-based cache maintaining one versioned snapshot per node.
///
/// For the protocol to work correctly in ADS mode, a snapshot must be
/// internally consistent: every cross-referenced resource name must be
/// contained in it. The cache trusts this and does not verify graph
/// closure.
///
/// Cloning is cheap and shares the underlying cache.
///
/// # Example
///
/// ```rust,ignore
/// use keel_cache::{Snapshot, SnapshotCache};
/// use keel_core::IdHash;
/// use tokio_util::sync::CancellationToken;
///
/// let cache = SnapshotCache::new(true, IdHash);
/// let snapshot = Snapshot::builder().version("v1").build();
/// cache.set_snapshot(&CancellationToken::new(), "node-a", snapshot)?;
/// ```
#[derive(Clone, Debug)]
pub struct SnapshotCache {
    inner: Arc<CacheInner>,
}

impl SnapshotCache {
    /// Create a cache.
    ///
    /// The ADS flag delays streaming responses until all resources are
    /// explicitly named in the request. This avoids a partial request over
    /// a single stream needing a fresh version for acknowledgement, and it
    /// requires snapshot consistency. For non-ADS (and fetch), partial
    /// requests arrive on separate streams and re-using the snapshot
    /// version is fine.
    pub fn new(ads: bool, hash: impl NodeHash + 'static) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                ads,
                hash: Box::new(hash),
                state: RwLock::new(CacheState::default()),
                watch_count: AtomicU64::new(0),
                stats: CacheStats::new(),
            }),
        }
    }

    /// Create a cache that additionally sends periodic heartbeat responses
    /// for resources carrying a TTL.
    ///
    /// The background task ticks every `heartbeat_interval` and stops when
    /// `token` is cancelled. Must be called within a Tokio runtime.
    pub fn with_heartbeating(
        token: CancellationToken,
        ads: bool,
        hash: impl NodeHash + 'static,
        heartbeat_interval: Duration,
    ) -> Self {
        let cache = Self::new(ads, hash);
        let worker = cache.clone();
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + heartbeat_interval;
            let mut ticker = tokio::time::interval_at(start, heartbeat_interval);
            loop {
                tokio::select! {
                    _ = ticker.tick() => worker.send_heartbeats(&token),
                    _ = token.cancelled() => {
                        debug!("heartbeat loop stopped");
                        return;
                    }
                }
            }
        });
        cache
    }

    /// Cache operation counters.
    #[inline]
    pub fn stats(&self) -> &CacheStats {
        &self.inner.stats
    }

    /// Install a snapshot for a node and answer every open watch whose
    /// version changed.
    ///
    /// For ADS, successive snapshots should have distinct versions and be
    /// internally consistent. Watches whose response the ADS rule holds
    /// back stay registered; the first sink failure aborts the fan-out and
    /// is returned, leaving the remaining watches for the next install.
    pub fn set_snapshot(
        &self,
        token: &CancellationToken,
        node: &str,
        snapshot: Snapshot,
    ) -> Result<(), XdsError> {
        let snapshot = Arc::new(snapshot);
        let mut state = self.inner.state.write().expect("cache lock poisoned");
        state.snapshots.insert(node.to_string(), Arc::clone(&snapshot));
        self.inner.stats.record_set();
        debug!(node = %node, resources = snapshot.total_resources(), "installed snapshot");

        let Some(info) = state.status.get(node) else {
            return Ok(());
        };
        let mut st = info.state.lock().expect("status lock poisoned");

        let ids: Vec<u64> = st.watches.keys().copied().collect();
        for id in ids {
            let Some(watch) = st.watches.get(&id) else {
                continue;
            };
            let version = snapshot.version(&watch.request.type_url).to_string();
            if version == watch.request.version_info {
                continue;
            }
            debug!(
                watch = id,
                type_url = %watch.request.type_url,
                names = ?watch.request.resource_names,
                %version,
                "responding to open watch"
            );
            let resources = snapshot
                .resources(&watch.request.type_url)
                .map(SnapshotResources::entries);
            if self.respond(Some(token), &watch.request, &watch.sink, resources, &version, false)? {
                // Discard the watch; the ack re-opens it at the new version.
                st.watches.remove(&id);
            }
        }

        // Version digests are only needed by delta serving; skip the work
        // when no delta watch is open.
        if !st.delta_watches.is_empty() {
            snapshot.construct_version_map()?;
        }
        let ids: Vec<u64> = st.delta_watches.keys().copied().collect();
        for id in ids {
            let Some(watch) = st.delta_watches.get(&id) else {
                continue;
            };
            if self.respond_delta(Some(token), &snapshot, &watch.request, &watch.sink, &watch.stream)? {
                st.delta_watches.remove(&id);
            }
        }

        Ok(())
    }

    /// Get the current snapshot for a node.
    pub fn get_snapshot(&self, node: &str) -> Result<Arc<Snapshot>, XdsError> {
        let state = self.inner.state.read().expect("cache lock poisoned");
        state
            .snapshots
            .get(node)
            .cloned()
            .ok_or_else(|| XdsError::MissingSnapshot {
                node: node.to_string(),
            })
    }

    /// Remove all snapshot and status information for a node.
    ///
    /// Open watches are abandoned: their sinks are never sent to again and
    /// their cancel handles become no-ops. The embedder is expected to tear
    /// down the corresponding streams through its own path.
    pub fn clear_snapshot(&self, node: &str) {
        let mut state = self.inner.state.write().expect("cache lock poisoned");
        state.snapshots.remove(node);
        state.status.remove(node);
        self.inner.stats.record_clear();
        debug!(node = %node, "cleared snapshot");
    }

    /// Status information for a node, if the node has ever opened a watch.
    pub fn get_status_info(&self, node: &str) -> Option<Arc<StatusInfo>> {
        let state = self.inner.state.read().expect("cache lock poisoned");
        let info = state.status.get(node).cloned();
        if info.is_none() {
            trace!(node = %node, "no status info");
        }
        info
    }

    /// Node keys with an active status entry.
    pub fn get_status_keys(&self) -> Vec<String> {
        let state = self.inner.state.read().expect("cache lock poisoned");
        state.status.keys().cloned().collect()
    }

    fn next_watch_id(&self) -> u64 {
        self.inner.watch_count.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn cancel_handle(&self, node: String, watch_id: u64, kind: WatchKind) -> WatchCancel {
        let inner = Arc::clone(&self.inner);
        WatchCancel::new(move || {
            let state = inner.state.read().expect("cache lock poisoned");
            if let Some(info) = state.status.get(&node) {
                let mut st = info.state.lock().expect("status lock poisoned");
                let removed = match kind {
                    WatchKind::Sotw => st.watches.remove(&watch_id).is_some(),
                    WatchKind::Delta => st.delta_watches.remove(&watch_id).is_some(),
                };
                if removed {
                    inner.stats.record_watch_cancelled();
                    debug!(watch = watch_id, "cancelled watch");
                }
            }
        })
    }

    fn register_watch(
        &self,
        node: &str,
        info: &Arc<StatusInfo>,
        request: &Request,
        sink: ResponseSink,
    ) -> WatchCancel {
        let watch_id = self.next_watch_id();
        debug!(
            watch = watch_id,
            type_url = %request.type_url,
            names = ?request.resource_names,
            node,
            version = %request.version_info,
            "opened watch"
        );
        self.inner.stats.record_watch_opened();
        {
            let mut st = info.state.lock().expect("status lock poisoned");
            st.watches.insert(
                watch_id,
                ResponseWatch {
                    request: request.clone(),
                    sink,
                },
            );
        }
        self.cancel_handle(node.to_string(), watch_id, WatchKind::Sotw)
    }

    /// Answer a watch from the given resources.
    ///
    /// Returns `Ok(false)` when ADS mode held the response back because the
    /// request does not name every snapshot resource of the type; the
    /// client is expected to retry with a broader request.
    fn respond(
        &self,
        token: Option<&CancellationToken>,
        request: &Request,
        sink: &ResponseSink,
        resources: Option<&HashMap<String, ResourceWithTtl>>,
        version: &str,
        heartbeat: bool,
    ) -> Result<bool, XdsError> {
        if self.inner.ads && !request.resource_names.is_empty() {
            let names: HashSet<&str> = request.resource_names.iter().map(String::as_str).collect();
            if let Some(unlisted) = resources.and_then(|set| first_unlisted(&names, set)) {
                debug!(
                    type_url = %request.type_url,
                    resource = unlisted,
                    "ADS mode: request does not name all snapshot resources, holding response"
                );
                return Ok(false);
            }
        }

        if token.map_or(false, CancellationToken::is_cancelled) {
            return Err(XdsError::Cancelled);
        }

        debug!(
            type_url = %request.type_url,
            names = ?request.resource_names,
            request_version = %request.version_info,
            response_version = %version,
            heartbeat,
            "responding"
        );

        match sink.try_send(create_response(request, resources, version, heartbeat)) {
            Ok(()) => {
                self.inner.stats.record_response();
                Ok(true)
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(XdsError::SinkSendFailed {
                reason: "response channel full".to_string(),
            }),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(XdsError::SinkSendFailed {
                reason: "response channel closed".to_string(),
            }),
        }
    }

    /// Diff a snapshot against a delta watch's stream state and respond if
    /// anything changed.
    ///
    /// Returns `Ok(false)` when the stream is up to date, in which case the
    /// watch stays registered. The stream state is updated only after the
    /// response has been handed to the sink.
    fn respond_delta(
        &self,
        token: Option<&CancellationToken>,
        snapshot: &Snapshot,
        request: &DeltaRequest,
        sink: &DeltaResponseSink,
        stream: &SharedStreamState,
    ) -> Result<bool, XdsError> {
        let mut state = stream.lock().expect("stream state lock poisoned");
        let Some(diffed) = delta::diff(snapshot, &request.type_url, &state) else {
            return Ok(false);
        };

        if token.map_or(false, CancellationToken::is_cancelled) {
            return Err(XdsError::Cancelled);
        }

        debug!(
            type_url = %request.type_url,
            resources = diffed.response.resources.len(),
            removed = diffed.response.removed_resources.len(),
            version = %diffed.response.system_version_info,
            "responding to delta watch"
        );

        match sink.try_send(diffed.response) {
            Ok(()) => {
                for (name, version) in diffed.delivered {
                    state.mark_delivered(name, version);
                }
                for name in &diffed.removed {
                    state.forget(name);
                }
                self.inner.stats.record_delta_response();
                Ok(true)
            }
            Err(mpsc::error::TrySendError::Full(_)) => Err(XdsError::SinkSendFailed {
                reason: "delta response channel full".to_string(),
            }),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(XdsError::SinkSendFailed {
                reason: "delta response channel closed".to_string(),
            }),
        }
    }

    /// One heartbeat pass over every node with open watches.
    fn send_heartbeats(&self, token: &CancellationToken) {
        let state = self.inner.state.write().expect("cache lock poisoned");
        for (node, info) in &state.status {
            let Some(snapshot) = state.snapshots.get(node) else {
                continue;
            };
            let mut st = info.state.lock().expect("status lock poisoned");
            let mut delivered = Vec::new();
            for (&id, watch) in st.watches.iter() {
                // Respond with the current version whether or not it changed;
                // the point is to refresh the TTL clock on the client.
                let version = snapshot.version(&watch.request.type_url).to_string();
                // TODO: build the TTL subset once per type instead of once per watch.
                let ttl_resources: HashMap<String, ResourceWithTtl> = snapshot
                    .resources(&watch.request.type_url)
                    .map(|set| {
                        set.iter()
                            .filter(|(_, entry)| entry.ttl().is_some())
                            .map(|(name, entry)| (name.clone(), entry.clone()))
                            .collect()
                    })
                    .unwrap_or_default();
                if ttl_resources.is_empty() {
                    continue;
                }

                debug!(watch = id, node = %node, %version, "responding with heartbeat");
                match self.respond(
                    Some(token),
                    &watch.request,
                    &watch.sink,
                    Some(&ttl_resources),
                    &version,
                    true,
                ) {
                    Ok(true) => {
                        self.inner.stats.record_heartbeat();
                        // The client is expected to ack this response, which
                        // re-establishes the watch.
                        delivered.push(id);
                    }
                    Ok(false) => {}
                    Err(err) => warn!(watch = id, error = %err, "failed to send heartbeat"),
                }
            }
            for id in delivered {
                st.watches.remove(&id);
            }
        }
    }
}

impl Cache for SnapshotCache {
    fn create_watch(
        &self,
        request: &Request,
        stream: &StreamState,
        sink: ResponseSink,
    ) -> WatchCancel {
        let node = self.inner.hash.id(&request.node);
        let mut state = self.inner.state.write().expect("cache lock poisoned");

        let info = Arc::clone(
            state
                .status
                .entry(node.clone())
                .or_insert_with(|| Arc::new(StatusInfo::new(request.node.clone()))),
        );
        {
            let mut st = info.state.lock().expect("status lock poisoned");
            st.last_watch_request_time = Some(SystemTime::now());
        }

        let snapshot = state.snapshots.get(&node).cloned();
        let version = snapshot
            .as_ref()
            .map(|snap| snap.version(&request.type_url).to_string())
            .unwrap_or_default();

        if let Some(snap) = &snapshot {
            // A client may ask for a resource it does not have yet while its
            // acknowledged version already matches ours; without this path
            // the watch would sit idle until the next real version bump.
            let known = stream.known_resource_names(&request.type_url);
            if let Some(resources) = snap.resources(&request.type_url) {
                let wants_new = request
                    .resource_names
                    .iter()
                    .filter(|name| known.map_or(true, |set| !set.contains(name.as_str())))
                    .any(|name| resources.contains(name));
                if wants_new {
                    trace!(
                        node = %node,
                        type_url = %request.type_url,
                        names = ?request.resource_names,
                        "request names resources the stream does not know yet"
                    );
                    match self.respond(None, request, &sink, Some(resources.entries()), &version, false)
                    {
                        Ok(true) => return WatchCancel::noop(),
                        // ADS held the response; fall through to an open watch.
                        Ok(false) => {}
                        Err(err) => {
                            warn!(node = %node, error = %err, "failed to send response");
                            return WatchCancel::noop();
                        }
                    }
                }
            }
        }

        match &snapshot {
            // The snapshot has something newer than the client: answer now.
            Some(snap) if request.version_info != version => {
                let resources = snap
                    .resources(&request.type_url)
                    .map(SnapshotResources::entries);
                match self.respond(None, request, &sink, resources, &version, false) {
                    Ok(true) => WatchCancel::noop(),
                    // ADS held the response; leave the watch open instead.
                    Ok(false) => self.register_watch(&node, &info, request, sink),
                    Err(err) => {
                        warn!(node = %node, error = %err, "failed to send response");
                        WatchCancel::noop()
                    }
                }
            }
            // Missing snapshot or up-to-date client: leave an open watch.
            _ => self.register_watch(&node, &info, request, sink),
        }
    }

    fn create_delta_watch(
        &self,
        request: &DeltaRequest,
        stream: SharedStreamState,
        sink: DeltaResponseSink,
    ) -> WatchCancel {
        let node = self.inner.hash.id(&request.node);
        let mut state = self.inner.state.write().expect("cache lock poisoned");

        let info = Arc::clone(
            state
                .status
                .entry(node.clone())
                .or_insert_with(|| Arc::new(StatusInfo::new(request.node.clone()))),
        );
        {
            let mut st = info.state.lock().expect("status lock poisoned");
            st.last_delta_watch_request_time = Some(SystemTime::now());
        }

        {
            let mut s = stream.lock().expect("stream state lock poisoned");
            // A first request naming nothing subscribes to everything.
            if request.resource_names_subscribe.is_empty()
                && request.resource_names_unsubscribe.is_empty()
                && s.subscribed().is_empty()
                && !s.wildcard()
            {
                s.set_wildcard(true);
            }
            s.subscribe(request.resource_names_subscribe.iter().cloned());
            s.unsubscribe(request.resource_names_unsubscribe.iter().cloned());
        }

        if let Some(snapshot) = state.snapshots.get(&node) {
            match snapshot.construct_version_map() {
                Ok(()) => match self.respond_delta(None, snapshot, request, &sink, &stream) {
                    Ok(true) => return WatchCancel::noop(),
                    Ok(false) => {}
                    Err(err) => {
                        warn!(node = %node, error = %err, "failed to send delta response");
                        return WatchCancel::noop();
                    }
                },
                Err(err) => warn!(node = %node, error = %err, "failed to build version map"),
            }
        }

        let watch_id = self.next_watch_id();
        debug!(
            watch = watch_id,
            type_url = %request.type_url,
            subscribe = ?request.resource_names_subscribe,
            node = %node,
            "opened delta watch"
        );
        self.inner.stats.record_watch_opened();
        {
            let mut st = info.state.lock().expect("status lock poisoned");
            st.delta_watches.insert(
                watch_id,
                DeltaWatch {
                    request: request.clone(),
                    sink,
                    stream,
                },
            );
        }
        self.cancel_handle(node, watch_id, WatchKind::Delta)
    }

    fn fetch(&self, token: &CancellationToken, request: &Request) -> Result<Response, XdsError> {
        let node = self.inner.hash.id(&request.node);
        let state = self.inner.state.read().expect("cache lock poisoned");

        let Some(snapshot) = state.snapshots.get(&node) else {
            return Err(XdsError::MissingSnapshot { node });
        };

        // Respond only if the request version differs from the snapshot.
        // The client will re-attempt the refresh on its own schedule.
        let version = snapshot.version(&request.type_url);
        if request.version_info == version {
            trace!(node = %node, type_url = %request.type_url, "skip fetch: version up to date");
            self.inner.stats.record_fetch_skipped();
            return Err(XdsError::SkipFetch);
        }

        if token.is_cancelled() {
            return Err(XdsError::Cancelled);
        }

        let resources = snapshot
            .resources(&request.type_url)
            .map(SnapshotResources::entries);
        self.inner.stats.record_fetch_served();
        Ok(create_response(request, resources, version, false))
    }
}

/// First snapshot resource not named by the request, if any.
fn first_unlisted<'a>(
    names: &HashSet<&str>,
    resources: &'a HashMap<String, ResourceWithTtl>,
) -> Option<&'a str> {
    resources
        .keys()
        .find(|name| !names.contains(name.as_str()))
        .map(String::as_str)
}

/// Build a response from the requested subset of resources.
///
/// A non-empty name list selects the intersection with the snapshot; a
/// client may ask for each resource individually on separate streams, and
/// replying with the same version on each is fine since streams do not
/// share response versions.
fn create_response(
    request: &Request,
    resources: Option<&HashMap<String, ResourceWithTtl>>,
    version: &str,
    heartbeat: bool,
) -> Response {
    let filtered = match resources {
        None => Vec::new(),
        Some(set) if request.resource_names.is_empty() => set.values().cloned().collect(),
        Some(set) => {
            let names: HashSet<&str> = request.resource_names.iter().map(String::as_str).collect();
            set.iter()
                .filter(|(name, _)| names.contains(name.as_str()))
                .map(|(_, entry)| entry.clone())
                .collect()
        }
    };

    Response {
        request: request.clone(),
        version: version.to_string(),
        resources: filtered,
        heartbeat,
    }
}
