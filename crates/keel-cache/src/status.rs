//! Per-node status: open watch tables and request timestamps.
//!
//! A status entry is created lazily on a node's first watch and removed
//! only by an explicit snapshot clear. Cancelling the last watch keeps the
//! entry so `last_watch_request_time` stays available for diagnostics.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

use keel_core::Node;

use crate::types::{DeltaWatch, ResponseWatch};

/// Watch tables and timestamps guarded by the status entry's inner lock.
///
/// Lock order is always cache → status; the cache lock is never taken
/// while a status lock is held.
#[derive(Debug, Default)]
pub(crate) struct StatusState {
    pub(crate) watches: HashMap<u64, ResponseWatch>,
    pub(crate) delta_watches: HashMap<u64, DeltaWatch>,
    pub(crate) last_watch_request_time: Option<SystemTime>,
    pub(crate) last_delta_watch_request_time: Option<SystemTime>,
}

/// Status information for a single node.
///
/// Handed out as `Arc<StatusInfo>` by
/// [`SnapshotCache::get_status_info`](crate::SnapshotCache::get_status_info);
/// accessors take the inner lock briefly, so a held handle never pins the
/// cache lock.
#[derive(Debug)]
pub struct StatusInfo {
    node: Node,
    pub(crate) state: Mutex<StatusState>,
}

impl StatusInfo {
    pub(crate) fn new(node: Node) -> Self {
        Self {
            node,
            state: Mutex::new(StatusState::default()),
        }
    }

    /// The node descriptor this status belongs to.
    #[inline]
    pub fn node(&self) -> &Node {
        &self.node
    }

    /// Number of open state-of-the-world watches.
    pub fn num_watches(&self) -> usize {
        self.state.lock().expect("status lock poisoned").watches.len()
    }

    /// Number of open delta watches.
    pub fn num_delta_watches(&self) -> usize {
        self.state
            .lock()
            .expect("status lock poisoned")
            .delta_watches
            .len()
    }

    /// When the node last opened a state-of-the-world watch.
    pub fn last_watch_request_time(&self) -> Option<SystemTime> {
        self.state
            .lock()
            .expect("status lock poisoned")
            .last_watch_request_time
    }

    /// When the node last opened a delta watch.
    pub fn last_delta_watch_request_time(&self) -> Option<SystemTime> {
        self.state
            .lock()
            .expect("status lock poisoned")
            .last_delta_watch_request_time
    }
}
