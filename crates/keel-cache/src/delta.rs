//! Delta diffing against per-connection stream state.
//!
//! The responder compares the snapshot's per-resource version map with the
//! versions a stream was last delivered. Resources the stream never
//! subscribed to are never included; removals are bounded by what the
//! stream actually tracks.

use keel_core::TypeUrl;

use crate::snapshot::Snapshot;
use crate::stream::StreamState;
use crate::types::{DeltaResource, DeltaResponse};

/// The outcome of a delta diff: the response to send plus the stream-state
/// updates to apply once the send succeeds.
#[derive(Debug)]
pub(crate) struct DeltaDiff {
    pub(crate) response: DeltaResponse,
    /// (name, version) pairs to record as delivered.
    pub(crate) delivered: Vec<(String, String)>,
    /// Names to forget.
    pub(crate) removed: Vec<String>,
}

/// Diff a snapshot against a stream's known state.
///
/// Returns `None` when the stream is already up to date. The caller must
/// have built the snapshot's version map; a type missing from the map is
/// treated as absent from the snapshot.
pub(crate) fn diff(
    snapshot: &Snapshot,
    type_url: &TypeUrl,
    state: &StreamState,
) -> Option<DeltaDiff> {
    let resources = snapshot.resources(type_url);
    let version_map = snapshot.version_map(type_url);

    let mut changed = Vec::new();
    if let (Some(resources), Some(version_map)) = (resources, version_map) {
        for (name, entry) in resources.iter() {
            if !state.is_subscribed(name) {
                continue;
            }
            let Some(version) = version_map.get(name) else {
                continue;
            };
            let up_to_date = state
                .delivered_version(name)
                .map_or(false, |last| version.matches(last));
            if !up_to_date {
                changed.push(DeltaResource {
                    name: name.clone(),
                    version: version.as_str().to_string(),
                    resource: entry.resource().clone(),
                });
            }
        }
    }

    let mut removed: Vec<String> = state
        .resource_versions()
        .keys()
        .filter(|name| state.is_subscribed(name))
        .filter(|name| resources.map_or(true, |set| !set.contains(name)))
        .cloned()
        .collect();

    if changed.is_empty() && removed.is_empty() {
        return None;
    }

    removed.sort_unstable();
    let delivered = changed
        .iter()
        .map(|r| (r.name.clone(), r.version.clone()))
        .collect();

    Some(DeltaDiff {
        response: DeltaResponse {
            type_url: type_url.clone(),
            system_version_info: snapshot.version(type_url).to_string(),
            resources: changed,
            removed_resources: removed.clone(),
        },
        delivered,
        removed,
    })
}
