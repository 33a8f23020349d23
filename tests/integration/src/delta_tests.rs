//! Delta serving against shared stream state.

use std::sync::Arc;

use keel_xds::prelude::*;

use crate::common::*;

#[test]
fn wildcard_stream_lifecycle() {
    let cache = SnapshotCache::new(false, IdHash);
    cache
        .set_snapshot(
            &token(),
            "node-a",
            snapshot("1", &[("r1", b"one"), ("r2", b"two")]),
        )
        .expect("set snapshot");

    let stream = shared(StreamState::default());
    let (tx, mut rx) = delta_sink(2);

    // Empty first request subscribes to everything and drains the snapshot.
    let cancel = cache.create_delta_watch(&delta_request("node-a", &[]), Arc::clone(&stream), tx.clone());
    assert!(cancel.is_noop());
    let initial = rx.try_recv().expect("initial delta response");
    assert_eq!(initial.resources.len(), 2);
    assert_eq!(initial.system_version_info, "1");
    assert!(initial.removed_resources.is_empty());

    // Up to date: the next watch parks.
    let cancel = cache.create_delta_watch(&delta_request("node-a", &[]), Arc::clone(&stream), tx);
    assert!(!cancel.is_noop());
    assert_eq!(
        cache
            .get_status_info("node-a")
            .expect("status")
            .num_delta_watches(),
        1
    );

    // Dropping r2 answers the parked watch with a removal only.
    cache
        .set_snapshot(&token(), "node-a", snapshot("2", &[("r1", b"one")]))
        .expect("shrink snapshot");
    let update = rx.try_recv().expect("delta update");
    assert!(update.resources.is_empty());
    assert_eq!(update.removed_resources, vec!["r2".to_string()]);
    assert_eq!(
        cache
            .get_status_info("node-a")
            .expect("status")
            .num_delta_watches(),
        0
    );

    // The stream no longer tracks r2.
    assert!(stream.lock().expect("stream").delivered_version("r2").is_none());
}

#[test]
fn explicit_subscription_bounds_the_diff() {
    let cache = SnapshotCache::new(false, IdHash);
    cache
        .set_snapshot(
            &token(),
            "node-a",
            snapshot("1", &[("r1", b"one"), ("r2", b"two")]),
        )
        .expect("set snapshot");

    let stream = shared(StreamState::default());
    let (tx, mut rx) = delta_sink(1);

    cache
        .create_delta_watch(&delta_request("node-a", &["r1"]), Arc::clone(&stream), tx)
        .cancel();

    let response = rx.try_recv().expect("subscribed delta response");
    assert_eq!(response.resources.len(), 1);
    assert_eq!(response.resources[0].name, "r1");
    assert!(
        !stream.lock().expect("stream").wildcard(),
        "an explicit subscription never becomes wildcard"
    );
}

#[test]
fn unchanged_payload_is_not_redelivered() {
    let cache = SnapshotCache::new(false, IdHash);
    cache
        .set_snapshot(&token(), "node-a", snapshot("1", &[("r1", b"one")]))
        .expect("set snapshot");

    let stream = shared(StreamState::default());
    let (tx, mut rx) = delta_sink(2);
    cache
        .create_delta_watch(&delta_request("node-a", &[]), Arc::clone(&stream), tx.clone())
        .cancel();
    let _ = rx.try_recv().expect("initial delta response");

    let _cancel = cache.create_delta_watch(&delta_request("node-a", &[]), Arc::clone(&stream), tx);

    // New type version, identical payload digest: the watch stays parked.
    cache
        .set_snapshot(&token(), "node-a", snapshot("2", &[("r1", b"one")]))
        .expect("reinstall");
    assert!(rx.try_recv().is_err());

    // An actual payload change goes through.
    cache
        .set_snapshot(&token(), "node-a", snapshot("3", &[("r1", b"changed")]))
        .expect("update");
    let response = rx.try_recv().expect("payload change delivered");
    assert_eq!(response.resources.len(), 1);
    assert_eq!(response.system_version_info, "3");
}

#[test]
fn unsubscribe_forgets_the_resource() {
    let cache = SnapshotCache::new(false, IdHash);
    cache
        .set_snapshot(
            &token(),
            "node-a",
            snapshot("1", &[("r1", b"one"), ("r2", b"two")]),
        )
        .expect("set snapshot");

    let stream = shared(StreamState::default());
    let (tx, mut rx) = delta_sink(2);
    cache
        .create_delta_watch(
            &delta_request("node-a", &["r1", "r2"]),
            Arc::clone(&stream),
            tx.clone(),
        )
        .cancel();
    let _ = rx.try_recv().expect("initial delta response");

    let unsubscribe = DeltaRequest {
        resource_names_unsubscribe: vec!["r2".to_string()],
        ..delta_request("node-a", &[])
    };
    let _cancel = cache.create_delta_watch(&unsubscribe, Arc::clone(&stream), tx);

    {
        let state = stream.lock().expect("stream");
        assert!(!state.is_subscribed("r2"));
        assert!(state.delivered_version("r2").is_none());
    }

    // A change to the unsubscribed resource wakes nothing.
    cache
        .set_snapshot(
            &token(),
            "node-a",
            snapshot("2", &[("r1", b"one"), ("r2", b"two-changed")]),
        )
        .expect("update");
    assert!(rx.try_recv().is_err());
}
