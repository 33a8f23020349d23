//! State-of-the-world serving, fetches, and lifecycle.

use keel_xds::prelude::*;

use crate::common::*;

#[test]
fn cold_start() {
    let cache = SnapshotCache::new(false, IdHash);
    cache
        .set_snapshot(&token(), "node-a", snapshot("1", &[("r1", b"one")]))
        .expect("set snapshot");

    let (tx, mut rx) = response_sink(1);
    let cancel = cache.create_watch(&request("node-a", "", &[]), &StreamState::default(), tx);
    assert!(cancel.is_noop());

    let response = rx.try_recv().expect("immediate response");
    assert_eq!(response.version, "1");
    assert_eq!(response.resources.len(), 1);
    assert_eq!(response.resources[0].name(), "r1");
}

#[test]
fn open_then_update() {
    let cache = SnapshotCache::new(false, IdHash);

    let (tx, mut rx) = response_sink(1);
    let cancel = cache.create_watch(&request("node-a", "", &[]), &StreamState::default(), tx);
    assert!(!cancel.is_noop());
    assert!(rx.try_recv().is_err(), "watch is pending");

    cache
        .set_snapshot(&token(), "node-a", snapshot("1", &[("r1", b"one")]))
        .expect("set snapshot");

    let response = rx.try_recv().expect("install answers the watch");
    assert_eq!(response.version, "1");
    assert_eq!(
        cache.get_status_info("node-a").expect("status").num_watches(),
        0
    );
}

#[test]
fn no_op_reinstall() {
    let cache = SnapshotCache::new(false, IdHash);
    cache
        .set_snapshot(&token(), "node-a", snapshot("1", &[("r1", b"one")]))
        .expect("set snapshot");

    let (tx, mut rx) = response_sink(1);
    let _cancel = cache.create_watch(&request("node-a", "1", &[]), &StreamState::default(), tx);

    cache
        .set_snapshot(&token(), "node-a", snapshot("1", &[("r1", b"one")]))
        .expect("reinstall");

    assert!(rx.try_recv().is_err(), "same version emits nothing");
    assert_eq!(
        cache.get_status_info("node-a").expect("status").num_watches(),
        1
    );
}

#[test]
fn ads_suppression() {
    let cache = SnapshotCache::new(true, IdHash);
    cache
        .set_snapshot(
            &token(),
            "node-a",
            snapshot("2", &[("r1", b"one"), ("r2", b"two")]),
        )
        .expect("set snapshot");

    let (tx, mut rx) = response_sink(1);
    let _cancel = cache.create_watch(
        &request("node-a", "1", &["r1"]),
        &StreamState::default(),
        tx,
    );

    assert!(rx.try_recv().is_err(), "partial request is held");
    assert_eq!(
        cache.get_status_info("node-a").expect("status").num_watches(),
        1,
        "the held watch stays open"
    );

    // A broader retry naming everything is answered.
    let (tx, mut rx) = response_sink(1);
    let cancel = cache.create_watch(
        &request("node-a", "1", &["r1", "r2"]),
        &StreamState::default(),
        tx,
    );
    assert!(cancel.is_noop());
    assert_eq!(rx.try_recv().expect("broad retry answered").version, "2");
}

#[test]
fn subset_fast_path() {
    let cache = SnapshotCache::new(false, IdHash);
    cache
        .set_snapshot(
            &token(),
            "node-a",
            snapshot("1", &[("r1", b"one"), ("r2", b"two")]),
        )
        .expect("set snapshot");

    let mut stream = StreamState::default();
    stream.add_known_resource_names(&cluster(), ["r1".to_string()]);

    let (tx, mut rx) = response_sink(1);
    let cancel = cache.create_watch(&request("node-a", "1", &["r1", "r2"]), &stream, tx);
    assert!(cancel.is_noop());

    let response = rx.try_recv().expect("fast-path response");
    assert_eq!(response.version, "1");
    let mut names: Vec<&str> = response.resources.iter().map(ResourceWithTtl::name).collect();
    names.sort_unstable();
    assert_eq!(names, vec!["r1", "r2"]);
}

#[test]
fn set_snapshot_trigger_law() {
    // A watch registered at v0 gets exactly one response at v1.
    let cache = SnapshotCache::new(false, IdHash);
    cache
        .set_snapshot(&token(), "node-a", snapshot("v0", &[("r1", b"one")]))
        .expect("set v0");

    let (tx, mut rx) = response_sink(2);
    let _cancel = cache.create_watch(&request("node-a", "v0", &[]), &StreamState::default(), tx);

    cache
        .set_snapshot(&token(), "node-a", snapshot("v1", &[("r1", b"one'")]))
        .expect("set v1");

    assert_eq!(rx.try_recv().expect("one response").version, "v1");
    assert!(rx.try_recv().is_err(), "exactly one response");
}

#[test]
fn fetch_idempotence_on_stable_snapshot() {
    let cache = SnapshotCache::new(false, IdHash);
    cache
        .set_snapshot(&token(), "node-a", snapshot("1", &[("r1", b"one")]))
        .expect("set snapshot");

    for _ in 0..2 {
        assert!(matches!(
            cache.fetch(&token(), &request("node-a", "1", &[])),
            Err(XdsError::SkipFetch)
        ));
    }

    let response = cache
        .fetch(&token(), &request("node-a", "0", &[]))
        .expect("stale version fetches");
    assert_eq!(response.version, "1");
}

#[test]
fn fetch_missing_snapshot() {
    let cache = SnapshotCache::new(false, IdHash);
    assert!(matches!(
        cache.fetch(&token(), &request("nobody", "", &[])),
        Err(XdsError::MissingSnapshot { .. })
    ));
}

#[test]
fn non_ads_responses_respect_request_names() {
    let cache = SnapshotCache::new(false, IdHash);
    cache
        .set_snapshot(
            &token(),
            "node-a",
            snapshot("2", &[("r1", b"one"), ("r2", b"two"), ("r3", b"three")]),
        )
        .expect("set snapshot");

    let (tx, mut rx) = response_sink(1);
    cache
        .create_watch(&request("node-a", "1", &["r2"]), &StreamState::default(), tx)
        .cancel();

    let response = rx.try_recv().expect("response");
    assert_eq!(response.resources.len(), 1);
    assert_eq!(response.resources[0].name(), "r2");
}

#[test]
fn clear_snapshot_drops_node_entirely() {
    let cache = SnapshotCache::new(false, IdHash);
    cache
        .set_snapshot(&token(), "node-a", snapshot("1", &[("r1", b"one")]))
        .expect("set snapshot");

    let (tx, mut rx) = response_sink(1);
    let cancel = cache.create_watch(&request("node-a", "1", &[]), &StreamState::default(), tx);

    cache.clear_snapshot("node-a");
    assert!(cache.get_snapshot("node-a").is_err());
    assert!(cache.get_status_info("node-a").is_none());
    assert!(cache.get_status_keys().is_empty());

    // Abandoned watches are silent and their handles are harmless.
    cache
        .set_snapshot(&token(), "node-a", snapshot("2", &[("r1", b"two")]))
        .expect("reinstall after clear");
    assert!(rx.try_recv().is_err());
    cancel.cancel();
}

#[test]
fn status_survives_watch_cancellation() {
    let cache = SnapshotCache::new(false, IdHash);

    let (tx, _rx) = response_sink(1);
    let cancel = cache.create_watch(&request("node-a", "", &[]), &StreamState::default(), tx);
    cancel.cancel();

    let info = cache.get_status_info("node-a").expect("status entry kept");
    assert_eq!(info.num_watches(), 0);
    assert!(info.last_watch_request_time().is_some());
}

#[test]
fn concurrent_installs_and_watches() {
    use std::sync::Arc;
    use std::thread;

    let cache = Arc::new(SnapshotCache::new(false, IdHash));
    let mut handles = Vec::new();

    // One producer per node, one churning consumer per node.
    for n in 0..4 {
        let producer = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            let node = format!("node-{n}");
            for v in 0..20 {
                producer
                    .set_snapshot(
                        &token(),
                        &node,
                        snapshot(&format!("v{v}"), &[("r1", b"payload")]),
                    )
                    .expect("set snapshot");
            }
        }));

        let consumer = Arc::clone(&cache);
        handles.push(thread::spawn(move || {
            let node = format!("node-{n}");
            for _ in 0..20 {
                let (tx, mut rx) = response_sink(1);
                let cancel =
                    consumer.create_watch(&request(&node, "", &[]), &StreamState::default(), tx);
                if cancel.is_noop() {
                    let response = rx.try_recv().expect("noop handle implies a response");
                    assert!(!response.version.is_empty());
                }
                cancel.cancel();
            }
        }));
    }

    for handle in handles {
        handle.join().expect("no thread panics");
    }

    // Every node ends at the final version.
    for n in 0..4 {
        let snap = cache.get_snapshot(&format!("node-{n}")).expect("snapshot");
        assert_eq!(snap.version(&cluster()), "v19");
    }
}
