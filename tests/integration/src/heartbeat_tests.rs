//! Heartbeat loop behavior.

use std::time::Duration;

use keel_xds::prelude::*;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::common::*;

#[tokio::test]
async fn heartbeat_refreshes_ttl_resources() {
    let stop = CancellationToken::new();
    let cache =
        SnapshotCache::with_heartbeating(stop.clone(), false, IdHash, Duration::from_millis(100));

    let snap = Snapshot::builder()
        .version("1")
        .resources(
            cluster(),
            vec![
                ttl_resource("r-ttl", b"beating", Duration::from_secs(30)),
                resource("r-plain", b"quiet"),
            ],
        )
        .build();
    cache
        .set_snapshot(&token(), "node-a", snap)
        .expect("set snapshot");

    let (tx, mut rx) = response_sink(1);
    let _cancel = cache.create_watch(&request("node-a", "1", &[]), &StreamState::default(), tx);

    let response = timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("heartbeat within deadline")
        .expect("channel open");

    assert!(response.heartbeat);
    assert_eq!(response.version, "1", "version is unchanged on purpose");
    assert_eq!(response.resources.len(), 1, "only TTL resources are sent");
    assert_eq!(response.resources[0].name(), "r-ttl");
    assert_eq!(
        cache.get_status_info("node-a").expect("status").num_watches(),
        0,
        "the client re-arms the watch by acking"
    );

    stop.cancel();
}

#[tokio::test]
async fn heartbeat_ack_cycle_rearms_the_watch() {
    let stop = CancellationToken::new();
    let cache =
        SnapshotCache::with_heartbeating(stop.clone(), false, IdHash, Duration::from_millis(100));

    let snap = Snapshot::builder()
        .version("1")
        .resources(
            cluster(),
            vec![ttl_resource("r-ttl", b"beating", Duration::from_secs(30))],
        )
        .build();
    cache
        .set_snapshot(&token(), "node-a", snap)
        .expect("set snapshot");

    // Two full heartbeat → ack rounds, the way a client would drive them.
    for _ in 0..2 {
        let (tx, mut rx) = response_sink(1);
        let _cancel =
            cache.create_watch(&request("node-a", "1", &[]), &StreamState::default(), tx);

        let response = timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("heartbeat within deadline")
            .expect("channel open");
        assert!(response.heartbeat);
    }

    stop.cancel();
}

#[tokio::test]
async fn cancellation_stops_the_loop() {
    let stop = CancellationToken::new();
    let cache =
        SnapshotCache::with_heartbeating(stop.clone(), false, IdHash, Duration::from_millis(50));

    let snap = Snapshot::builder()
        .version("1")
        .resources(
            cluster(),
            vec![ttl_resource("r-ttl", b"beating", Duration::from_secs(30))],
        )
        .build();
    cache
        .set_snapshot(&token(), "node-a", snap)
        .expect("set snapshot");

    stop.cancel();
    // Give the loop a moment to observe the cancellation.
    tokio::time::sleep(Duration::from_millis(150)).await;

    let (tx, mut rx) = response_sink(1);
    let _cancel = cache.create_watch(&request("node-a", "1", &[]), &StreamState::default(), tx);

    let waited = timeout(Duration::from_millis(300), rx.recv()).await;
    assert!(waited.is_err(), "no heartbeats after cancellation");
}
