//! Tests for the broadcast hub

use super::*;
use crate::config::HubConfig;
use crate::events::{EventEnvelope, EventKind};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn small_hub(max_connections: usize) -> BroadcastHub {
    BroadcastHub::new(HubConfig::default().with_max_connections(max_connections))
}

#[tokio::test]
async fn test_attach_greets_subscriber() {
    let hub = BroadcastHub::default();
    let (id, mut rx) = hub.attach().expect("attach failed");

    let greeting = rx.recv().await.expect("no greeting");
    let envelope: EventEnvelope = serde_json::from_str(&greeting).unwrap();
    assert_eq!(envelope.event_type, EventKind::Connected);
    assert_eq!(envelope.payload["connection_id"], json!(id.0));
}

#[tokio::test]
async fn test_attach_rejects_at_capacity() {
    let hub = small_hub(3);

    let mut receivers = Vec::new();
    for _ in 0..3 {
        receivers.push(hub.attach().expect("attach failed"));
    }

    let overflow = hub.attach();
    assert!(matches!(overflow, Err(HubError::AtCapacity { limit: 3 })));
    assert_eq!(hub.connection_count(), 3);
}

#[tokio::test]
async fn test_attach_at_full_scale() {
    let hub = small_hub(1000);

    let mut receivers = Vec::with_capacity(1000);
    for _ in 0..1000 {
        receivers.push(hub.attach().expect("attach failed"));
    }

    assert!(matches!(
        hub.attach(),
        Err(HubError::AtCapacity { limit: 1000 })
    ));
    assert_eq!(hub.connection_count(), 1000);
}

#[tokio::test]
async fn test_detach_is_idempotent() {
    let hub = BroadcastHub::default();
    let (id, _rx) = hub.attach().expect("attach failed");

    assert!(hub.detach(id));
    assert!(!hub.detach(id));
    assert!(!hub.detach(ConnectionId(9999)));
}

#[tokio::test]
async fn test_detach_frees_capacity() {
    let hub = small_hub(1);
    let (id, _rx) = hub.attach().expect("attach failed");
    assert!(hub.attach().is_err());

    hub.detach(id);
    assert!(hub.attach().is_ok());
}

#[tokio::test]
async fn test_send_to_unknown_connection_returns_false() {
    let hub = BroadcastHub::default();
    assert!(!hub.send_to(ConnectionId(42), "hello"));
}

#[tokio::test]
async fn test_send_failure_evicts_at_ceiling() {
    let hub = BroadcastHub::new(HubConfig::default().with_error_ceiling(5));
    let (id, rx) = hub.attach().expect("attach failed");

    // closing the receiver makes every send fail
    drop(rx);

    for attempt in 1..=4 {
        assert!(!hub.send_to(id, "msg"), "attempt {attempt} should fail");
        assert!(hub.is_attached(id), "still attached after {attempt} failures");
    }

    // the 5th consecutive failure crosses the ceiling
    assert!(!hub.send_to(id, "msg"));
    assert!(!hub.is_attached(id));

    // evicted connections no longer subscribe or appear in snapshots
    assert!(!hub.subscribe(id, Subscription::All));
    assert_eq!(hub.broadcast_all("after"), 0);
}

#[tokio::test]
async fn test_successful_send_resets_error_counter() {
    let hub = BroadcastHub::new(HubConfig::default().with_error_ceiling(2));
    let (id, mut rx) = hub.attach().expect("attach failed");

    // drain the greeting
    let _ = rx.recv().await;

    assert!(hub.send_to(id, "one"));
    assert_eq!(rx.recv().await.as_deref(), Some("one"));

    // a failure after successes starts the count from zero again
    drop(rx);
    assert!(!hub.send_to(id, "two"));
    assert!(hub.is_attached(id));
    assert!(!hub.send_to(id, "three"));
    assert!(!hub.is_attached(id));
}

#[tokio::test]
async fn test_broadcast_isolation_between_jobs() {
    let hub = BroadcastHub::default();
    let (only_x, mut rx_x) = hub.attach().expect("attach failed");
    let (only_y, mut rx_y) = hub.attach().expect("attach failed");
    let (all, mut rx_all) = hub.attach().expect("attach failed");

    // drain greetings
    let _ = rx_x.recv().await;
    let _ = rx_y.recv().await;
    let _ = rx_all.recv().await;

    assert!(hub.subscribe(only_x, Subscription::Job("job-x".into())));
    assert!(hub.subscribe(only_y, Subscription::Job("job-y".into())));
    assert!(hub.subscribe(all, Subscription::All));

    let delivered = hub.broadcast_to_job("job-x", "x-event");
    assert_eq!(delivered, 2);

    assert_eq!(rx_x.recv().await.as_deref(), Some("x-event"));
    assert_eq!(rx_all.recv().await.as_deref(), Some("x-event"));
    assert!(rx_y.try_recv().is_err());
}

#[tokio::test]
async fn test_unsubscribe_stops_delivery() {
    let hub = BroadcastHub::default();
    let (id, mut rx) = hub.attach().expect("attach failed");
    let _ = rx.recv().await;

    hub.subscribe(id, Subscription::Job("job-x".into()));
    assert_eq!(hub.broadcast_to_job("job-x", "first"), 1);

    hub.unsubscribe(id, Subscription::Job("job-x".into()));
    assert_eq!(hub.broadcast_to_job("job-x", "second"), 0);

    assert_eq!(rx.recv().await.as_deref(), Some("first"));
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn test_broadcast_all_reaches_every_connection() {
    let hub = BroadcastHub::default();
    let (_a, mut rx_a) = hub.attach().expect("attach failed");
    let (_b, mut rx_b) = hub.attach().expect("attach failed");
    let _ = rx_a.recv().await;
    let _ = rx_b.recv().await;

    assert_eq!(hub.broadcast_all("everyone"), 2);
    assert_eq!(rx_a.recv().await.as_deref(), Some("everyone"));
    assert_eq!(rx_b.recv().await.as_deref(), Some("everyone"));
}

#[tokio::test]
async fn test_evict_stale_idle_connections() {
    let hub = BroadcastHub::new(
        HubConfig::default()
            .with_idle_timeout(Duration::from_millis(20))
            .with_max_age(Duration::from_secs(3600)),
    );
    let (idle, _rx_idle) = hub.attach().expect("attach failed");
    let (fresh, _rx_fresh) = hub.attach().expect("attach failed");

    tokio::time::sleep(Duration::from_millis(40)).await;
    hub.touch(fresh);

    let evicted = hub.evict_stale();
    assert_eq!(evicted, 1);
    assert!(!hub.is_attached(idle));
    assert!(hub.is_attached(fresh));
}

#[tokio::test]
async fn test_evict_stale_never_signalled() {
    let hub = BroadcastHub::new(
        HubConfig::default()
            .with_idle_timeout(Duration::from_secs(3600))
            .with_max_age(Duration::from_millis(20)),
    );
    let (silent, _rx) = hub.attach().expect("attach failed");

    tokio::time::sleep(Duration::from_millis(40)).await;

    assert_eq!(hub.evict_stale(), 1);
    assert!(!hub.is_attached(silent));
}

#[tokio::test]
async fn test_touch_keeps_connection_alive() {
    let hub = BroadcastHub::new(HubConfig::default().with_max_age(Duration::from_millis(30)));
    let (id, _rx) = hub.attach().expect("attach failed");

    tokio::time::sleep(Duration::from_millis(15)).await;
    assert!(hub.touch(id));
    tokio::time::sleep(Duration::from_millis(25)).await;

    // last_seen moved past created_at, so the no-liveness rule no longer
    // applies and the idle timeout (still default) has not elapsed
    assert_eq!(hub.evict_stale(), 0);
    assert!(hub.is_attached(id));
}

#[tokio::test]
async fn test_sweeper_evicts_in_background() {
    let hub = Arc::new(BroadcastHub::new(
        HubConfig::default()
            .with_max_age(Duration::from_millis(10))
            .with_sweep_interval(Duration::from_millis(20)),
    ));
    hub.start_sweeper();

    let (id, _rx) = hub.attach().expect("attach failed");
    tokio::time::sleep(Duration::from_millis(60)).await;

    assert!(!hub.is_attached(id));
    hub.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_evicts_everything() {
    let hub = Arc::new(BroadcastHub::default());
    hub.start_sweeper();

    let (_a, _rx_a) = hub.attach().expect("attach failed");
    let (_b, _rx_b) = hub.attach().expect("attach failed");
    assert_eq!(hub.connection_count(), 2);

    hub.shutdown().await;
    assert_eq!(hub.connection_count(), 0);
}

#[tokio::test]
async fn test_shutdown_without_sweeper() {
    let hub = BroadcastHub::default();
    let (_id, _rx) = hub.attach().expect("attach failed");

    hub.shutdown().await;
    assert_eq!(hub.connection_count(), 0);
}
