//! Counter actor integration tests
//!
//! These run the real actor against a scratch SQLite database with short
//! flush intervals.

use std::time::Duration;

use tokio::sync::mpsc::error::TryRecvError;
use tokio::time::sleep;

use tally_config::{FlushConfig, RateLimitConfig};
use tally_persistence::{CounterRepository, Database, DatabaseConfig};
use tally_server_core::{CounterActor, Outbound, CLOSE_POLICY_VIOLATION};

async fn scratch_store(dir: &tempfile::TempDir) -> (Database, CounterRepository) {
    let config = DatabaseConfig {
        path: dir.path().join("tally.db").to_string_lossy().into_owned(),
        ..DatabaseConfig::default()
    };
    let database = Database::new(config).await.unwrap();
    database.migrate().await.unwrap();
    let repo = CounterRepository::new(database.pool().clone());
    (database, repo)
}

fn limits(burst: u32, rate: u32) -> RateLimitConfig {
    RateLimitConfig {
        burst_capacity: burst,
        refill_rate: rate,
        max_batch: 40,
    }
}

fn flush(persist_ms: u64, broadcast_ms: u64) -> FlushConfig {
    FlushConfig {
        persist_interval_ms: persist_ms,
        broadcast_interval_ms: broadcast_ms,
    }
}

/// Drain everything currently queued for a connection.
fn drain(outbound: &mut tokio::sync::mpsc::UnboundedReceiver<Outbound>) -> Vec<Outbound> {
    let mut received = Vec::new();
    loop {
        match outbound.try_recv() {
            Ok(command) => received.push(command),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return received,
        }
    }
}

#[tokio::test]
async fn admitted_increments_sum_into_the_counter() {
    let dir = tempfile::tempdir().unwrap();
    let (_database, repo) = scratch_store(&dir).await;
    let actor = CounterActor::new(repo, limits(100, 100), flush(5_000, 1_000));

    let handle = actor.connect("1.2.3.4".to_string()).await.unwrap();

    assert!(actor.request_increment(handle.id, "increment").await);
    assert!(actor.request_increment(handle.id, "").await);
    assert!(actor.request_increment(handle.id, "inc:5").await);

    assert_eq!(actor.read_count().await.unwrap(), 7);
}

#[tokio::test]
async fn new_connection_receives_the_current_value_first() {
    let dir = tempfile::tempdir().unwrap();
    let (_database, repo) = scratch_store(&dir).await;
    repo.save(7).await.unwrap();

    let actor = CounterActor::new(repo, limits(100, 100), flush(5_000, 1_000));
    let mut handle = actor.connect("1.2.3.4".to_string()).await.unwrap();

    assert_eq!(handle.outbound.recv().await, Some(Outbound::Count(7)));
    // And nothing else until something actually changes.
    assert!(drain(&mut handle.outbound).is_empty());
}

#[tokio::test]
async fn garbage_messages_change_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (_database, repo) = scratch_store(&dir).await;
    let actor = CounterActor::new(repo, limits(100, 100), flush(5_000, 1_000));

    let mut handle = actor.connect("1.2.3.4".to_string()).await.unwrap();
    let _ = handle.outbound.recv().await;

    assert!(!actor.request_increment(handle.id, "reset").await);
    assert!(!actor.request_increment(handle.id, "inc:-5").await);
    assert!(!actor.request_increment(handle.id, "inc:abc").await);

    assert_eq!(actor.read_count().await.unwrap(), 0);
    // Silently dropped: no error frame, no close.
    assert!(drain(&mut handle.outbound).is_empty());
}

#[tokio::test]
async fn persistence_is_debounced_into_one_write() {
    let dir = tempfile::tempdir().unwrap();
    let (_database, repo) = scratch_store(&dir).await;
    let actor = CounterActor::new(repo.clone(), limits(100, 100), flush(80, 20));

    let handle = actor.connect("1.2.3.4".to_string()).await.unwrap();
    for _ in 0..5 {
        assert!(actor.request_increment(handle.id, "inc:2").await);
    }

    // Nothing hits storage before the debounce interval elapses.
    assert_eq!(repo.load().await.unwrap(), None);

    sleep(Duration::from_millis(250)).await;
    assert_eq!(repo.load().await.unwrap(), Some(10));
}

#[tokio::test]
async fn broadcast_is_coalesced_per_interval() {
    let dir = tempfile::tempdir().unwrap();
    let (_database, repo) = scratch_store(&dir).await;
    let actor = CounterActor::new(repo, limits(100, 100), flush(5_000, 60));

    let mut viewer_a = actor.connect("1.2.3.4".to_string()).await.unwrap();
    let mut viewer_b = actor.connect("5.6.7.8".to_string()).await.unwrap();
    assert_eq!(viewer_a.outbound.recv().await, Some(Outbound::Count(0)));
    assert_eq!(viewer_b.outbound.recv().await, Some(Outbound::Count(0)));

    // Three rapid increments inside one broadcast interval.
    assert!(actor.request_increment(viewer_a.id, "increment").await);
    assert!(actor.request_increment(viewer_a.id, "increment").await);
    assert!(actor.request_increment(viewer_a.id, "increment").await);

    sleep(Duration::from_millis(250)).await;

    // Each viewer saw exactly one push, carrying the final value.
    assert_eq!(drain(&mut viewer_a.outbound), vec![Outbound::Count(3)]);
    assert_eq!(drain(&mut viewer_b.outbound), vec![Outbound::Count(3)]);
}

#[tokio::test]
async fn increments_beyond_the_burst_are_rejected_silently() {
    let dir = tempfile::tempdir().unwrap();
    let (_database, repo) = scratch_store(&dir).await;
    let actor = CounterActor::new(repo, limits(3, 10), flush(5_000, 5_000));

    let mut handle = actor.connect("1.2.3.4".to_string()).await.unwrap();
    let _ = handle.outbound.recv().await;

    assert!(actor.request_increment(handle.id, "increment").await);
    assert!(actor.request_increment(handle.id, "increment").await);
    assert!(actor.request_increment(handle.id, "increment").await);
    assert!(!actor.request_increment(handle.id, "increment").await);

    assert_eq!(actor.read_count().await.unwrap(), 3);
    // Rejection is silent: no close, no error frame.
    assert!(drain(&mut handle.outbound).is_empty());
}

#[tokio::test]
async fn reconnect_after_last_disconnect_gets_a_fresh_bucket() {
    let dir = tempfile::tempdir().unwrap();
    let (_database, repo) = scratch_store(&dir).await;
    let actor = CounterActor::new(repo, limits(2, 10), flush(5_000, 5_000));

    let handle = actor.connect("1.2.3.4".to_string()).await.unwrap();
    assert!(actor.request_increment(handle.id, "increment").await);
    assert!(actor.request_increment(handle.id, "increment").await);
    assert!(!actor.request_increment(handle.id, "increment").await);

    actor.disconnect(handle.id).await;

    // Same identity, new connection: the exhausted bucket is gone.
    let handle = actor.connect("1.2.3.4".to_string()).await.unwrap();
    assert!(actor.request_increment(handle.id, "increment").await);
}

#[tokio::test]
async fn abusive_identity_is_disconnected_with_policy_close() {
    let dir = tempfile::tempdir().unwrap();
    let (_database, repo) = scratch_store(&dir).await;
    // Cutoff is 1.5 * 4 = 6 units per window; the bucket alone would admit 100.
    let actor = CounterActor::new(repo, limits(100, 4), flush(5_000, 5_000));

    let mut first = actor.connect("9.9.9.9".to_string()).await.unwrap();
    let mut second = actor.connect("9.9.9.9".to_string()).await.unwrap();
    let _ = first.outbound.recv().await;
    let _ = second.outbound.recv().await;

    assert!(actor.request_increment(first.id, "inc:4").await);
    assert!(!actor.request_increment(first.id, "inc:4").await);

    // Every connection of the identity is ordered closed, policy code 1008.
    for viewer in [&mut first, &mut second] {
        match viewer.outbound.recv().await {
            Some(Outbound::Close { code, .. }) => assert_eq!(code, CLOSE_POLICY_VIOLATION),
            other => panic!("expected close, got {:?}", other),
        }
    }

    // The counter keeps the admitted amount only.
    assert_eq!(actor.read_count().await.unwrap(), 4);
}

#[tokio::test]
async fn lazily_loaded_baseline_comes_from_storage() {
    let dir = tempfile::tempdir().unwrap();
    let (_database, repo) = scratch_store(&dir).await;
    repo.save(100).await.unwrap();

    let actor = CounterActor::new(repo.clone(), limits(100, 100), flush(60, 20));
    let handle = actor.connect("1.2.3.4".to_string()).await.unwrap();
    assert!(actor.request_increment(handle.id, "inc:5").await);

    assert_eq!(actor.read_count().await.unwrap(), 105);

    sleep(Duration::from_millis(200)).await;
    assert_eq!(repo.load().await.unwrap(), Some(105));
}

#[tokio::test]
async fn storage_errors_propagate_on_the_read_path() {
    let dir = tempfile::tempdir().unwrap();
    let (database, repo) = scratch_store(&dir).await;
    database.close().await;

    let actor = CounterActor::new(repo, limits(100, 100), flush(5_000, 1_000));

    // A broken store must not be masked as a zero counter.
    assert!(actor.read_count().await.is_err());
    assert!(actor.connect("1.2.3.4".to_string()).await.is_err());
}

#[tokio::test]
async fn flush_now_persists_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let (_database, repo) = scratch_store(&dir).await;
    let actor = CounterActor::new(repo.clone(), limits(100, 100), flush(60_000, 1_000));

    let handle = actor.connect("1.2.3.4".to_string()).await.unwrap();
    assert!(actor.request_increment(handle.id, "inc:9").await);
    assert_eq!(repo.load().await.unwrap(), None);

    actor.flush_now().await.unwrap();
    assert_eq!(repo.load().await.unwrap(), Some(9));
}
