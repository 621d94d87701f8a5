//! Server Tests
//!
//! End-to-end tests: a real server on a loopback port, driven through
//! `RemoteGateway`.
//!
//! Tests verify:
//! - Every gateway primitive over the wire
//! - Typed errors, busy rejection and pool hygiene
//! - Connections outliving the server's idle timeout
//! - More clients than worker threads
//! - The synchronizer under both clamp strategies

use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use hashsync::network::Server;
use hashsync::{
    BoundedOutcome, BoundedStep, ClampStrategy, Config, FieldMap, HashSynchronizer, MemoryStore,
    RemoteGateway, Result, StoreGateway, SyncError,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// Helpers
// =============================================================================

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Player {
    name: String,
    energy: i64,
}

struct TestServer {
    server: Arc<Server>,
    addr: SocketAddr,
    handle: Option<JoinHandle<Result<()>>>,
}

impl TestServer {
    fn start() -> Self {
        Self::start_with(Config::builder().worker_threads(8).max_connections(16))
    }

    fn start_with(builder: hashsync::config::ConfigBuilder) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let config = builder.purge_interval_ms(50).build();

        let server = Arc::new(Server::new(config, Arc::new(MemoryStore::new())));
        let runner = Arc::clone(&server);
        let handle = thread::spawn(move || runner.serve(listener));

        Self {
            server,
            addr,
            handle: Some(handle),
        }
    }

    fn gateway(&self) -> Arc<RemoteGateway> {
        let config = Config::builder()
            .store_addr(self.addr.to_string())
            .pool_size(2)
            .build();
        Arc::new(RemoteGateway::new(config).unwrap())
    }

    fn stop(mut self) {
        self.server.shutdown();
        if let Some(handle) = self.handle.take() {
            handle.join().unwrap().unwrap();
        }
    }
}

/// Poll `condition` for up to two seconds
fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(2);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

fn fields(entries: &[(&str, &str)]) -> FieldMap {
    entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// =============================================================================
// Basic Operations
// =============================================================================

#[test]
fn test_ping_and_pool_reuse() {
    let server = TestServer::start();
    let gateway = server.gateway();

    gateway.ping().unwrap();
    gateway.ping().unwrap();
    assert_eq!(gateway.idle_connections(), 1);

    drop(gateway);
    server.stop();
}

#[test]
fn test_string_operations() {
    let server = TestServer::start();
    let gateway = server.gateway();

    assert_eq!(gateway.get("k").unwrap(), None);
    gateway.set("k", "v").unwrap();
    assert_eq!(gateway.get("k").unwrap(), Some("v".to_string()));
    assert!(gateway.exists("k").unwrap());

    assert_eq!(gateway.incr("hits").unwrap(), 1);
    assert_eq!(gateway.incr("hits").unwrap(), 2);

    assert_eq!(gateway.ttl("k").unwrap(), None);
    assert!(gateway.expire("k", 60).unwrap());
    assert_eq!(gateway.ttl("k").unwrap(), Some(60));

    assert_eq!(gateway.delete(&["k", "hits", "nope"]).unwrap(), 2);
    assert!(!gateway.exists("k").unwrap());

    drop(gateway);
    server.stop();
}

#[test]
fn test_hash_operations() {
    let server = TestServer::start();
    let gateway = server.gateway();

    gateway
        .hash_set_all("h", &fields(&[("a", "1"), ("b", "2")]))
        .unwrap();
    assert_eq!(gateway.hash_get_all("h").unwrap(), fields(&[("a", "1"), ("b", "2")]));

    assert!(gateway.hash_set_field("h", "c", "3").unwrap());
    assert!(!gateway.hash_set_field("h", "c", "4").unwrap());
    assert_eq!(gateway.hash_get_field("h", "c").unwrap(), Some("4".to_string()));
    assert_eq!(gateway.hash_get_field("h", "zz").unwrap(), None);
    assert!(gateway.hash_exists_field("h", "a").unwrap());

    assert_eq!(gateway.hash_increment_field("h", "a", 9).unwrap(), 10);
    assert_eq!(gateway.hash_delete_fields("h", &["b", "zz"]).unwrap(), 1);
    assert_eq!(
        gateway.hash_values("h").unwrap(),
        vec!["10".to_string(), "4".to_string()]
    );

    drop(gateway);
    server.stop();
}

// =============================================================================
// Errors Across the Wire
// =============================================================================

#[test]
fn test_typed_errors_survive_the_wire() {
    let server = TestServer::start();
    let gateway = server.gateway();

    gateway.hash_set_field("h", "n", "abc").unwrap();
    match gateway.hash_increment_field("h", "n", 1) {
        Err(SyncError::Parse { target, value }) => {
            assert_eq!(target, "h/n");
            assert_eq!(value, "abc");
        }
        other => panic!("Expected Parse error, got {:?}", other),
    }

    gateway.set("text", "x").unwrap();
    assert!(matches!(
        gateway.hash_get_all("text"),
        Err(SyncError::WrongType(_))
    ));

    // Error replies leave the connection usable
    gateway.ping().unwrap();
    assert_eq!(gateway.idle_connections(), 1);

    drop(gateway);
    server.stop();
}

#[test]
fn test_unreachable_store_is_unavailable() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let gateway = RemoteGateway::connect(addr.to_string()).unwrap();

    let error = gateway.ping().unwrap_err();
    assert!(error.is_unavailable(), "unexpected error: {:?}", error);
}

#[test]
fn test_bad_store_address_is_config_error() {
    assert!(matches!(
        RemoteGateway::connect("not an address"),
        Err(SyncError::Config(_))
    ));
}

#[test]
fn test_connection_limit_rejects_with_busy() {
    let server = TestServer::start_with(Config::builder().worker_threads(1).max_connections(1));
    let first = server.gateway();
    first.ping().unwrap();

    let second = server.gateway();
    let error = second.ping().unwrap_err();
    assert!(error.is_unavailable(), "unexpected error: {:?}", error);
    // A turned-away connection is not kept for reuse
    assert_eq!(second.idle_connections(), 0);

    drop(first);
    drop(second);
    server.stop();
}

#[test]
fn test_closed_clients_release_their_slots() {
    let server = TestServer::start_with(Config::builder().worker_threads(1).max_connections(1));
    let first = server.gateway();
    first.ping().unwrap();
    assert_eq!(server.server.active_connections(), 1);

    drop(first);
    assert!(eventually(|| server.server.active_connections() == 0));

    let second = server.gateway();
    second.ping().unwrap();

    drop(second);
    server.stop();
}

#[test]
fn test_expire_beyond_clock_range_keeps_server_healthy() {
    let server = TestServer::start_with(Config::builder().worker_threads(1).max_connections(4));
    let gateway = server.gateway();

    gateway.set("k", "v").unwrap();
    assert!(gateway.expire("k", u64::MAX).unwrap());
    assert_eq!(gateway.ttl("k").unwrap(), None);
    assert!(gateway.exists("k").unwrap());

    // Same connection, same worker, still serving
    gateway.ping().unwrap();
    assert_eq!(gateway.idle_connections(), 1);
    assert_eq!(server.server.active_connections(), 1);

    drop(gateway);
    server.stop();
}

// =============================================================================
// Connection Lifecycle
// =============================================================================

#[test]
fn test_pooled_connection_outlives_server_idle_timeout() {
    let server = TestServer::start_with(
        Config::builder()
            .worker_threads(2)
            .max_connections(8)
            .read_timeout_ms(200),
    );
    let gateway = server.gateway();

    gateway.set("k", "v").unwrap();
    assert_eq!(gateway.idle_connections(), 1);

    // The server closes the idle connection in the meantime
    thread::sleep(Duration::from_millis(600));
    assert!(eventually(|| server.server.active_connections() == 0));

    assert_eq!(gateway.get("k").unwrap(), Some("v".to_string()));
    assert_eq!(gateway.idle_connections(), 1);

    drop(gateway);
    server.stop();
}

#[test]
fn test_single_worker_serves_interleaved_clients() {
    let server = TestServer::start_with(Config::builder().worker_threads(1).max_connections(8));
    let gateways: Vec<_> = (0..4).map(|_| server.gateway()).collect();

    for round in 0..3 {
        for (i, gateway) in gateways.iter().enumerate() {
            gateway.set(&format!("k{}", i), &round.to_string()).unwrap();
        }
    }
    assert_eq!(server.server.active_connections(), 4);

    for (i, gateway) in gateways.iter().enumerate() {
        assert_eq!(gateway.get(&format!("k{}", i)).unwrap(), Some("2".to_string()));
    }

    drop(gateways);
    server.stop();
}

#[test]
fn test_more_clients_than_workers() {
    let server = TestServer::start_with(Config::builder().worker_threads(2).max_connections(16));

    let mut handles = vec![];
    for _ in 0..8 {
        let gateway = server.gateway();
        handles.push(thread::spawn(move || {
            for _ in 0..25 {
                gateway.incr("hits").unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(server.server.store().get("hits").unwrap(), Some("200".to_string()));
    server.stop();
}

// =============================================================================
// Synchronizer Over the Wire
// =============================================================================

#[test]
fn test_synchronizer_over_remote_gateway() {
    let server = TestServer::start();
    let sync = HashSynchronizer::new(server.gateway());

    let record = Player {
        name: "ann".to_string(),
        energy: 9,
    };
    sync.full_sync(&record, "player:1").unwrap();
    assert_eq!(sync.load::<Player>("player:1").unwrap(), Some(record));

    assert_eq!(
        sync.increment::<Player>("player:1", "energy", 3, 10).unwrap(),
        BoundedOutcome::Clamped(10)
    );
    assert_eq!(
        sync.increment::<Player>("player:1", "energy", 1, 10).unwrap(),
        BoundedOutcome::Refused
    );
    assert_eq!(
        server.server.store().hash_get_field("player:1", "energy").unwrap(),
        Some("10".to_string())
    );

    drop(sync);
    server.stop();
}

#[test]
fn test_atomic_strategy_over_remote_gateway() {
    let server = TestServer::start();
    let gateway = server.gateway();
    let sync = HashSynchronizer::with_strategy(gateway.clone(), ClampStrategy::Atomic);

    gateway.hash_set_field("p", "energy", "2").unwrap();
    assert_eq!(
        sync.decrement::<Player>("p", "energy", 5, 0).unwrap(),
        BoundedOutcome::Clamped(0)
    );
    assert_eq!(
        gateway
            .hash_increment_bounded("p", "energy", BoundedStep::up(4, 10).unwrap())
            .unwrap(),
        BoundedOutcome::Applied(4)
    );
    assert_eq!(
        gateway
            .hash_increment_bounded("p", "missing", BoundedStep::up(1, 10).unwrap())
            .unwrap(),
        BoundedOutcome::Refused
    );

    drop(sync);
    drop(gateway);
    server.stop();
}

#[test]
fn test_concurrent_remote_increments_stay_bounded() {
    let server = TestServer::start();
    let gateway = server.gateway();
    gateway.hash_set_field("p", "energy", "0").unwrap();
    let sync = Arc::new(HashSynchronizer::new(gateway.clone()));

    let mut handles = vec![];
    for _ in 0..4 {
        let sync = Arc::clone(&sync);
        handles.push(thread::spawn(move || {
            for _ in 0..25 {
                sync.increment::<Player>("p", "energy", 2, 30).unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(
        gateway.hash_get_field("p", "energy").unwrap(),
        Some("30".to_string())
    );

    drop(sync);
    drop(gateway);
    server.stop();
}
