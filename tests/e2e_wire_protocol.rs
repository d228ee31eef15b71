// ========================================
// E2E WIRE PROTOCOL TESTS FOR DOU NETWORK
// ========================================
//
// Test Scenarios:
// 1. Validated Message Over TCP
// 2. Invalid JSON & Missing-Field Responses
// 3. Rate Limit Over The Wire
// 4. Legacy Sync Between Two Nodes
// 5. Relay → Validator Forwarding
// 6. Single-Instance Lock & Port Fallback
//
// Usage:
//   cargo test --test e2e_wire_protocol -- --nocapture
//
// ========================================

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use dou_node::config::NodeConfig;
use dou_node::server::ValidatorNode;
use dou_node::storage::Storage;
use dou_node::sync::sync_network_data;
use dou_relay::Relay;

/// Boot a node on an ephemeral port; returns its address and temp dir.
async fn spawn_node() -> (tempfile::TempDir, ValidatorNode, String) {
    let dir = tempfile::tempdir().unwrap();
    let config = NodeConfig {
        data_dir: dir.path().to_path_buf(),
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    let node = ValidatorNode::new(config).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    tokio::spawn(node.clone().serve(listener));
    (dir, node, addr)
}

/// One request/response exchange the way all DOU clients do it.
async fn roundtrip(addr: &str, payload: &[u8]) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    stream.write_all(payload).await.unwrap();
    stream.shutdown().await.unwrap();
    let mut response = Vec::new();
    stream.read_to_end(&mut response).await.unwrap();
    response
}

async fn roundtrip_json(addr: &str, payload: Value) -> Value {
    let response = roundtrip(addr, payload.to_string().as_bytes()).await;
    serde_json::from_slice(&response).unwrap()
}

// ========================================
// TEST 1: VALIDATED MESSAGE OVER TCP
// ========================================
#[tokio::test]
async fn test_validated_message_over_tcp() {
    println!("\n🧪 TEST 1: Validated Message Over TCP");
    let (_dir, node, addr) = spawn_node().await;

    let reply = roundtrip_json(
        &addr,
        json!({
            "sender": "DOU-ALICE",
            "recipient": "DOU-BOB",
            "content": "hello over tcp",
            "message_id": "wire-1"
        }),
    )
    .await;

    assert_eq!(reply["status"], "validated");
    assert_eq!(reply["message_id"], "wire-1");

    let persisted = node.storage.load_messages();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].content, "hello over tcp");
    println!("✅ Message validated and persisted");
}

// ========================================
// TEST 2: INVALID JSON & MISSING-FIELD RESPONSES
// ========================================
#[tokio::test]
async fn test_invalid_requests_over_tcp() {
    println!("\n🧪 TEST 2: Invalid JSON & Missing-Field Responses");
    let (_dir, node, addr) = spawn_node().await;

    let reply = roundtrip(&addr, b"{not json at all").await;
    let reply: Value = serde_json::from_slice(&reply).unwrap();
    assert_eq!(reply["status"], "error");
    assert_eq!(reply["message"], "Invalid JSON");

    let reply = roundtrip_json(
        &addr,
        json!({ "sender": "DOU-ALICE", "content": "no recipient", "message_id": "wire-2" }),
    )
    .await;
    assert_eq!(reply["status"], "invalid");
    assert_eq!(reply["message_id"], "wire-2");

    // Neither request left a trace.
    assert_eq!(node.engine.message_count(), 0);
    assert!(node.storage.load_messages().is_empty());
    println!("✅ Bad requests rejected with no side effects");
}

// ========================================
// TEST 3: RATE LIMIT OVER THE WIRE
// ========================================
#[tokio::test]
async fn test_rate_limit_over_the_wire() {
    println!("\n🧪 TEST 3: Rate Limit Over The Wire");
    let (_dir, node, addr) = spawn_node().await;

    for i in 0..10 {
        let reply = roundtrip_json(
            &addr,
            json!({
                "sender": "DOU-CHATTY",
                "recipient": "DOU-BOB",
                "content": format!("message {}", i)
            }),
        )
        .await;
        assert_eq!(reply["status"], "validated", "send {} should pass", i);
    }

    let reply = roundtrip_json(
        &addr,
        json!({ "sender": "DOU-CHATTY", "recipient": "DOU-BOB", "content": "one too many" }),
    )
    .await;
    assert_eq!(reply["status"], "error");
    assert!(reply["message"]
        .as_str()
        .unwrap()
        .contains("Rate limit exceeded"));
    assert_eq!(node.storage.load_messages().len(), 10);
    println!("✅ 11th send within the window rejected");
}

// ========================================
// TEST 4: LEGACY SYNC BETWEEN TWO NODES
// ========================================
#[tokio::test]
async fn test_legacy_sync_between_nodes() {
    println!("\n🧪 TEST 4: Legacy Sync Between Two Nodes");
    let (_dir_a, node_a, addr_a) = spawn_node().await;

    // Seed node A with a message through the real wire path.
    let reply = roundtrip_json(
        &addr_a,
        json!({ "sender": "DOU-ALICE", "recipient": "DOU-BOB", "content": "sync me" }),
    )
    .await;
    assert_eq!(reply["status"], "validated");

    // Node B starts empty and pulls everything from A.
    let dir_b = tempfile::tempdir().unwrap();
    let storage_b = Storage::open(dir_b.path()).unwrap();
    assert!(storage_b.load_messages().is_empty());

    sync_network_data(&storage_b, &addr_a).await.unwrap();

    let synced = storage_b.load_messages();
    assert_eq!(synced.len(), 1);
    assert_eq!(synced[0].content, "sync me");
    assert_eq!(
        storage_b.read_raw("users.json").unwrap(),
        node_a.storage.read_raw("users.json").unwrap()
    );
    println!("✅ Node B cloned node A's users and messages");
}

// ========================================
// TEST 5: RELAY → VALIDATOR FORWARDING
// ========================================
#[tokio::test]
async fn test_relay_forwards_to_validator() {
    println!("\n🧪 TEST 5: Relay → Validator Forwarding");
    let (_dir, node, validator_addr) = spawn_node().await;

    let relay = Relay::new(validator_addr);
    let relay_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let relay_addr = relay_listener.local_addr().unwrap().to_string();
    tokio::spawn(relay.clone().serve(relay_listener));

    let reply = roundtrip_json(
        &relay_addr,
        json!({ "sender": "DOU-ALICE", "recipient": "DOU-BOB", "content": "via relay" }),
    )
    .await;
    assert_eq!(reply["status"], "success");
    let message_id = reply["message_id"].as_str().unwrap().to_string();
    assert!(relay.queued(&message_id).is_some());

    // The validator received and persisted the forwarded message.
    let persisted = node.storage.load_messages();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].content, "via relay");
    println!("✅ Relay stamped {} and the validator stored it", message_id);
}

// ========================================
// TEST 6: SINGLE-INSTANCE LOCK & PORT FALLBACK
// ========================================
#[cfg(unix)]
#[tokio::test]
async fn test_lock_and_port_fallback() {
    println!("\n🧪 TEST 6: Single-Instance Lock & Port Fallback");
    use dou_node::error::NodeError;
    use dou_node::lock::ProcessLock;

    let dir = tempfile::tempdir().unwrap();
    let lock = ProcessLock::acquire(dir.path()).unwrap();
    match ProcessLock::acquire(dir.path()) {
        Err(NodeError::AlreadyRunning(_)) => {}
        Err(e) => panic!("expected AlreadyRunning, got {}", e),
        Ok(_) => panic!("second lock unexpectedly succeeded"),
    }
    drop(lock);
    println!("✅ Second instance refused while the lock is held");

    // Occupy a port, then point a node at it; it must step forward.
    let blocker = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let taken = blocker.local_addr().unwrap().port();

    let node_dir = tempfile::tempdir().unwrap();
    let node = ValidatorNode::new(NodeConfig {
        data_dir: node_dir.path().to_path_buf(),
        host: "127.0.0.1".to_string(),
        port: taken,
    })
    .unwrap();

    let (listener, port) = node.bind().await.unwrap();
    assert_ne!(port, taken);
    drop(listener);

    // The fallback port is remembered for the next start.
    let persisted = std::fs::read_to_string(node.config.port_file()).unwrap();
    assert_eq!(persisted.trim().parse::<u16>().unwrap(), port);
    println!("✅ Fell back to port {} and persisted it", port);
}
