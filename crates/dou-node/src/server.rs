// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DOU NETWORK - VALIDATOR SERVER
//
// Startup state machine: LOCKING → PORT_SELECTING → LISTENING, then one
// accept loop spawning an independent task per connection. Handlers are
// unbounded (no worker pool) — a known resource-exhaustion risk under
// load, kept as-is. Per-connection protocol: one JSON request, one JSON
// response, 4096-byte single read, 10-second receive timeout.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde_json::{json, Value};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use dou_core::rewards::RewardLedger;
use dou_core::Chain;
use dou_messaging::MessagingEngine;

use crate::config::{NodeConfig, MAX_REQUEST_BYTES, PORT_ATTEMPTS, RECV_TIMEOUT_SECS};
use crate::error::NodeError;
use crate::storage::{PersistedMessage, Storage, MESSAGES_FILE, USERS_FILE};

/// Wire messages carry no real signature; the engine records this marker.
const PLACEHOLDER_SIGNATURE: &[u8] = b"dummy_signature";

fn safe_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// Validator node state shared across all connection handlers. Cloning is
/// cheap; every handler gets its own clone.
#[derive(Clone)]
pub struct ValidatorNode {
    pub config: NodeConfig,
    pub engine: MessagingEngine,
    pub rewards: Arc<Mutex<RewardLedger>>,
    pub chain: Arc<Mutex<Chain>>,
    pub storage: Arc<Storage>,
}

impl ValidatorNode {
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        let storage = Arc::new(Storage::open(&config.data_dir)?);
        let chain = storage.load_chain();
        Ok(Self {
            config,
            engine: MessagingEngine::new(),
            rewards: Arc::new(Mutex::new(RewardLedger::new())),
            chain: Arc::new(Mutex::new(chain)),
            storage,
        })
    }

    /// Register this node's own validator address (default stake 100 DOU,
    /// matching the historical default) and persist the chain snapshot.
    pub fn register_local_validator(&self, address: &str, stake: f64) -> Result<(), NodeError> {
        {
            let mut chain = safe_lock(&self.chain);
            chain.register_validator(address, stake);
        }
        let chain = safe_lock(&self.chain).clone();
        self.storage.save_chain(&chain)
    }

    /// PORT_SELECTING: bind the first free port starting at the configured
    /// one, stepping forward on AddrInUse up to PORT_ATTEMPTS ports. The
    /// chosen port is persisted so restarts prefer it.
    pub async fn bind(&self) -> Result<(TcpListener, u16), NodeError> {
        let start = self.config.port;
        for offset in 0..PORT_ATTEMPTS {
            let port = start.wrapping_add(offset);
            let addr = format!("{}:{}", self.config.host, port);
            match TcpListener::bind(&addr).await {
                Ok(listener) => {
                    if let Err(e) = std::fs::write(self.config.port_file(), port.to_string()) {
                        eprintln!("⚠️ Could not persist port {}: {}", port, e);
                    }
                    if offset > 0 {
                        println!("🔄 Port {} busy, bound {} instead", start, port);
                    }
                    return Ok((listener, port));
                }
                Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => continue,
                Err(e) => return Err(NodeError::Io(e)),
            }
        }
        Err(NodeError::NoPortAvailable {
            start,
            attempts: PORT_ATTEMPTS,
        })
    }

    /// Accept loop. Runs forever; accept errors are logged and the loop
    /// continues after a short backoff so a transient failure can't spin.
    pub async fn serve(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let node = self.clone();
                    tokio::spawn(async move {
                        node.handle_connection(stream, peer.to_string()).await;
                    });
                }
                Err(e) => {
                    eprintln!("⚠️ Accept error: {} — continuing", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    /// One request, one response, connection closed on return regardless of
    /// outcome (the stream drops at the end of this function).
    pub async fn handle_connection(&self, mut stream: TcpStream, peer: String) {
        let mut buf = vec![0u8; MAX_REQUEST_BYTES];
        let n = match timeout(
            Duration::from_secs(RECV_TIMEOUT_SECS),
            stream.read(&mut buf),
        )
        .await
        {
            Ok(Ok(0)) => {
                return; // peer closed without sending
            }
            Ok(Ok(n)) => n,
            Ok(Err(e)) => {
                eprintln!("⚠️ Read error from {}: {}", peer, e);
                return;
            }
            Err(_) => {
                eprintln!("⚠️ Receive timeout from {}", peer);
                return;
            }
        };
        let data = &buf[..n];

        // Legacy sync sub-protocol: plain-text commands answered with raw
        // file bytes. Unauthenticated by design (documented limitation).
        let response = if data == b"SYNC_USERS" {
            self.serve_sync_file(USERS_FILE, &peer).await
        } else if data == b"SYNC_MESSAGES" {
            self.serve_sync_file(MESSAGES_FILE, &peer).await
        } else {
            let reply = self.handle_request(data);
            serde_json::to_vec(&reply).unwrap_or_else(|_| b"{\"status\":\"error\"}".to_vec())
        };

        if let Err(e) = stream.write_all(&response).await {
            eprintln!("⚠️ Write error to {}: {}", peer, e);
        }
        let _ = stream.shutdown().await;
    }

    async fn serve_sync_file(&self, name: &str, peer: &str) -> Vec<u8> {
        match self.storage.read_raw(name) {
            Ok(bytes) => {
                println!("📤 Serving {} to sync peer {}", name, peer);
                bytes
            }
            Err(e) => {
                eprintln!("⚠️ Sync read of {} failed: {}", name, e);
                Vec::new()
            }
        }
    }

    /// Decode, validate, and process one JSON request. Every failure path
    /// maps to a response — errors never escape the handler boundary.
    fn handle_request(&self, data: &[u8]) -> Value {
        let request: Value = match std::str::from_utf8(data)
            .ok()
            .and_then(|s| serde_json::from_str(s).ok())
        {
            Some(Value::Object(map)) => Value::Object(map),
            _ => {
                return json!({ "status": "error", "message": "Invalid JSON" });
            }
        };

        let message_id = request.get("message_id").cloned().unwrap_or(Value::Null);

        // Structural validation: all three keys must be present strings.
        // Missing any ⇒ "invalid" with NO side effects.
        let (sender, recipient, content) = match (
            request.get("sender").and_then(Value::as_str),
            request.get("recipient").and_then(Value::as_str),
            request.get("content").and_then(Value::as_str),
        ) {
            (Some(s), Some(r), Some(c)) => (s, r, c),
            _ => {
                return json!({ "status": "invalid", "message_id": message_id });
            }
        };

        match self.process_message(sender, recipient, content) {
            Ok(reward) => {
                println!(
                    "✅ Validated message {} → {} (reward: {} DOU)",
                    sender, recipient, reward
                );
                json!({ "status": "validated", "message_id": message_id })
            }
            Err(e) => {
                eprintln!("⚠️ Message {} → {} rejected: {}", sender, recipient, e);
                json!({ "status": "error", "message": e, "message_id": message_id })
            }
        }
    }

    /// Engine + reward + persistence pipeline for one validated request.
    fn process_message(&self, sender: &str, recipient: &str, content: &str) -> Result<f64, String> {
        let tx = self
            .engine
            .send_message(sender, recipient, content, PLACEHOLDER_SIGNATURE)
            .map_err(|e| e.to_string())?;

        let reward = self.engine.message_reward(&tx);
        safe_lock(&self.rewards).add_message_reward(sender, reward);

        self.storage
            .append_message(&PersistedMessage {
                tx_id: tx.tx_id.clone(),
                sender: tx.sender.clone(),
                recipient: tx.receiver.clone(),
                content: content.to_string(),
                message_hash: tx.message_hash.clone(),
                timestamp: tx.timestamp,
            })
            .map_err(|e| e.to_string())?;

        Ok(reward)
    }
}
