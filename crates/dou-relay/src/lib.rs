// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DOU NETWORK - RELAY
//
// Accepts one JSON message per connection, stamps it with a fresh
// message_id, keeps it in an in-memory queue, and forwards it to the
// validator over a fresh connection. The relay does no validation of its
// own; the validator's verdict is not waited on before acknowledging the
// client (fire-and-forward, matching the historical wire behavior).
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use uuid::Uuid;

pub const DEFAULT_RELAY_PORT: u16 = 5000;
pub const MAX_REQUEST_BYTES: usize = 4096;
pub const RECV_TIMEOUT_SECS: u64 = 10;

fn safe_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Clone)]
pub struct Relay {
    pub validator_host: String,
    /// Pending messages keyed by stamped message_id. Unbounded; entries are
    /// never evicted (historical behavior, see limitations in the README).
    queue: Arc<Mutex<HashMap<String, Value>>>,
}

impl Relay {
    pub fn new(validator_host: String) -> Self {
        Self {
            validator_host,
            queue: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Stamp a uuid v4 message_id onto the message and queue it. Returns the
    /// stamped id. Any client-supplied message_id is overwritten.
    pub fn stamp_and_queue(&self, mut message: Value) -> (String, Value) {
        let message_id = Uuid::new_v4().to_string();
        if let Some(map) = message.as_object_mut() {
            map.insert("message_id".to_string(), json!(message_id));
        }
        safe_lock(&self.queue).insert(message_id.clone(), message.clone());
        (message_id, message)
    }

    pub fn queue_len(&self) -> usize {
        safe_lock(&self.queue).len()
    }

    pub fn queued(&self, message_id: &str) -> Option<Value> {
        safe_lock(&self.queue).get(message_id).cloned()
    }

    /// Forward one stamped message to the validator on a fresh connection.
    /// The validator's response is read and logged but not relayed back.
    pub async fn forward_to_validator(&self, message: &Value) -> Result<(), String> {
        let mut stream = TcpStream::connect(&self.validator_host)
            .await
            .map_err(|e| format!("validator {} unreachable: {}", self.validator_host, e))?;
        let payload = serde_json::to_vec(message).map_err(|e| e.to_string())?;
        stream
            .write_all(&payload)
            .await
            .map_err(|e| e.to_string())?;
        let _ = stream.shutdown().await;

        let mut reply = vec![0u8; MAX_REQUEST_BYTES];
        match timeout(
            Duration::from_secs(RECV_TIMEOUT_SECS),
            stream.read(&mut reply),
        )
        .await
        {
            Ok(Ok(n)) if n > 0 => {
                println!(
                    "📨 Validator replied: {}",
                    String::from_utf8_lossy(&reply[..n])
                );
            }
            _ => {}
        }
        Ok(())
    }

    /// Accept loop, same shape as the validator's.
    pub async fn serve(self, listener: TcpListener) {
        loop {
            match listener.accept().await {
                Ok((stream, peer)) => {
                    let relay = self.clone();
                    tokio::spawn(async move {
                        relay.handle_client(stream, peer.to_string()).await;
                    });
                }
                Err(e) => {
                    eprintln!("⚠️ Accept error: {} — continuing", e);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            }
        }
    }

    async fn handle_client(&self, mut stream: TcpStream, peer: String) {
        let mut buf = vec![0u8; MAX_REQUEST_BYTES];
        let n = match timeout(
            Duration::from_secs(RECV_TIMEOUT_SECS),
            stream.read(&mut buf),
        )
        .await
        {
            Ok(Ok(0)) => return,
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

        let response = self.handle_message(&buf[..n]).await;
        if let Err(e) = stream.write_all(&response).await {
            eprintln!("⚠️ Write error to {}: {}", peer, e);
        }
        let _ = stream.shutdown().await;
    }

    /// Stamp, queue, forward, acknowledge. A dead validator downgrades the
    /// acknowledgement to an error but the message stays queued.
    pub async fn handle_message(&self, data: &[u8]) -> Vec<u8> {
        let message: Value = match std::str::from_utf8(data)
            .ok()
            .and_then(|s| serde_json::from_str(s).ok())
        {
            Some(Value::Object(map)) => Value::Object(map),
            _ => {
                let reply = json!({ "status": "error", "message": "Invalid JSON" });
                return serde_json::to_vec(&reply).unwrap_or_default();
            }
        };

        let (message_id, stamped) = self.stamp_and_queue(message);
        let reply = match self.forward_to_validator(&stamped).await {
            Ok(()) => {
                println!("🔁 Relayed message {} to validator", message_id);
                json!({ "status": "success", "message_id": message_id })
            }
            Err(e) => {
                eprintln!("⚠️ Relay of {} failed: {}", message_id, e);
                json!({ "status": "error", "message": e, "message_id": message_id })
            }
        };
        serde_json::to_vec(&reply).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stamp_overwrites_client_supplied_id() {
        let relay = Relay::new("127.0.0.1:9".to_string());
        let (id, stamped) = relay.stamp_and_queue(json!({
            "sender": "DOU-AAA",
            "message_id": "client-forged"
        }));
        assert_ne!(id, "client-forged");
        assert_eq!(stamped["message_id"], id.as_str());
        assert_eq!(relay.queue_len(), 1);
        assert_eq!(relay.queued(&id).unwrap()["sender"], "DOU-AAA");
    }

    #[test]
    fn test_stamped_ids_are_unique() {
        let relay = Relay::new("127.0.0.1:9".to_string());
        let (a, _) = relay.stamp_and_queue(json!({}));
        let (b, _) = relay.stamp_and_queue(json!({}));
        assert_ne!(a, b);
        assert_eq!(relay.queue_len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_validator_yields_error_but_queues() {
        let relay = Relay::new("127.0.0.1:9".to_string());
        let reply = relay
            .handle_message(br#"{"sender": "DOU-AAA", "recipient": "DOU-BBB", "content": "x"}"#)
            .await;
        let reply: Value = serde_json::from_slice(&reply).unwrap();
        assert_eq!(reply["status"], "error");
        // Queued despite the failed forward.
        assert_eq!(relay.queue_len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_json_is_not_queued() {
        let relay = Relay::new("127.0.0.1:9".to_string());
        let reply = relay.handle_message(b"not json").await;
        let reply: Value = serde_json::from_slice(&reply).unwrap();
        assert_eq!(reply["status"], "error");
        assert_eq!(reply["message"], "Invalid JSON");
        assert_eq!(relay.queue_len(), 0);
    }

    #[tokio::test]
    async fn test_forwarded_payload_reaches_validator_socket() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let relay = Relay::new(addr.to_string());

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            stream.read_to_end(&mut buf).await.unwrap();
            buf
        });

        let reply = relay
            .handle_message(br#"{"sender": "DOU-AAA", "recipient": "DOU-BBB", "content": "hi"}"#)
            .await;
        let reply: Value = serde_json::from_slice(&reply).unwrap();
        assert_eq!(reply["status"], "success");

        let forwarded = server.await.unwrap();
        let forwarded: Value = serde_json::from_slice(&forwarded).unwrap();
        assert_eq!(forwarded["sender"], "DOU-AAA");
        assert_eq!(forwarded["message_id"], reply["message_id"]);
    }
}
