// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DOU NETWORK - FILE STORAGE
//
// JSON state files under the data directory:
//   users.json      — address → { public_key, private_key } (base64 of PEM)
//   messages.json   — append-only list of validated messages
//   blockchain.json — chain snapshot (blocks, pending, validators)
//
// Each file is initialized to an empty JSON array when absent. Writes from
// concurrent connection handlers are serialized behind one storage mutex;
// the advisory process lock already excludes other node processes.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use dou_core::Chain;
use dou_crypto::StoredKeys;

use crate::error::NodeError;

pub const USERS_FILE: &str = "users.json";
pub const MESSAGES_FILE: &str = "messages.json";
pub const BLOCKCHAIN_FILE: &str = "blockchain.json";

fn safe_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

/// One validated message as persisted in messages.json. Carries the plain
/// content alongside the hash so user-history queries can show it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PersistedMessage {
    pub tx_id: String,
    pub sender: String,
    pub recipient: String,
    pub content: String,
    pub message_hash: String,
    pub timestamp: f64,
}

pub struct Storage {
    data_dir: PathBuf,
    // Guards every file read-modify-write below.
    io_lock: Mutex<()>,
}

impl Storage {
    /// Open the data directory, creating it and seeding empty state files.
    pub fn open(data_dir: &Path) -> Result<Self, NodeError> {
        std::fs::create_dir_all(data_dir)?;
        for name in [USERS_FILE, MESSAGES_FILE, BLOCKCHAIN_FILE] {
            let path = data_dir.join(name);
            if !path.exists() {
                std::fs::write(&path, "[]")?;
            }
        }
        Ok(Self {
            data_dir: data_dir.to_path_buf(),
            io_lock: Mutex::new(()),
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn file_path(&self, name: &str) -> PathBuf {
        self.data_dir.join(name)
    }

    /// Users map. A fresh (or foreign-format) file reads as empty rather
    /// than failing — the seeded `[]` is not a map.
    pub fn load_users(&self) -> HashMap<String, StoredKeys> {
        let _guard = safe_lock(&self.io_lock);
        std::fs::read_to_string(self.file_path(USERS_FILE))
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    pub fn save_users(&self, users: &HashMap<String, StoredKeys>) -> Result<(), NodeError> {
        let _guard = safe_lock(&self.io_lock);
        let body = serde_json::to_string_pretty(users)
            .map_err(|e| NodeError::Storage(e.to_string()))?;
        std::fs::write(self.file_path(USERS_FILE), body)?;
        Ok(())
    }

    pub fn load_messages(&self) -> Vec<PersistedMessage> {
        let _guard = safe_lock(&self.io_lock);
        std::fs::read_to_string(self.file_path(MESSAGES_FILE))
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Append one validated message. Whole-file rewrite under the storage
    /// mutex — the file is a JSON array, not a log.
    pub fn append_message(&self, message: &PersistedMessage) -> Result<(), NodeError> {
        let _guard = safe_lock(&self.io_lock);
        let path = self.file_path(MESSAGES_FILE);
        let mut messages: Vec<PersistedMessage> = std::fs::read_to_string(&path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default();
        messages.push(message.clone());
        let body =
            serde_json::to_string_pretty(&messages).map_err(|e| NodeError::Storage(e.to_string()))?;
        std::fs::write(&path, body)?;
        Ok(())
    }

    pub fn save_chain(&self, chain: &Chain) -> Result<(), NodeError> {
        let _guard = safe_lock(&self.io_lock);
        let body =
            serde_json::to_string_pretty(chain).map_err(|e| NodeError::Storage(e.to_string()))?;
        std::fs::write(self.file_path(BLOCKCHAIN_FILE), body)?;
        Ok(())
    }

    pub fn load_chain(&self) -> Chain {
        let _guard = safe_lock(&self.io_lock);
        std::fs::read_to_string(self.file_path(BLOCKCHAIN_FILE))
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Raw file bytes, served verbatim to SYNC_* peers.
    pub fn read_raw(&self, name: &str) -> Result<Vec<u8>, NodeError> {
        let _guard = safe_lock(&self.io_lock);
        Ok(std::fs::read(self.file_path(name))?)
    }

    /// Verbatim overwrite — the receiving half of the legacy sync clobber.
    /// No integrity check, no merge: last writer wins.
    pub fn overwrite_raw(&self, name: &str, bytes: &[u8]) -> Result<(), NodeError> {
        let _guard = safe_lock(&self.io_lock);
        std::fs::write(self.file_path(name), bytes)?;
        Ok(())
    }

    /// All registered addresses on this node.
    pub fn get_all_addresses(&self) -> Vec<String> {
        let mut addresses: Vec<String> = self.load_users().into_keys().collect();
        addresses.sort();
        addresses
    }

    /// Sent/received history for one address, from the persisted messages.
    pub fn get_user_history(&self, address: &str) -> serde_json::Value {
        let messages = self.load_messages();
        let mut sent = 0u64;
        let mut received = 0u64;
        let mut entries = Vec::new();

        for msg in &messages {
            if msg.sender == address {
                sent += 1;
                entries.push(json!({
                    "type": "sent",
                    "content": msg.content,
                    "timestamp": msg.timestamp,
                }));
            }
            if msg.recipient == address {
                received += 1;
                entries.push(json!({
                    "type": "received",
                    "content": msg.content,
                    "timestamp": msg.timestamp,
                }));
            }
        }

        json!({
            "address": address,
            "total_messages_sent": sent,
            "total_messages_received": received,
            "messages": entries,
        })
    }
}
