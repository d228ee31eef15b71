// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DOU NETWORK - MESSAGING ENGINE
//
// Address derivation, per-sender rate limiting, blacklist enforcement,
// message-transaction construction, and reply-based reward scoring.
// No network or disk I/O happens at this layer — that is the validator's
// responsibility. All maps sit behind mutexes so concurrent connection
// handlers cannot race the ≤10-per-60s invariant.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use dou_core::unix_time;

/// Rate-limit window length in seconds.
pub const RATE_LIMIT_WINDOW_SECS: f64 = 60.0;
/// Maximum sends allowed inside one window (the 11th attempt fails).
pub const RATE_LIMIT_MAX_SENDS: usize = 10;

/// Recover from a poisoned mutex instead of panicking.
fn safe_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessagingError {
    /// Sender already has 10 sends recorded in the trailing 60-second window.
    RateLimitExceeded,
    /// Sender is present in the recipient's blacklist.
    Blacklisted,
}

impl fmt::Display for MessagingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessagingError::RateLimitExceeded => write!(f, "Rate limit exceeded"),
            MessagingError::Blacklisted => write!(f, "Sender is blacklisted"),
        }
    }
}

impl std::error::Error for MessagingError {}

/// Immutable message transaction. Never mutated, never deleted — the
/// message store grows without bound (known limitation).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct MessageTx {
    pub tx_id: String,
    pub sender: String,
    pub receiver: String,
    pub timestamp: f64,
    pub message_hash: String,
    pub signature: String,
}

/// Derive a DOU address from public key bytes:
/// `"DOU-"` + the first 20 hex characters of the SHA-256 digest, uppercased.
/// Deterministic; effectively an 80-bit digest prefix.
pub fn generate_address(public_key: &[u8]) -> String {
    let digest = hex::encode(Sha256::digest(public_key));
    format!("DOU-{}", digest[..20].to_uppercase())
}

/// Messaging engine. Cheap to clone — all state is shared behind mutexes,
/// one clone per connection handler.
#[derive(Clone, Default)]
pub struct MessagingEngine {
    messages: Arc<Mutex<HashMap<String, MessageTx>>>,
    blacklists: Arc<Mutex<HashMap<String, HashSet<String>>>>,
    rate_limits: Arc<Mutex<HashMap<String, Vec<f64>>>>,
}

impl MessagingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Send a message with spam prevention. On success the transaction is
    /// recorded in the message store and the sender's rate-limit window.
    pub fn send_message(
        &self,
        sender: &str,
        recipient: &str,
        content: &str,
        signature: &[u8],
    ) -> Result<MessageTx, MessagingError> {
        self.send_message_at(sender, recipient, content, signature, unix_time())
    }

    /// Time-injected variant so tests can exercise window expiry.
    fn send_message_at(
        &self,
        sender: &str,
        recipient: &str,
        content: &str,
        signature: &[u8],
        now: f64,
    ) -> Result<MessageTx, MessagingError> {
        // Rate-limit check and record happen under one lock so two handlers
        // for the same sender cannot both observe 9 entries and both pass.
        let mut limits = safe_lock(&self.rate_limits);
        let window = limits.entry(sender.to_string()).or_default();
        window.retain(|t| now - t < RATE_LIMIT_WINDOW_SECS);
        if window.len() >= RATE_LIMIT_MAX_SENDS {
            return Err(MessagingError::RateLimitExceeded);
        }

        {
            let blacklists = safe_lock(&self.blacklists);
            if let Some(blocked) = blacklists.get(recipient) {
                if blocked.contains(sender) {
                    return Err(MessagingError::Blacklisted);
                }
            }
        }

        let message_hash = hex::encode(Sha256::digest(content.as_bytes()));
        let tx_id = hex::encode(Sha256::digest(
            format!("{}{}{}", sender, recipient, now).as_bytes(),
        ));

        let tx = MessageTx {
            tx_id: tx_id.clone(),
            sender: sender.to_string(),
            receiver: recipient.to_string(),
            timestamp: now,
            message_hash,
            signature: hex::encode(signature),
        };

        safe_lock(&self.messages).insert(tx_id, tx.clone());
        window.push(now);

        Ok(tx)
    }

    /// Add `blocked` to `owner`'s personal blacklist. Idempotent.
    pub fn add_to_blacklist(&self, owner: &str, blocked: &str) {
        safe_lock(&self.blacklists)
            .entry(owner.to_string())
            .or_default()
            .insert(blocked.to_string());
    }

    /// Reward for a message: 0.1 base + 0.05 per stored reverse-direction
    /// message (receiver→sender).
    ///
    /// KNOWN QUIRK (kept deliberately): ALL stored reverse messages count,
    /// including ones sent before this transaction — so a long conversation
    /// inflates every new message's reward. Flagged, not fixed.
    pub fn message_reward(&self, tx: &MessageTx) -> f64 {
        let messages = safe_lock(&self.messages);
        let replies = messages
            .values()
            .filter(|m| m.sender == tx.receiver && m.receiver == tx.sender)
            .count();
        dou_core::rewards::BASE_MESSAGE_REWARD + dou_core::rewards::REPLY_BONUS * replies as f64
    }

    /// Placeholder encryption: a fresh random symmetric key is generated per
    /// call, stretched into a SHA-256 keystream, XORed over the content, and
    /// then DISCARDED. The recipient's public key is not used at all, so the
    /// ciphertext is NOT recoverable by anyone. This is interface scaffolding
    /// only — never treat it as a confidentiality guarantee.
    pub fn encrypt_message(&self, content: &str, _recipient_public_key: &[u8]) -> Vec<u8> {
        let mut key = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut key);

        let mut out = Vec::with_capacity(content.len());
        for (block_idx, chunk) in content.as_bytes().chunks(32).enumerate() {
            let mut hasher = Sha256::new();
            hasher.update(key);
            hasher.update((block_idx as u64).to_le_bytes());
            let keystream = hasher.finalize();
            for (byte, k) in chunk.iter().zip(keystream.iter()) {
                out.push(byte ^ k);
            }
        }
        out
        // `key` goes out of scope here and is never transmitted or derivable.
    }

    /// Look up a stored transaction by id.
    pub fn get_message(&self, tx_id: &str) -> Option<MessageTx> {
        safe_lock(&self.messages).get(tx_id).cloned()
    }

    /// Number of stored message transactions.
    pub fn message_count(&self) -> usize {
        safe_lock(&self.messages).len()
    }

    /// All stored transactions (for persistence snapshots).
    pub fn all_messages(&self) -> Vec<MessageTx> {
        safe_lock(&self.messages).values().cloned().collect()
    }
}
