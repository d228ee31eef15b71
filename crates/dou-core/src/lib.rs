// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DOU NETWORK - CHAIN LEDGER
//
// Append-only block list with a pending-transaction batch and a validator
// registry. There is no consensus here: `proof` is opaque data carried
// through, and chains never fork or reorg. Blocks are created only by an
// explicit create_block() call — message traffic alone never mints a block.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::{SystemTime, UNIX_EPOCH};

pub mod rewards;

/// Seconds per year, used for validator age scoring.
pub const SECONDS_PER_YEAR: f64 = 365.0 * 24.0 * 3600.0;

/// Current Unix time as fractional seconds.
pub fn unix_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

/// A transaction recorded but not yet included in a block.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PendingTransaction {
    pub sender: String,
    pub recipient: String,
    pub amount: f64,
    pub message_hash: Option<String>,
    pub timestamp: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Block {
    /// 1-based: equals chain length + 1 at creation time.
    pub index: u64,
    pub timestamp: f64,
    pub transactions: Vec<PendingTransaction>,
    pub proof: u64,
    pub previous_hash: String,
}

/// Validator registry entry. The registry allows duplicate addresses —
/// registering twice appends two records (current behavior, kept as-is).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ValidatorRecord {
    pub address: String,
    pub stake: f64,
    pub join_time: f64,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Chain {
    pub chain: Vec<Block>,
    pub pending: Vec<PendingTransaction>,
    pub validators: Vec<ValidatorRecord>,
}

impl Chain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transaction for the next block. Returns the index of the
    /// block that WOULD hold it (chain length + 1) — not a commitment;
    /// transactions accumulate until create_block() is called.
    pub fn new_transaction(
        &mut self,
        sender: &str,
        recipient: &str,
        amount: f64,
        message_hash: Option<String>,
    ) -> u64 {
        self.pending.push(PendingTransaction {
            sender: sender.to_string(),
            recipient: recipient.to_string(),
            amount,
            message_hash,
            timestamp: unix_time(),
        });
        self.chain.len() as u64 + 1
    }

    /// Snapshot the pending batch into a new block and append it.
    /// `proof` is not checked against anything — there is no PoW here.
    pub fn create_block(&mut self, proof: u64, previous_hash: &str) -> Block {
        let block = Block {
            index: self.chain.len() as u64 + 1,
            timestamp: unix_time(),
            transactions: std::mem::take(&mut self.pending),
            proof,
            previous_hash: previous_hash.to_string(),
        };
        self.chain.push(block.clone());
        block
    }

    /// SHA-256 over the canonical JSON form of the block.
    ///
    /// Canonicalization: `serde_json::to_value` produces a Map with sorted
    /// keys (serde_json's default Map is a BTreeMap), so repeated calls on
    /// an unmodified block are byte-stable. Reordering transactions changes
    /// the hash — the transaction list is serialized in order.
    pub fn hash_block(block: &Block) -> String {
        let canonical = serde_json::to_value(block)
            .map(|v| v.to_string())
            .unwrap_or_default();
        let digest = Sha256::digest(canonical.as_bytes());
        hex::encode(digest)
    }

    /// Register a validator. Always succeeds; duplicate addresses are
    /// allowed — the registry enforces no uniqueness invariant.
    pub fn register_validator(&mut self, address: &str, stake: f64) -> bool {
        self.validators.push(ValidatorRecord {
            address: address.to_string(),
            stake,
            join_time: unix_time(),
        });
        true
    }

    /// Selection heuristic: stake factor + age factor + an address-seeded
    /// pseudo-random tie-breaker. Not cryptographically meaningful — the
    /// "random" term is fully reproducible from the address alone.
    pub fn calculate_validator_priority(validator: &ValidatorRecord, min_stake: f64) -> f64 {
        let stake_factor = (validator.stake / min_stake).min(1.5) * 0.4;
        let age_factor = (unix_time() - validator.join_time) / SECONDS_PER_YEAR;
        stake_factor + age_factor + address_random_factor(&validator.address)
    }
}

/// Deterministic uniform-[0,1] factor seeded by the address digest.
/// The SHA-256 digest interpreted as a 256-bit integer and normalized;
/// within f64 precision that equals the top 8 digest bytes over u64::MAX.
pub fn address_random_factor(address: &str) -> f64 {
    let digest = Sha256::digest(address.as_bytes());
    let mut top = [0u8; 8];
    top.copy_from_slice(&digest[..8]);
    u64::from_be_bytes(top) as f64 / u64::MAX as f64
}
