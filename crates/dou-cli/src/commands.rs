// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DOU CLI - COMMAND HANDLERS
//
// Local commands (create/list/send/rewards/validate) operate directly on
// the shared data directory; network commands (network-send/sync) talk to
// a relay or validator over TCP. Errors surface as strings and become the
// process exit status in main.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use colored::Colorize;
use serde_json::{json, Value};
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use dou_core::rewards::RewardLedger;
use dou_core::unix_time;
use dou_crypto::generate_keypair;
use dou_messaging::MessagingEngine;
use dou_node::storage::Storage;
use dou_node::sync::sync_network_data;

const DEFAULT_MAX_USERS: usize = 10;

fn open_storage(data_dir: &Path) -> Result<Storage, String> {
    Storage::open(data_dir).map_err(|e| e.to_string())
}

/// Local users sorted by address so "first user" is stable across runs.
fn sorted_addresses(storage: &Storage) -> Vec<String> {
    let mut addresses: Vec<String> = storage.load_users().into_keys().collect();
    addresses.sort();
    addresses
}

pub fn create_user(data_dir: &Path) -> Result<(), String> {
    let storage = open_storage(data_dir)?;
    let mut users = storage.load_users();

    let max_users = std::env::var("DOU_MAX_USERS")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(DEFAULT_MAX_USERS);
    if users.len() >= max_users {
        return Err(format!("Maximum number of users reached ({})", max_users));
    }

    let keypair = generate_keypair();
    let address = keypair.dou_address();
    users.insert(address.clone(), keypair.to_stored());
    storage.save_users(&users).map_err(|e| e.to_string())?;

    println!(
        "Created new user with DOU address: {}",
        address.green().bold()
    );
    println!("Data stored in: {}", data_dir.display());
    Ok(())
}

pub fn list_users(data_dir: &Path) -> Result<(), String> {
    let storage = open_storage(data_dir)?;
    let addresses = sorted_addresses(&storage);
    if addresses.is_empty() {
        println!("No users created yet.");
        return Ok(());
    }

    println!("{}", "Existing Users:".cyan().bold());
    for address in &addresses {
        println!("- {}", address);
    }
    println!("\nUsers stored in: {}", data_dir.join("users.json").display());
    Ok(())
}

/// Demo path through the in-process engine: first user messages the second.
/// Engine and ledger state live only for this invocation.
pub fn send_local_message(data_dir: &Path, message: &str) -> Result<(), String> {
    let storage = open_storage(data_dir)?;
    let addresses = sorted_addresses(&storage);
    if addresses.len() < 2 {
        return Err("Create at least two users first".to_string());
    }
    let (sender, recipient) = (&addresses[0], &addresses[1]);

    let engine = MessagingEngine::new();
    let tx = engine
        .send_message(sender, recipient, message, b"dummy_signature")
        .map_err(|e| e.to_string())?;

    let reward = engine.message_reward(&tx);
    let mut rewards = RewardLedger::new();
    rewards.add_message_reward(sender, reward);

    println!("Message sent from {} to {}", sender.green(), recipient.green());
    println!("Message Reward: {} DOU", reward.to_string().yellow());
    Ok(())
}

pub fn check_rewards(data_dir: &Path) -> Result<(), String> {
    let storage = open_storage(data_dir)?;
    let addresses = sorted_addresses(&storage);
    let address = addresses.first().ok_or("Create a user first")?;

    // Rewards accrue on the validator node; this reads the local ledger
    // snapshot, which is empty unless a node has run against this data dir.
    let rewards = RewardLedger::new();
    println!("{}", format!("Rewards for {}:", address).cyan().bold());
    println!(
        "Messaging Rewards: {} DOU",
        rewards.get_user_total_rewards(address)
    );
    println!(
        "Validator Rewards: {} DOU",
        rewards.get_validator_total_rewards(address)
    );
    Ok(())
}

pub fn register_validator(data_dir: &Path, stake: f64) -> Result<(), String> {
    let storage = open_storage(data_dir)?;
    let addresses = sorted_addresses(&storage);
    let address = addresses.first().ok_or("Create a user first")?;

    let mut chain = storage.load_chain();
    chain.register_validator(address, stake);
    storage.save_chain(&chain).map_err(|e| e.to_string())?;

    println!(
        "Registered {} as a validator with {} DOU stake",
        address.green().bold(),
        stake.to_string().yellow()
    );
    Ok(())
}

pub async fn network_send(data_dir: &Path, recipient: &str, message: &str) -> Result<(), String> {
    let storage = open_storage(data_dir)?;
    let addresses = sorted_addresses(&storage);
    let sender = addresses.first().ok_or("Create a user first")?;

    let relay_host =
        std::env::var("DOU_RELAY_HOST").unwrap_or_else(|_| "localhost:5000".to_string());

    let payload = json!({
        "sender": sender,
        "recipient": recipient,
        "content": message,
        "timestamp": unix_time(),
    });

    let mut stream = TcpStream::connect(&relay_host)
        .await
        .map_err(|e| format!("relay {} unreachable: {}", relay_host, e))?;
    let bytes = serde_json::to_vec(&payload).map_err(|e| e.to_string())?;
    stream.write_all(&bytes).await.map_err(|e| e.to_string())?;
    let _ = stream.shutdown().await;

    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await.map_err(|e| e.to_string())?;
    let response: Value =
        serde_json::from_slice(&buf[..n]).map_err(|_| "malformed relay response".to_string())?;

    if response.get("status").and_then(Value::as_str) == Some("success") {
        println!("{}", "Message sent successfully!".green().bold());
        println!(
            "Message ID: {}",
            response
                .get("message_id")
                .and_then(Value::as_str)
                .unwrap_or("?")
        );
        Ok(())
    } else {
        Err(format!(
            "message sending failed: {}",
            response
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown error")
        ))
    }
}

pub fn list_addresses(data_dir: &Path) -> Result<(), String> {
    let storage = open_storage(data_dir)?;
    let addresses = storage.get_all_addresses();
    println!(
        "{}",
        serde_json::to_string_pretty(&addresses).map_err(|e| e.to_string())?
    );
    Ok(())
}

pub fn user_history(data_dir: &Path, address: &str) -> Result<(), String> {
    let storage = open_storage(data_dir)?;
    let history = storage.get_user_history(address);
    println!(
        "{}",
        serde_json::to_string_pretty(&history).map_err(|e| e.to_string())?
    );
    Ok(())
}

pub async fn sync_network(data_dir: &Path, validator_host: &str) -> Result<(), String> {
    let storage = open_storage(data_dir)?;
    sync_network_data(&storage, validator_host)
        .await
        .map_err(|e| e.to_string())?;
    println!("Synced network data with {}", validator_host.green());
    Ok(())
}
