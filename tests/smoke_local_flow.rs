// Manual smoke run of the local messaging flow. Prints a JSON summary so
// shell scripts can assert on it.
//
// Usage: cargo run --bin smoke-local-flow

use dou_core::rewards::RewardLedger;
use dou_core::Chain;
use dou_crypto::generate_keypair;
use dou_messaging::MessagingEngine;

fn main() {
    let alice = generate_keypair().dou_address();
    let bob = generate_keypair().dou_address();

    let mut chain = Chain::new();
    chain.register_validator(&alice, 100.0);
    chain.register_validator(&bob, 50.0);

    let engine = MessagingEngine::new();
    let mut rewards = RewardLedger::new();

    let summary = match engine.send_message(&alice, &bob, "smoke test message", b"dummy_signature")
    {
        Ok(tx) => {
            let reward = engine.message_reward(&tx);
            rewards.add_message_reward(&alice, reward);
            let multiplier = RewardLedger::calculate_validator_reward(100.0, 0.5);
            rewards.add_validator_reward(&alice, 10.0, multiplier);
            serde_json::json!({
                "status": "ok",
                "sender": alice,
                "recipient": bob,
                "tx_id": tx.tx_id,
                "message_reward": reward,
                "user_total": rewards.get_user_total_rewards(&alice),
                "validator_total": rewards.get_validator_total_rewards(&alice),
            })
        }
        Err(e) => serde_json::json!({ "status": "error", "message": e.to_string() }),
    };

    println!("{}", summary);
}
