// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DOU NETWORK - VALIDATOR NODE
//
// Main entry point for the dou-node binary.
// Startup order is strict: process lock first, then port selection, then
// the accept loop. The lock is held for the life of the process and the
// socket is never bound while another instance holds it.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use dou_crypto::generate_keypair;
use dou_node::config::NodeConfig;
use dou_node::error::NodeError;
use dou_node::lock::ProcessLock;
use dou_node::server::ValidatorNode;
use dou_node::sync::sync_network_data;

/// Historical default stake for a self-registered validator.
const DEFAULT_STAKE: f64 = 100.0;

#[tokio::main]
async fn main() {
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("❌ PANIC in spawned task: {}", panic_info);
    }));

    let mut config = NodeConfig::from_env();
    let mut validator_address: Option<String> = None;
    let mut stake = DEFAULT_STAKE;
    let mut sync_peer: Option<String> = None;

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                if let Some(v) = args.get(i + 1) {
                    match v.parse::<u16>() {
                        Ok(p) => config.port = p,
                        Err(_) => eprintln!(
                            "⚠️ Invalid --port value '{}', using {}",
                            v, config.port
                        ),
                    }
                    i += 1;
                }
            }
            "--host" => {
                if let Some(v) = args.get(i + 1) {
                    config.host = v.clone();
                    i += 1;
                }
            }
            "--data-dir" => {
                if let Some(v) = args.get(i + 1) {
                    config.data_dir = std::path::PathBuf::from(v);
                    i += 1;
                }
            }
            "--address" => {
                if let Some(v) = args.get(i + 1) {
                    validator_address = Some(v.clone());
                    i += 1;
                }
            }
            "--stake" => {
                if let Some(v) = args.get(i + 1) {
                    match v.parse::<f64>() {
                        Ok(s) => stake = s,
                        Err(_) => {
                            eprintln!("⚠️ Invalid --stake value '{}', using {}", v, stake)
                        }
                    }
                    i += 1;
                }
            }
            "--sync" => {
                if let Some(v) = args.get(i + 1) {
                    sync_peer = Some(v.clone());
                    i += 1;
                }
            }
            other => {
                eprintln!("⚠️ Unknown argument '{}', ignoring", other);
            }
        }
        i += 1;
    }

    println!("═══════════════════════════════════════════════");
    println!("  DOU NETWORK VALIDATOR NODE");
    println!("  Data dir: {}", config.data_dir.display());
    println!("═══════════════════════════════════════════════");

    // LOCKING: must happen before any socket is bound.
    let _lock = match ProcessLock::acquire(&config.data_dir) {
        Ok(lock) => {
            println!("🔒 Process lock acquired");
            lock
        }
        Err(NodeError::AlreadyRunning(msg)) => {
            eprintln!("❌ FATAL: {}", msg);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("❌ FATAL: Could not acquire process lock: {}", e);
            std::process::exit(1);
        }
    };

    let node = match ValidatorNode::new(config) {
        Ok(node) => node,
        Err(e) => {
            eprintln!("❌ FATAL: Node initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    // Self-register: explicit --address wins, otherwise a fresh key pair.
    let address = match validator_address {
        Some(addr) => addr,
        None => {
            let addr = generate_keypair().dou_address();
            println!("🔑 Generated validator identity: {}", addr);
            addr
        }
    };
    if let Err(e) = node.register_local_validator(&address, stake) {
        eprintln!("❌ FATAL: Validator registration failed: {}", e);
        std::process::exit(1);
    }
    println!("✅ Registered validator {} (stake: {} DOU)", address, stake);

    // Optional bootstrap pull from a trusted peer before serving.
    if let Some(peer) = sync_peer {
        match sync_network_data(&node.storage, &peer).await {
            Ok(()) => println!("✅ Initial sync from {} complete", peer),
            Err(e) => eprintln!("⚠️ Initial sync from {} failed: {}", peer, e),
        }
    }

    // PORT_SELECTING then LISTENING.
    let (listener, port) = match node.bind().await {
        Ok(bound) => bound,
        Err(e) => {
            eprintln!("❌ FATAL: {}", e);
            std::process::exit(1);
        }
    };
    println!("📡 Listening on {}:{}", node.config.host, port);

    node.serve(listener).await;
}
