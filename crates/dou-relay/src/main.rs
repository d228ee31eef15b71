// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DOU NETWORK - RELAY
//
// Main entry point for the dou-relay binary.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use dou_relay::{Relay, DEFAULT_RELAY_PORT};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    let mut host = std::env::var("DOU_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let mut port = std::env::var("DOU_RELAY_PORT")
        .ok()
        .and_then(|v| v.parse::<u16>().ok())
        .unwrap_or(DEFAULT_RELAY_PORT);
    let mut validator_host =
        std::env::var("DOU_VALIDATOR_HOST").unwrap_or_else(|_| "localhost:5001".to_string());

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" => {
                if let Some(v) = args.get(i + 1) {
                    match v.parse::<u16>() {
                        Ok(p) => port = p,
                        Err(_) => eprintln!("⚠️ Invalid --port value '{}', using {}", v, port),
                    }
                    i += 1;
                }
            }
            "--host" => {
                if let Some(v) = args.get(i + 1) {
                    host = v.clone();
                    i += 1;
                }
            }
            "--validator" => {
                if let Some(v) = args.get(i + 1) {
                    validator_host = v.clone();
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
    println!("  DOU NETWORK RELAY");
    println!("  Forwarding to validator at {}", validator_host);
    println!("═══════════════════════════════════════════════");

    let listener = match TcpListener::bind(format!("{}:{}", host, port)).await {
        Ok(listener) => listener,
        Err(e) => {
            eprintln!("❌ FATAL: Could not bind {}:{}: {}", host, port, e);
            std::process::exit(1);
        }
    };
    println!("📡 Relay listening on {}:{}", host, port);

    Relay::new(validator_host).serve(listener).await;
}
