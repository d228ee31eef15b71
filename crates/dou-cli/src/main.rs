// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DOU CLI - Command Line Interface for Users & Validators
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "dou-cli")]
#[command(about = "DOU Network CLI - User, Messaging & Validator Management", long_about = None)]
#[command(version)]
struct Cli {
    /// Data directory (reads DOU_DATA_DIR env var, or defaults to ~/.dou_blockchain)
    #[arg(short, long, env = "DOU_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new user with a DOU address
    Create,

    /// List all local users
    List,

    /// Send a message between the first two local users (local demo path)
    Send {
        /// Message to send
        message: String,
    },

    /// Check rewards for the first local user
    Rewards,

    /// Register the first local user as a validator
    Validate {
        /// Amount of DOU to stake
        stake: f64,
    },

    /// Send a message to a recipient through the network relay
    NetworkSend {
        /// Recipient DOU address
        recipient: String,

        /// Message to send
        message: String,
    },

    /// List all addresses known to the local validator storage
    Addresses,

    /// Show message history for an address
    History {
        /// DOU address to query
        address: String,
    },

    /// Pull users and messages from another validator (overwrites local files)
    Sync {
        /// Validator host to sync with (IP:PORT)
        validator_host: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dou_blockchain")
    });

    let result = match cli.command {
        Commands::Create => commands::create_user(&data_dir),
        Commands::List => commands::list_users(&data_dir),
        Commands::Send { message } => commands::send_local_message(&data_dir, &message),
        Commands::Rewards => commands::check_rewards(&data_dir),
        Commands::Validate { stake } => commands::register_validator(&data_dir, stake),
        Commands::NetworkSend { recipient, message } => {
            commands::network_send(&data_dir, &recipient, &message).await
        }
        Commands::Addresses => commands::list_addresses(&data_dir),
        Commands::History { address } => commands::user_history(&data_dir, &address),
        Commands::Sync { validator_host } => commands::sync_network(&data_dir, &validator_host).await,
    };

    if let Err(e) = result {
        use colored::Colorize;
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}
