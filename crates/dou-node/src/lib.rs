// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DOU NETWORK - VALIDATOR NODE LIBRARY
//
// TCP JSON validator node: single-instance process lock, port fallback,
// per-connection message validation through the messaging engine, and the
// legacy whole-file sync protocol.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub mod config;
pub mod error;
pub mod lock;
pub mod server;
pub mod storage;
pub mod sync;

pub use config::{NodeConfig, DEFAULT_PORT, MAX_REQUEST_BYTES, PORT_ATTEMPTS};
pub use error::NodeError;
pub use lock::ProcessLock;
pub use server::ValidatorNode;
pub use storage::{PersistedMessage, Storage};
pub use sync::sync_network_data;
