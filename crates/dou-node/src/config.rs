use std::path::PathBuf;

/// Default TCP port when neither DOU_PORT nor a persisted port exists.
pub const DEFAULT_PORT: u16 = 5001;
/// How many consecutive ports to try before giving up.
pub const PORT_ATTEMPTS: u16 = 20;
/// Receive timeout per connection.
pub const RECV_TIMEOUT_SECS: u64 = 10;
/// Single-read buffer size. Requests larger than this are truncated —
/// a known wire-protocol limitation, kept for compatibility.
pub const MAX_REQUEST_BYTES: usize = 4096;

/// Node configuration, resolved once at startup from environment variables
/// (the only config surface the node has):
///   DOU_DATA_DIR  — persistent state directory (default ~/.dou_blockchain)
///   DOU_HOST      — bind address (default 0.0.0.0)
///   DOU_PORT      — preferred port (default: persisted port, then 5001)
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub host: String,
    pub port: u16,
}

impl NodeConfig {
    pub fn from_env() -> Self {
        let data_dir = std::env::var("DOU_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".dou_blockchain")
            });

        let host = std::env::var("DOU_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());

        // Port preference: env var → port persisted by a previous run → default.
        let port = std::env::var("DOU_PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .or_else(|| read_persisted_port(&data_dir))
            .unwrap_or(DEFAULT_PORT);

        Self {
            data_dir,
            host,
            port,
        }
    }

    pub fn port_file(&self) -> PathBuf {
        self.data_dir.join("node_port")
    }
}

fn read_persisted_port(data_dir: &std::path::Path) -> Option<u16> {
    std::fs::read_to_string(data_dir.join("node_port"))
        .ok()
        .and_then(|s| s.trim().parse().ok())
}
