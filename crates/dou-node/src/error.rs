use std::fmt;

/// Fatal and per-operation node errors. Startup errors (`AlreadyRunning`,
/// `NoPortAvailable`) abort the process; everything else is caught at the
/// per-connection boundary and turned into a JSON error response.
#[derive(Debug)]
pub enum NodeError {
    /// Another dou-node process on this host holds the advisory lock.
    AlreadyRunning(String),
    /// Every port in the retry range was already bound.
    NoPortAvailable { start: u16, attempts: u16 },
    /// A sync/relay peer could not be reached.
    PeerUnreachable(String),
    Storage(String),
    Io(std::io::Error),
}

impl fmt::Display for NodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeError::AlreadyRunning(path) => {
                write!(f, "Another dou-node instance holds the lock at {}", path)
            }
            NodeError::NoPortAvailable { start, attempts } => write!(
                f,
                "No free port in range {}..{} ({} attempts)",
                start,
                *start as u32 + *attempts as u32,
                attempts
            ),
            NodeError::PeerUnreachable(peer) => write!(f, "Peer unreachable: {}", peer),
            NodeError::Storage(msg) => write!(f, "Storage error: {}", msg),
            NodeError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for NodeError {}

impl From<std::io::Error> for NodeError {
    fn from(e: std::io::Error) -> Self {
        NodeError::Io(e)
    }
}
