// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DOU NETWORK - LEGACY SYNC CLIENT
//
// Pulls users.json and messages.json wholesale from a peer node and
// overwrites the local copies. No merge, no authentication, no origin
// verification: a reachable peer fully replaces local state. Kept only
// for bootstrapping fresh nodes from a trusted peer.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::config::RECV_TIMEOUT_SECS;
use crate::error::NodeError;
use crate::storage::{Storage, MESSAGES_FILE, USERS_FILE};

/// Fetch users then messages from `peer` ("host:port"). Both files are
/// clobbered locally; a failure on either fetch aborts the whole sync.
pub async fn sync_network_data(storage: &Storage, peer: &str) -> Result<(), NodeError> {
    let users = fetch(peer, b"SYNC_USERS").await?;
    storage.overwrite_raw(USERS_FILE, &users)?;
    println!("🔄 Synced users from {} ({} bytes)", peer, users.len());

    let messages = fetch(peer, b"SYNC_MESSAGES").await?;
    storage.overwrite_raw(MESSAGES_FILE, &messages)?;
    println!("🔄 Synced messages from {} ({} bytes)", peer, messages.len());
    Ok(())
}

/// One command, read to EOF. The serving node closes the connection after
/// writing the file, so read_to_end terminates on its shutdown.
async fn fetch(peer: &str, command: &[u8]) -> Result<Vec<u8>, NodeError> {
    let mut stream = TcpStream::connect(peer)
        .await
        .map_err(|e| NodeError::PeerUnreachable(format!("{}: {}", peer, e)))?;
    stream.write_all(command).await?;

    let mut body = Vec::new();
    timeout(
        Duration::from_secs(RECV_TIMEOUT_SECS),
        stream.read_to_end(&mut body),
    )
    .await
    .map_err(|_| NodeError::PeerUnreachable(format!("{}: receive timeout", peer)))??;
    Ok(body)
}
