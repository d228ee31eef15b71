// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// DOU NETWORK - KEY MATERIAL
//
// Ed25519 key-pair generation and the PEM/base64 formatting used by
// users.json: each user record stores base64(PEM) for both keys.
// Addresses are derived elsewhere (dou-messaging) from the PEM bytes.
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use base64::Engine as _;
use ed25519_dalek::SigningKey;
use rand::RngCore;
use serde::{Deserialize, Serialize};

const B64: base64::engine::GeneralPurpose = base64::engine::general_purpose::STANDARD;

/// Serialized key material as persisted in users.json:
/// both fields are base64 of the PEM-armored key.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StoredKeys {
    pub public_key: String,
    pub private_key: String,
}

pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh Ed25519 key pair from OS randomness.
    pub fn generate() -> Self {
        let mut seed = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut seed);
        Self {
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    /// Raw 32-byte public key.
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// PEM armor of the public key. Addresses hash THESE bytes — the PEM
    /// text, not the raw key — matching the persisted users.json format.
    pub fn public_key_pem(&self) -> String {
        pem_encode("PUBLIC KEY", &self.public_key_bytes())
    }

    pub fn private_key_pem(&self) -> String {
        pem_encode("PRIVATE KEY", &self.signing_key.to_bytes())
    }

    /// DOU address for this key pair, derived from the PEM armor bytes.
    pub fn dou_address(&self) -> String {
        dou_messaging::generate_address(self.public_key_pem().as_bytes())
    }

    /// Key material in the users.json shape (base64 of PEM).
    pub fn to_stored(&self) -> StoredKeys {
        StoredKeys {
            public_key: B64.encode(self.public_key_pem()),
            private_key: B64.encode(self.private_key_pem()),
        }
    }
}

/// Minimal PEM armor: header, base64 body wrapped at 64 columns, footer.
fn pem_encode(label: &str, der: &[u8]) -> String {
    let body = B64.encode(der);
    let mut out = format!("-----BEGIN {}-----\n", label);
    for chunk in body.as_bytes().chunks(64) {
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push('\n');
    }
    out.push_str(&format!("-----END {}-----\n", label));
    out
}

/// Generate a fresh key pair (free-function form kept for call-site brevity).
pub fn generate_keypair() -> Keypair {
    Keypair::generate()
}

/// Decode a base64(PEM) public key back to the PEM text (the address
/// pre-image). Returns None when the base64 is invalid.
pub fn stored_public_key_pem(stored: &StoredKeys) -> Option<String> {
    B64.decode(&stored.public_key)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
}
