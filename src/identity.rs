use ed25519_dalek::SigningKey;
use sha2::{Digest, Sha256};

use crate::types::{MinefleetError, Result};

/// Derive the public wallet address for a secret key.
///
/// Accepts the 32-byte hex secret with or without a `0x` prefix. The
/// address is the lowercase hex of the last 20 bytes of the SHA-256 digest
/// of the ed25519 public key, `0x`-prefixed. Deterministic: the same secret
/// always resolves to the same address.
pub fn resolve_identity(secret: &str) -> Result<String> {
    let trimmed = secret.trim();
    let normalized = trimmed.strip_prefix("0x").unwrap_or(trimmed);

    let bytes =
        hex::decode(normalized).map_err(|e| MinefleetError::InvalidSecret(format!("not hex: {e}")))?;
    let key_bytes: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
        MinefleetError::InvalidSecret(format!("expected 32 bytes, got {}", bytes.len()))
    })?;

    let signing_key = SigningKey::from_bytes(&key_bytes);
    let public_key = signing_key.verifying_key();
    let digest = Sha256::digest(public_key.as_bytes());

    Ok(format!("0x{}", hex::encode(&digest[digest.len() - 20..])))
}
