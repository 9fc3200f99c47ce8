//! Passphrase-to-key derivation. Argon2id, CPU-hard, salted — the salt
//! lives in the envelope header (see `crypto::envelope`) so each archive
//! remains self-describing.

use argon2::Argon2;

use crate::error::{Result, SeracError};

pub const SALT_LEN: usize = 16;
pub const KEY_LEN: usize = 32;

pub fn derive_key(passphrase: &str, salt: &[u8; SALT_LEN]) -> Result<[u8; KEY_LEN]> {
    let mut key = [0u8; KEY_LEN];
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| SeracError::Crypto(format!("key derivation failed: {e}")))?;
    Ok(key)
}

pub fn random_salt() -> Result<[u8; SALT_LEN]> {
    let mut salt = [0u8; SALT_LEN];
    getrandom::getrandom(&mut salt)
        .map_err(|e| SeracError::Crypto(format!("failed to read randomness: {e}")))?;
    Ok(salt)
}
