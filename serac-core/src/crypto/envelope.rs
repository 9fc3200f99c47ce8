//! The self-describing wrapper around an encrypted blob: `MAGIC(4) ||
//! VERSION(1) || SALT(16) || NONCE(12) || CIPHERTEXT || TAG(16)`. Content
//! hashes are computed over the plaintext, never the envelope, which is
//! what lets identical files dedupe even though every encryption uses a
//! fresh nonce.
//!
//! Header layout follows the explicit `write_to`/`read_from` style used
//! elsewhere in this crate for binary formats.

use std::io::{Read, Write};

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};

use crate::crypto::kdf::{self, KEY_LEN, SALT_LEN};
use crate::error::{Result, SeracError};

pub const MAGIC: &[u8; 4] = b"SRC1";
/// Pinned to the AEAD/KDF choice made above. Once the first object is
/// written to a repository this MUST NOT change.
pub const VERSION: u8 = 1;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
pub const HEADER_LEN: usize = MAGIC.len() + 1 + SALT_LEN + NONCE_LEN;

struct Header {
    salt: [u8; SALT_LEN],
    nonce: [u8; NONCE_LEN],
}

impl Header {
    fn write_to(&self, w: &mut impl Write) -> Result<()> {
        w.write_all(MAGIC)?;
        w.write_all(&[VERSION])?;
        w.write_all(&self.salt)?;
        w.write_all(&self.nonce)?;
        Ok(())
    }

    fn read_from(r: &mut impl Read) -> Result<Self> {
        let mut magic = [0u8; 4];
        r.read_exact(&mut magic)?;
        if &magic != MAGIC {
            return Err(SeracError::Crypto("bad envelope magic".into()));
        }
        let mut version = [0u8; 1];
        r.read_exact(&mut version)?;
        if version[0] != VERSION {
            return Err(SeracError::Crypto(format!(
                "unsupported envelope version {}",
                version[0]
            )));
        }
        let mut salt = [0u8; SALT_LEN];
        r.read_exact(&mut salt)?;
        let mut nonce = [0u8; NONCE_LEN];
        r.read_exact(&mut nonce)?;
        Ok(Self { salt, nonce })
    }

    fn as_aad(&self) -> Vec<u8> {
        let mut aad = Vec::with_capacity(HEADER_LEN);
        aad.extend_from_slice(MAGIC);
        aad.push(VERSION);
        aad.extend_from_slice(&self.salt);
        aad
    }
}

/// Encrypts `plaintext` under a key derived from `passphrase`, writing the
/// full envelope (header + ciphertext + tag) to `out`.
pub fn encrypt(plaintext: &[u8], passphrase: &str, out: &mut impl Write) -> Result<()> {
    let salt = kdf::random_salt()?;
    let key_bytes = kdf::derive_key(passphrase, &salt)?;
    let mut nonce_bytes = [0u8; NONCE_LEN];
    getrandom::getrandom(&mut nonce_bytes)
        .map_err(|e| SeracError::Crypto(format!("failed to read randomness: {e}")))?;

    let header = Header {
        salt,
        nonce: nonce_bytes,
    };
    let aad = header.as_aad();

    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad: &aad,
            },
        )
        .map_err(|_| SeracError::Crypto("encryption failed".into()))?;

    header.write_to(out)?;
    out.write_all(&ciphertext)?;
    Ok(())
}

/// Parses the envelope read from `input`, derives the key from
/// `passphrase` using the embedded salt, and returns the authenticated
/// plaintext. Any tampering — header, ciphertext, or tag — surfaces as
/// `SeracError::Integrity` before any plaintext is returned.
pub fn decrypt(input: &mut impl Read, passphrase: &str, context: &str) -> Result<Vec<u8>> {
    let header = Header::read_from(input)?;
    let aad = header.as_aad();

    let mut ciphertext = Vec::new();
    input.read_to_end(&mut ciphertext)?;
    if ciphertext.len() < TAG_LEN {
        return Err(SeracError::Integrity(context.to_string()));
    }

    let key_bytes: [u8; KEY_LEN] = kdf::derive_key(passphrase, &header.salt)?;
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(&header.nonce);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: &ciphertext,
                aad: &aad,
            },
        )
        .map_err(|_| SeracError::Integrity(context.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let mut buf = Vec::new();
        encrypt(b"hello world", "correct horse", &mut buf).unwrap();
        let plain = decrypt(&mut &buf[..], "correct horse", "test").unwrap();
        assert_eq!(plain, b"hello world");
    }

    #[test]
    fn wrong_passphrase_is_integrity_error() {
        let mut buf = Vec::new();
        encrypt(b"hello world", "correct horse", &mut buf).unwrap();
        let err = decrypt(&mut &buf[..], "wrong horse", "test").unwrap_err();
        assert!(matches!(err, SeracError::Integrity(_)));
    }

    #[test]
    fn tampering_is_detected_before_plaintext_is_returned() {
        let mut buf = Vec::new();
        encrypt(b"hello world", "correct horse", &mut buf).unwrap();
        let last = buf.len() - 1;
        buf[last] ^= 0x01;
        let err = decrypt(&mut &buf[..], "correct horse", "test").unwrap_err();
        assert!(matches!(err, SeracError::Integrity(_)));
    }

    #[test]
    fn distinct_encryptions_of_same_plaintext_use_distinct_nonces() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        encrypt(b"same bytes", "pw", &mut a).unwrap();
        encrypt(b"same bytes", "pw", &mut b).unwrap();
        assert_ne!(a, b, "fresh nonce/salt per encryption must change ciphertext");
    }
}
