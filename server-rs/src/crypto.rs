//! Symmetric encryption for store access tokens at rest.
//!
//! XChaCha20-Poly1305 with a SHA-256 derived key. The random 24-byte
//! nonce is prepended to the ciphertext and the whole blob hex-encoded,
//! so a column value is self-contained.

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    XChaCha20Poly1305, XNonce,
};
use sha2::{Digest, Sha256};

use crate::error::{AppError, AppResult};

pub fn encrypt(key: &str, plaintext: &str) -> AppResult<String> {
    let key_bytes: [u8; 32] = Sha256::digest(key.as_bytes()).into();
    let cipher = XChaCha20Poly1305::new_from_slice(&key_bytes)
        .map_err(|e| AppError::Internal(format!("Cipher init failed: {e}")))?;

    let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = cipher
        .encrypt(&nonce, plaintext.as_bytes())
        .map_err(|e| AppError::Internal(format!("Encryption failed: {e}")))?;

    let mut blob = nonce.to_vec();
    blob.extend_from_slice(&ciphertext);
    Ok(hex::encode(blob))
}

pub fn decrypt(key: &str, encoded: &str) -> AppResult<String> {
    let key_bytes: [u8; 32] = Sha256::digest(key.as_bytes()).into();
    let raw = hex::decode(encoded)
        .map_err(|e| AppError::Internal(format!("Invalid ciphertext hex: {e}")))?;

    if raw.len() < 24 {
        return Err(AppError::Internal(
            "Ciphertext too short (missing nonce)".into(),
        ));
    }

    let (nonce_bytes, ciphertext) = raw.split_at(24);
    let nonce = XNonce::from_slice(nonce_bytes);
    let cipher = XChaCha20Poly1305::new_from_slice(&key_bytes)
        .map_err(|e| AppError::Internal(format!("Cipher init failed: {e}")))?;

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| AppError::Internal("Decryption failed".into()))?;

    String::from_utf8(plaintext)
        .map_err(|e| AppError::Internal(format!("Decrypted data not UTF-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let token = "shpat_0123456789abcdef";
        let enc = encrypt("secret-key", token).unwrap();
        assert_ne!(enc, token);
        assert_eq!(decrypt("secret-key", &enc).unwrap(), token);
    }

    #[test]
    fn nonce_makes_ciphertexts_differ() {
        let a = encrypt("k", "same-plaintext").unwrap();
        let b = encrypt("k", "same-plaintext").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_key_fails() {
        let enc = encrypt("key-a", "token").unwrap();
        assert!(decrypt("key-b", &enc).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let enc = encrypt("k", "token").unwrap();
        let mut raw = hex::decode(&enc).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert!(decrypt("k", &hex::encode(raw)).is_err());
    }
}
