//! Symmetric encryption for the license record at rest.
//!
//! AES-256-GCM with a key derived from the device fingerprint and product
//! code. The record is bound to the machine: copying the file elsewhere
//! yields a blob that does not decrypt.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};

use rand::rngs::OsRng;
use rand::TryRngCore;

use sha2::{Digest, Sha256};

use crate::errors::{LicenseError, LicenseResult};

/// AES-256 key size in bytes.
pub const KEY_SIZE: usize = 32;

/// GCM nonce size in bytes (96-bit).
pub const NONCE_SIZE: usize = 12;

const KEY_CONTEXT: &[u8] = b"netviper-pos/license-record/v1";

/// Derive the record key for this device and product.
pub fn derive_key(device_fingerprint: &str, product_code: &str) -> [u8; KEY_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(KEY_CONTEXT);
    hasher.update([0u8]);
    hasher.update(device_fingerprint.as_bytes());
    hasher.update([0u8]);
    hasher.update(product_code.as_bytes());
    hasher.finalize().into()
}

/// Encrypt arbitrary bytes using AES-256-GCM.
///
/// Output format:
///   [nonce (12 bytes)] || [ciphertext+tag]
pub fn encrypt_bytes(plaintext: &[u8], key: &[u8; KEY_SIZE]) -> LicenseResult<Vec<u8>> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng
        .try_fill_bytes(&mut nonce_bytes)
        .map_err(|e| LicenseError::EncryptionError(format!("nonce generation failed: {e}")))?;
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| LicenseError::EncryptionError(format!("encryption failed: {e}")))?;

    let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    output.extend_from_slice(&nonce_bytes);
    output.append(&mut ciphertext);

    Ok(output)
}

/// Decrypt bytes produced by `encrypt_bytes`.
pub fn decrypt_bytes(ciphertext: &[u8], key: &[u8; KEY_SIZE]) -> LicenseResult<Vec<u8>> {
    if ciphertext.len() <= NONCE_SIZE {
        return Err(LicenseError::DecryptionError(
            "ciphertext too short".to_string(),
        ));
    }

    let (nonce_bytes, ct) = ciphertext.split_at(NONCE_SIZE);
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ct)
        .map_err(|e| LicenseError::DecryptionError(format!("decryption failed: {e}")))
}
