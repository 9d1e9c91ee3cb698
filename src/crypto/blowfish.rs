//! Blowfish-CBC decoding for remote-config credential entries.
//!
//! Entries arrive base64-encoded. Padding is PKCS#7 in practice, but the
//! trim is lenient: a final byte outside `1..=8` means "unpadded" and the
//! plaintext is returned as is instead of failing.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use blowfish::Blowfish;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};

use crate::errors::ServiceError;

/// Blowfish block size in bytes
pub const BLOCK_SIZE: usize = 8;

type BlowfishCbcDec = cbc::Decryptor<Blowfish>;

/// Decrypts a base64 Blowfish-CBC ciphertext with a UTF-8 key and IV.
pub fn decrypt_blowfish(encrypted_base64: &str, key: &str, iv: &str) -> Result<String, ServiceError> {
    let mut buffer = BASE64
        .decode(encrypted_base64.trim())
        .map_err(|e| ServiceError::Decryption(format!("invalid base64: {}", e)))?;
    if buffer.is_empty() {
        return Err(ServiceError::Decryption("empty ciphertext".to_owned()));
    }

    let decryptor = BlowfishCbcDec::new_from_slices(key.as_bytes(), iv.as_bytes())
        .map_err(|_| ServiceError::Decryption(format!(
            "invalid key/iv size (key {} bytes, iv {} bytes)",
            key.len(),
            iv.len()
        )))?;

    let ciphertext_len = buffer.len();
    let decrypted = decryptor
        .decrypt_padded_mut::<NoPadding>(&mut buffer)
        .map_err(|_| ServiceError::Decryption(format!(
            "ciphertext length {} is not a multiple of {}",
            ciphertext_len,
            BLOCK_SIZE
        )))?;

    let plaintext = strip_pkcs7_lenient(decrypted);

    String::from_utf8(plaintext.to_vec())
        .map_err(|e| ServiceError::Decryption(format!("plaintext is not valid UTF-8: {}", e)))
}

/// Trims `p` trailing bytes when the last byte `p` is in `1..=BLOCK_SIZE`.
pub fn strip_pkcs7_lenient(data: &[u8]) -> &[u8] {
    match data.last() {
        Some(&pad) if pad >= 1 && (pad as usize) <= BLOCK_SIZE && (pad as usize) <= data.len() => {
            &data[..data.len() - pad as usize]
        }
        _ => data,
    }
}
