//! Payload preprocessing: compress, optionally encrypt, optionally CRC32.
//!
//! Forward order is compress -> encrypt -> (CRC32 if unencrypted). The
//! reverse strips/verifies CRC32, decrypts, then decompresses.

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use flate2::write::DeflateEncoder;
use flate2::read::DeflateDecoder;
use flate2::Compression;
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::io::{Read, Write};

use crate::error::{ModemError, Result};

const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

pub const FLAG_COMPRESSED: u8 = 0b001;
pub const FLAG_ENCRYPTED: u8 = 0b010;
pub const FLAG_CRC32: u8 = 0b100;

/// Result of [`prepare`]: what goes out over the wire, plus metadata the
/// header needs and a SHA-256 of the original plaintext for end-to-end
/// verification independent of the wire CRCs.
pub struct Prepared {
    pub payload: Vec<u8>,
    pub original_len: u16,
    pub flags: u8,
    pub sha256: [u8; 32],
}

fn derive_key(password: &str, salt: &[u8]) -> [u8; 32] {
    let mut key = [0u8; 32];
    pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, PBKDF2_ITERATIONS, &mut key);
    key
}

fn compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).expect("writing to an in-memory buffer cannot fail");
    encoder.finish().expect("finishing an in-memory buffer cannot fail")
}

fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = DeflateDecoder::new(data);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| ModemError::DecompressError(e.to_string()))?;
    Ok(out)
}

fn encrypt(data: &[u8], password: &str) -> Vec<u8> {
    let mut salt = [0u8; SALT_LEN];
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);

    let key_bytes = derive_key(password, &salt);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(&nonce_bytes);
    let ciphertext = cipher
        .encrypt(nonce, data)
        .expect("ChaCha20-Poly1305 encryption with a fresh nonce cannot fail");

    let mut out = Vec::with_capacity(SALT_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    out
}

fn decrypt(data: &[u8], password: &str) -> Result<Vec<u8>> {
    if data.len() < SALT_LEN + NONCE_LEN + TAG_LEN {
        return Err(ModemError::DecryptError("payload too short".into()));
    }
    let salt = &data[..SALT_LEN];
    let nonce_bytes = &data[SALT_LEN..SALT_LEN + NONCE_LEN];
    let ciphertext = &data[SALT_LEN + NONCE_LEN..];

    let key_bytes = derive_key(password, salt);
    let cipher = ChaCha20Poly1305::new(Key::from_slice(&key_bytes));
    let nonce = Nonce::from_slice(nonce_bytes);
    cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| ModemError::DecryptError("authentication tag mismatch".into()))
}

/// Compress, optionally encrypt, and (if unencrypted) append a CRC32.
pub fn prepare(data: &[u8], password: Option<&str>) -> Result<Prepared> {
    let sha256: [u8; 32] = Sha256::digest(data).into();
    let original_len = data
        .len()
        .try_into()
        .map_err(|_| ModemError::InvalidConfig("payload exceeds 65535 bytes".into()))?;

    let compressed = compress(data);
    let (body, compressed_flag) = if compressed.len() < data.len() {
        (compressed, FLAG_COMPRESSED)
    } else {
        (data.to_vec(), 0)
    };

    let mut flags = compressed_flag;
    let payload = if let Some(password) = password {
        flags |= FLAG_ENCRYPTED;
        encrypt(&body, password)
    } else {
        flags |= FLAG_CRC32;
        let mut with_crc = body;
        let crc = crc32fast::hash(&with_crc);
        with_crc.extend_from_slice(&crc.to_le_bytes());
        with_crc
    };

    Ok(Prepared {
        payload,
        original_len,
        flags,
        sha256,
    })
}

/// Reverse of [`prepare`]. Returns the recovered plaintext and its SHA-256,
/// so a caller can check it against the encoder's own report (see
/// scenario 2 in SPEC_FULL.md §8).
pub fn recover(
    payload: &[u8],
    flags: u8,
    original_len: u16,
    password: Option<&str>,
) -> Result<(Vec<u8>, [u8; 32])> {
    let encrypted = flags & FLAG_ENCRYPTED != 0;
    let compressed = flags & FLAG_COMPRESSED != 0;
    let has_crc32 = flags & FLAG_CRC32 != 0;

    let body = if encrypted {
        let password = password.ok_or_else(|| {
            ModemError::DecryptError("payload is encrypted but no password was given".into())
        })?;
        decrypt(payload, password)?
    } else {
        if has_crc32 {
            if payload.len() < 4 {
                return Err(ModemError::PayloadCrcFailed);
            }
            let (body, crc_bytes) = payload.split_at(payload.len() - 4);
            let expected = u32::from_le_bytes(crc_bytes.try_into().unwrap());
            if crc32fast::hash(body) != expected {
                return Err(ModemError::PayloadCrcFailed);
            }
            body.to_vec()
        } else {
            payload.to_vec()
        }
    };

    let plaintext = if compressed {
        let out = decompress(&body)?;
        if out.len() != original_len as usize {
            return Err(ModemError::DecompressError(format!(
                "expected {} bytes after decompression, got {}",
                original_len,
                out.len()
            )));
        }
        out
    } else {
        body
    };

    let sha256: [u8; 32] = Sha256::digest(&plaintext).into();
    Ok((plaintext, sha256))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_plain() {
        let data = b"hello world";
        let prepared = prepare(data, None).unwrap();
        let (out, sha) = recover(
            &prepared.payload,
            prepared.flags,
            prepared.original_len,
            None,
        )
        .unwrap();
        assert_eq!(out, data);
        assert_eq!(sha, prepared.sha256);
    }

    #[test]
    fn roundtrip_encrypted() {
        let data = b"Secret encrypted message";
        let prepared = prepare(data, Some("testpassword123")).unwrap();
        assert_ne!(prepared.flags & FLAG_ENCRYPTED, 0);
        let (out, _) = recover(
            &prepared.payload,
            prepared.flags,
            prepared.original_len,
            Some("testpassword123"),
        )
        .unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn wrong_password_fails() {
        let data = b"Secret encrypted message";
        let prepared = prepare(data, Some("testpassword123")).unwrap();
        let result = recover(
            &prepared.payload,
            prepared.flags,
            prepared.original_len,
            Some("wrongpassword"),
        );
        assert!(matches!(result, Err(ModemError::DecryptError(_))));
    }

    #[test]
    fn compression_flag_reflects_shrinkage() {
        let compressible = vec![b'a'; 1000];
        let prepared = prepare(&compressible, None).unwrap();
        assert_ne!(prepared.flags & FLAG_COMPRESSED, 0);

        let incompressible: Vec<u8> = (0..16u8).cycle().take(8).collect();
        let prepared2 = prepare(&incompressible, None).unwrap();
        assert_eq!(prepared2.flags & FLAG_COMPRESSED, 0);
    }

    #[test]
    fn corrupted_crc32_is_detected() {
        let data = b"some payload bytes";
        let mut prepared = prepare(data, None).unwrap();
        let last = prepared.payload.len() - 1;
        prepared.payload[last] ^= 0xFF;
        let result = recover(&prepared.payload, prepared.flags, prepared.original_len, None);
        assert!(matches!(result, Err(ModemError::PayloadCrcFailed)));
    }

    #[test]
    fn crc32_known_vector() {
        assert_eq!(crc32fast::hash(b"123456789"), 0xCBF4_3926);
    }
}
