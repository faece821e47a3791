//! Passphrase-based encryption for the storage file.
//!
//! Layout of a sealed file: `FSK1 | salt (16) | nonce (12) | ciphertext`.
//! The key is derived with Argon2id from the passphrase and salt; the
//! payload is encrypted with ChaCha20-Poly1305 under a fresh nonce per write.

use anyhow::{anyhow, bail, Result};
use argon2::Argon2;
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::RngCore;

const MAGIC: &[u8; 4] = b"FSK1";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;
const HEADER_LEN: usize = MAGIC.len() + SALT_LEN + NONCE_LEN;

/// A derived encryption key together with the salt it was derived from.
pub struct SealedKey {
    salt: [u8; SALT_LEN],
    key: [u8; KEY_LEN],
}

impl SealedKey {
    /// Derive a key for a new file under a random salt.
    pub fn derive(passphrase: &str) -> Result<Self> {
        let mut salt = [0u8; SALT_LEN];
        rand::thread_rng().fill_bytes(&mut salt);
        Self::derive_with_salt(passphrase, salt)
    }

    fn derive_with_salt(passphrase: &str, salt: [u8; SALT_LEN]) -> Result<Self> {
        let mut key = [0u8; KEY_LEN];
        Argon2::default()
            .hash_password_into(passphrase.as_bytes(), &salt, &mut key)
            .map_err(|e| anyhow!("Key derivation failed: {}", e))?;
        Ok(Self { salt, key })
    }

    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext)
            .map_err(|e| anyhow!("Encryption failed: {}", e))?;

        let mut out = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt a sealed file, returning the key (for later writes) and plaintext.
    pub fn unseal(passphrase: &str, sealed: &[u8]) -> Result<(Self, Vec<u8>)> {
        if sealed.len() < HEADER_LEN || &sealed[..MAGIC.len()] != MAGIC {
            bail!("Not a sealed storage file");
        }
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&sealed[MAGIC.len()..MAGIC.len() + SALT_LEN]);
        let nonce = &sealed[MAGIC.len() + SALT_LEN..HEADER_LEN];

        let key = Self::derive_with_salt(passphrase, salt)?;
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key.key));
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), &sealed[HEADER_LEN..])
            .map_err(|_| anyhow!("Wrong passphrase or corrupted file"))?;
        Ok((key, plaintext))
    }
}
