//! Authenticated encryption for the vault file.
//!
//! ChaCha20-Poly1305 with a 256-bit key and a random 96-bit nonce per
//! encrypt call. Wire layout: bytes 0..12 are the nonce, the rest is the
//! AEAD ciphertext with the Poly1305 tag appended. Any modification of the
//! ciphertext, or decryption under a different key, fails authentication.

use chacha20poly1305::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    ChaCha20Poly1305, Key, Nonce,
};
use zeroize::Zeroize;

use keepsake_core::constants::{KEY_LEN, NONCE_LEN};
use keepsake_core::VaultError;

/// AEAD cipher bound to one vault key. The key bytes are wiped on drop.
pub struct VaultCipher {
    key: [u8; KEY_LEN],
}

impl VaultCipher {
    pub fn new(key: [u8; KEY_LEN]) -> Self {
        Self { key }
    }

    /// Encrypt `plaintext`, returning nonce ‖ ciphertext.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| VaultError::Storage("encryption failed".into()))?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    /// Decrypt nonce ‖ ciphertext. Fails with an integrity error on tag
    /// mismatch or truncation; callers treat that as fatal for the blob and
    /// attempt backup recovery.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, VaultError> {
        if data.len() < NONCE_LEN {
            return Err(VaultError::TruncatedCiphertext(data.len()));
        }
        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&self.key));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| VaultError::DecryptionFailed)
    }
}

impl Drop for VaultCipher {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for VaultCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "VaultCipher {{ .. }}")
    }
}
