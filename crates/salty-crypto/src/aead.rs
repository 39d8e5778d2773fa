//! `XChaCha20-Poly1305` AEAD encryption.
//!
//! Used for two things in the envelope format:
//! - sealing the 8-byte size announcement inside the ephemeral block
//! - sealing every frame of the chunk stream
//!
//! ## Security Properties
//!
//! - Confidentiality: `XChaCha20` stream cipher
//! - Integrity: Poly1305 MAC with 128-bit security
//! - Nonce misuse: 192-bit nonce makes random collisions negligible
//!
//! ## Usage
//!
//! ```ignore
//! use salty_crypto::aead::{AeadKey, Nonce};
//!
//! let key = AeadKey::new(hkdf_expand_key(&prk, b"salty/v1/stream"));
//! let nonce = Nonce::from_counter(0, &salt);
//!
//! let ciphertext = key.encrypt(&nonce, b"secret", b"aad")?;
//! let plaintext = key.decrypt(&nonce, &ciphertext, b"aad")?;
//! ```

use crate::CryptoError;
use chacha20poly1305::{
    XChaCha20Poly1305,
    aead::{Aead, KeyInit, Payload},
};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Authentication tag size (16 bytes / 128 bits).
pub const TAG_SIZE: usize = 16;

/// XChaCha20-Poly1305 nonce size (24 bytes / 192 bits).
pub const NONCE_SIZE: usize = crate::XCHACHA_NONCE_SIZE;

/// AEAD key size (32 bytes / 256 bits).
pub const KEY_SIZE: usize = crate::XCHACHA_KEY_SIZE;

/// Size of the per-message salt carried in counter nonces.
pub const NONCE_SALT_SIZE: usize = NONCE_SIZE - 8;

/// XChaCha20-Poly1305 nonce (24 bytes).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Create a nonce from raw bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; NONCE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a nonce from a counter value.
    ///
    /// The counter is placed in the first 8 bytes (little-endian),
    /// followed by the 16-byte per-message salt.
    #[must_use]
    pub fn from_counter(counter: u64, salt: &[u8; NONCE_SALT_SIZE]) -> Self {
        let mut bytes = [0u8; NONCE_SIZE];
        bytes[..8].copy_from_slice(&counter.to_le_bytes());
        bytes[8..].copy_from_slice(salt);
        Self(bytes)
    }

    fn as_generic(&self) -> &chacha20poly1305::XNonce {
        chacha20poly1305::XNonce::from_slice(&self.0)
    }
}

/// AEAD encryption key (32 bytes).
///
/// Key is zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AeadKey([u8; KEY_SIZE]);

impl AeadKey {
    /// Create a key from raw bytes.
    #[must_use]
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Encrypt plaintext with associated data.
    ///
    /// Returns ciphertext with appended authentication tag (`plaintext.len()` + 16 bytes).
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::EncryptionFailed` if AEAD encryption fails.
    pub fn encrypt(
        &self,
        nonce: &Nonce,
        plaintext: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        let cipher = XChaCha20Poly1305::new((&self.0).into());

        cipher
            .encrypt(
                nonce.as_generic(),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| CryptoError::EncryptionFailed)
    }

    /// Decrypt ciphertext with associated data.
    ///
    /// Input must include the authentication tag at the end.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::DecryptionFailed` on authentication failure.
    pub fn decrypt(
        &self,
        nonce: &Nonce,
        ciphertext_and_tag: &[u8],
        aad: &[u8],
    ) -> Result<Vec<u8>, CryptoError> {
        if ciphertext_and_tag.len() < TAG_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }

        let cipher = XChaCha20Poly1305::new((&self.0).into());

        cipher
            .decrypt(
                nonce.as_generic(),
                Payload {
                    msg: ciphertext_and_tag,
                    aad,
                },
            )
            .map_err(|_| CryptoError::DecryptionFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> AeadKey {
        AeadKey::new([0x42; KEY_SIZE])
    }

    fn nonce() -> Nonce {
        Nonce::from_counter(0, &[0x24; NONCE_SALT_SIZE])
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let key = key();
        let nonce = nonce();

        let ciphertext = key.encrypt(&nonce, b"hello, salty", b"aad").unwrap();
        assert_eq!(ciphertext.len(), 12 + TAG_SIZE);

        let plaintext = key.decrypt(&nonce, &ciphertext, b"aad").unwrap();
        assert_eq!(plaintext, b"hello, salty");
    }

    #[test]
    fn test_wrong_aad_fails() {
        let key = key();
        let nonce = nonce();

        let ciphertext = key.encrypt(&nonce, b"data", b"header-a").unwrap();
        assert!(key.decrypt(&nonce, &ciphertext, b"header-b").is_err());
    }

    #[test]
    fn test_wrong_key_fails() {
        let nonce = nonce();
        let ciphertext = key().encrypt(&nonce, b"data", b"").unwrap();

        assert!(matches!(
            AeadKey::new([0x43; KEY_SIZE]).decrypt(&nonce, &ciphertext, b""),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_tampered_ciphertext_fails() {
        let key = key();
        let nonce = nonce();

        let mut ciphertext = key.encrypt(&nonce, b"data", b"").unwrap();
        ciphertext[0] ^= 0x01;
        assert!(matches!(
            key.decrypt(&nonce, &ciphertext, b""),
            Err(CryptoError::DecryptionFailed)
        ));
    }

    #[test]
    fn test_short_input_rejected() {
        let nonce = Nonce::from_bytes([0u8; NONCE_SIZE]);
        assert!(key().decrypt(&nonce, &[0u8; TAG_SIZE - 1], b"").is_err());
    }

    #[test]
    fn test_counter_nonce_layout() {
        let salt = [0xAB; NONCE_SALT_SIZE];

        let mut expected = [0xAB; NONCE_SIZE];
        expected[..8].copy_from_slice(&0x0102u64.to_le_bytes());
        assert_eq!(Nonce::from_counter(0x0102, &salt), Nonce::from_bytes(expected));
    }

    #[test]
    fn test_counter_nonces_are_distinct() {
        let salt = [7u8; NONCE_SALT_SIZE];
        assert_ne!(Nonce::from_counter(0, &salt), Nonce::from_counter(1, &salt));
        assert_ne!(
            Nonce::from_counter(0, &salt),
            Nonce::from_counter(1 << 63, &salt)
        );
    }
}
