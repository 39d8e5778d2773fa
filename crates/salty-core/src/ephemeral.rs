//! Per-message ephemeral key exchange.
//!
//! The sender generates a one-time X25519 key, agrees a shared secret with
//! the recipient's long-term key and discards the one-time secret at once.
//! Only the public half travels:
//!
//! ```text
//! +------------------+--------------+----------------------------------+
//! | eph_pk (32B)     | nonce (24B)  | sealed u64 BE total size (24B)   |
//! +------------------+--------------+----------------------------------+
//! ```
//!
//! ## Key Schedule
//!
//! ```text
//! prk          = HKDF-Extract(salt = eph_pk || recipient_pk, ikm = shared)
//! announce_key = HKDF-Expand(prk, "salty/v1/announce")
//! stream_key   = HKDF-Expand(prk, "salty/v1/stream")
//! ```
//!
//! The size announcement is sealed under `announce_key` with the envelope
//! header as associated data, so a recipient mismatch, a tampered block and
//! a tampered header all fail the same authentication check.

use rand_core::OsRng;
use salty_crypto::aead::{AeadKey, Nonce};
use salty_crypto::hash::{hkdf_expand_key, hkdf_extract};
use salty_crypto::random::random_24;
use salty_crypto::x25519::{PrivateKey, PublicKey, SharedSecret};
use salty_crypto::{CryptoError, X25519_PUBLIC_KEY_SIZE};

use crate::error::{Error, Result};
use crate::identity::Identity;
use crate::stream::{ChunkDecryptor, ChunkEncryptor};
use crate::wallet::Wallet;
use crate::{EPHEMERAL_SIZE, NONCE_SIZE};

const ANNOUNCE_INFO: &[u8] = b"salty/v1/announce";
const STREAM_INFO: &[u8] = b"salty/v1/stream";

/// Sealed size announcement length (u64 + tag)
const SEALED_SIZE_LEN: usize = 8 + salty_crypto::aead::TAG_SIZE;

struct MessageKeys {
    announce: AeadKey,
    stream: AeadKey,
}

impl MessageKeys {
    fn derive(shared: &SharedSecret, eph_pk: &PublicKey, recipient_pk: &PublicKey) -> Self {
        let mut salt = [0u8; 2 * X25519_PUBLIC_KEY_SIZE];
        salt[..X25519_PUBLIC_KEY_SIZE].copy_from_slice(eph_pk.as_bytes());
        salt[X25519_PUBLIC_KEY_SIZE..].copy_from_slice(recipient_pk.as_bytes());

        let prk = zeroize::Zeroizing::new(hkdf_extract(&salt, shared.as_bytes()));

        Self {
            announce: AeadKey::new(hkdf_expand_key(&prk, ANNOUNCE_INFO)),
            stream: AeadKey::new(hkdf_expand_key(&prk, STREAM_INFO)),
        }
    }
}

/// One message's key-exchange artifact
pub struct Ephemeral {
    public: PublicKey,
    nonce: [u8; NONCE_SIZE],
    sealed_size: [u8; SEALED_SIZE_LEN],
    total_size: u64,
    stream_key: AeadKey,
}

impl std::fmt::Debug for Ephemeral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ephemeral")
            .field("public", &self.public)
            .field("total_size", &self.total_size)
            .finish_non_exhaustive()
    }
}

impl Ephemeral {
    /// Derive a fresh ephemeral for `recipient`.
    ///
    /// A random nonce is drawn when `nonce` is `None`. `header_aad` is bound
    /// into the size announcement.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Crypto`] if the recipient key is a low-order point,
    /// randomness is unavailable, or sealing fails.
    pub fn derive(
        recipient: &Identity,
        nonce: Option<[u8; NONCE_SIZE]>,
        total_size: u64,
        header_aad: &[u8],
    ) -> Result<Self> {
        let nonce = match nonce {
            Some(nonce) => nonce,
            None => random_24()?,
        };

        let one_time = PrivateKey::generate(&mut OsRng);
        let public = one_time.public_key();
        let shared = one_time.exchange(recipient.encrypt_pk());
        drop(one_time);
        let shared = shared?;

        let keys = MessageKeys::derive(&shared, &public, recipient.encrypt_pk());
        let sealed = keys.announce.encrypt(
            &Nonce::from_bytes(nonce),
            &total_size.to_be_bytes(),
            header_aad,
        )?;
        let sealed_size: [u8; SEALED_SIZE_LEN] = sealed
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::EncryptionFailed)?;

        tracing::debug!(
            recipient = %recipient.fingerprint(),
            total_size,
            "derived ephemeral"
        );

        Ok(Self {
            public,
            nonce,
            sealed_size,
            total_size,
            stream_key: keys.stream,
        })
    }

    /// Recover an ephemeral from its 80-byte block using the recipient wallet.
    ///
    /// # Errors
    ///
    /// - [`Error::Size`] if `buf` is not 80 bytes
    /// - [`Error::Crypto`] if the announcement does not authenticate (wrong
    ///   recipient, tampered block or tampered header)
    pub fn parse(wallet: &Wallet, buf: &[u8], header_aad: &[u8]) -> Result<Self> {
        if buf.len() != EPHEMERAL_SIZE {
            return Err(Error::Size {
                what: "ephemeral block",
                expected: EPHEMERAL_SIZE,
                actual: buf.len(),
            });
        }

        let (pk_bytes, rest) = buf.split_at(X25519_PUBLIC_KEY_SIZE);
        let (nonce_bytes, sealed) = rest.split_at(NONCE_SIZE);

        let public = PublicKey::from_slice(pk_bytes)?;
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(nonce_bytes);
        let mut sealed_size = [0u8; SEALED_SIZE_LEN];
        sealed_size.copy_from_slice(sealed);

        let shared = wallet.decrypt_sk().exchange(&public)?;
        let keys = MessageKeys::derive(&shared, &public, wallet.identity().encrypt_pk());

        let size_bytes = keys
            .announce
            .decrypt(&Nonce::from_bytes(nonce), &sealed_size, header_aad)?;
        let size_bytes: [u8; 8] = size_bytes
            .as_slice()
            .try_into()
            .map_err(|_| CryptoError::DecryptionFailed)?;
        let total_size = u64::from_be_bytes(size_bytes);

        tracing::debug!(total_size, "opened ephemeral");

        Ok(Self {
            public,
            nonce,
            sealed_size,
            total_size,
            stream_key: keys.stream,
        })
    }

    /// Serialize the 80-byte block.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; EPHEMERAL_SIZE] {
        let mut out = [0u8; EPHEMERAL_SIZE];
        out[..32].copy_from_slice(self.public.as_bytes());
        out[32..56].copy_from_slice(&self.nonce);
        out[56..].copy_from_slice(&self.sealed_size);
        out
    }

    /// One-time public key.
    #[must_use]
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Message nonce.
    #[must_use]
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Announced plaintext size.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Stream encryptor keyed for this message.
    #[must_use]
    pub fn encryptor(&self) -> ChunkEncryptor {
        ChunkEncryptor::new(self.stream_key.clone(), &self.nonce)
    }

    /// Stream decryptor keyed for this message.
    #[must_use]
    pub fn decryptor(&self) -> ChunkDecryptor {
        ChunkDecryptor::new(self.stream_key.clone(), &self.nonce, self.total_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AAD: &[u8] = b"From-Salty-Id: x\r\n";

    #[test]
    fn test_block_is_80_bytes_and_roundtrips() {
        let recipient = Wallet::generate(None, None);
        let eph = Ephemeral::derive(recipient.identity(), None, 12_345, AAD).unwrap();
        let block = eph.to_bytes();

        assert_eq!(block.len(), EPHEMERAL_SIZE);
        assert_eq!(&block[32..56], eph.nonce());

        let parsed = Ephemeral::parse(&recipient, &block, AAD).unwrap();
        assert_eq!(parsed.total_size(), 12_345);
        assert_eq!(parsed.nonce(), eph.nonce());
        assert_eq!(parsed.public_key(), eph.public_key());
    }

    #[test]
    fn test_explicit_nonce_used() {
        let recipient = Wallet::generate(None, None);
        let eph = Ephemeral::derive(recipient.identity(), Some([9u8; 24]), 0, AAD).unwrap();

        assert_eq!(eph.nonce(), &[9u8; 24]);
    }

    #[test]
    fn test_fresh_key_per_message() {
        let recipient = Wallet::generate(None, None);
        let a = Ephemeral::derive(recipient.identity(), Some([1u8; 24]), 5, AAD).unwrap();
        let b = Ephemeral::derive(recipient.identity(), Some([1u8; 24]), 5, AAD).unwrap();

        assert_ne!(a.public_key(), b.public_key());
        assert_ne!(a.to_bytes(), b.to_bytes());
    }

    #[test]
    fn test_wrong_recipient_is_crypto_error() {
        let intended = Wallet::generate(None, None);
        let other = Wallet::generate(None, None);
        let block = Ephemeral::derive(intended.identity(), None, 1, AAD)
            .unwrap()
            .to_bytes();

        assert!(Ephemeral::parse(&other, &block, AAD).unwrap_err().is_crypto());
    }

    #[test]
    fn test_tampered_header_is_crypto_error() {
        let recipient = Wallet::generate(None, None);
        let block = Ephemeral::derive(recipient.identity(), None, 1, AAD)
            .unwrap()
            .to_bytes();

        assert!(
            Ephemeral::parse(&recipient, &block, b"From-Salty-Id: y\r\n")
                .unwrap_err()
                .is_crypto()
        );
    }

    #[test]
    fn test_tampered_block_is_crypto_error() {
        let recipient = Wallet::generate(None, None);
        let block = Ephemeral::derive(recipient.identity(), None, 1, AAD)
            .unwrap()
            .to_bytes();

        for index in [0, 31, 32, 55, 56, 79] {
            let mut tampered = block;
            tampered[index] ^= 0x01;
            assert!(Ephemeral::parse(&recipient, &tampered, AAD).is_err(), "byte {index}");
        }
    }

    #[test]
    fn test_wrong_size_is_size_error() {
        let recipient = Wallet::generate(None, None);
        for len in [0, 79, 81] {
            assert!(
                Ephemeral::parse(&recipient, &vec![0u8; len], AAD)
                    .unwrap_err()
                    .is_size()
            );
        }
    }

    #[test]
    fn test_stream_keys_agree() {
        let recipient = Wallet::generate(None, None);
        let sender_side = Ephemeral::derive(recipient.identity(), None, 5, AAD).unwrap();
        let recipient_side =
            Ephemeral::parse(&recipient, &sender_side.to_bytes(), AAD).unwrap();

        let frame = sender_side
            .encryptor()
            .encrypt_chunk(b"hello", true)
            .unwrap();
        let mut decryptor = recipient_side.decryptor();
        decryptor.push(&frame);

        assert_eq!(decryptor.next_chunk().unwrap().unwrap(), b"hello");
        decryptor.finish().unwrap();
    }

    #[test]
    fn test_large_sizes_are_exact() {
        let recipient = Wallet::generate(None, None);
        let size = (1u64 << 53) + 1;
        let block = Ephemeral::derive(recipient.identity(), None, size, AAD)
            .unwrap()
            .to_bytes();

        assert_eq!(
            Ephemeral::parse(&recipient, &block, AAD).unwrap().total_size(),
            size
        );
    }
}
