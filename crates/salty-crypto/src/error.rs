//! Cryptographic error types.

use thiserror::Error;

/// Cryptographic errors
#[derive(Debug, Error)]
pub enum CryptoError {
    /// AEAD encryption failed
    #[error("encryption failed")]
    EncryptionFailed,

    /// AEAD decryption failed (authentication failure)
    #[error("decryption failed: authentication failure")]
    DecryptionFailed,

    /// Invalid key length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length
        expected: usize,
        /// Actual length
        actual: usize,
    },

    /// Key derivation failed
    #[error("key derivation failed")]
    KeyDerivationFailed,

    /// Random number generation failed
    #[error("random number generation failed: {0}")]
    RandomFailed(String),

    /// Invalid signature
    #[error("invalid signature")]
    InvalidSignature,

    /// Invalid public key (malformed point or low-order key agreement input)
    #[error("invalid public key")]
    InvalidPublicKey,

    /// Invalid parameter
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// Invalid key material (corrupted or wrong format)
    #[error("invalid key material")]
    InvalidKeyMaterial,

    /// Armored text block could not be parsed
    #[error("invalid armor: {0}")]
    InvalidArmor(String),

    /// Armored block is passphrase protected but no passphrase was supplied
    #[error("passphrase required")]
    PassphraseRequired,
}
