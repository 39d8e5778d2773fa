//! Ed25519 signatures for identities.
//!
//! A salty wallet stores its signing secret as the 64-byte keypair form
//! (32-byte seed followed by the 32-byte public key). Two signing modes
//! are offered:
//! - **detached**: the 64-byte signature alone
//! - **combined**: `signature(64) || message`, opened by the verifier to
//!   recover the message
//!
//! ## Usage
//!
//! ```ignore
//! use salty_crypto::signatures::SigningKey;
//! use rand_core::OsRng;
//!
//! let signing_key = SigningKey::generate(&mut OsRng);
//! let signed = signing_key.sign_combined(b"hello");
//! let message = signing_key.verifying_key().open(&signed)?;
//! ```

use std::fmt;

use ed25519_dalek::{Signer, Verifier};
use rand_core::{CryptoRng, RngCore};
use zeroize::{ZeroizeOnDrop, Zeroizing};

use crate::{CryptoError, ED25519_KEYPAIR_SIZE, ED25519_PUBLIC_KEY_SIZE, ED25519_SIGNATURE_SIZE};

/// Ed25519 signature (64 bytes)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature([u8; ED25519_SIGNATURE_SIZE]);

impl Signature {
    /// Create a signature from raw bytes
    #[must_use]
    pub fn from_bytes(bytes: [u8; ED25519_SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    /// Create a signature from a slice
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidSignature`] if the slice is not exactly 64 bytes.
    pub fn from_slice(slice: &[u8]) -> Result<Self, CryptoError> {
        let bytes: [u8; ED25519_SIGNATURE_SIZE] =
            slice.try_into().map_err(|_| CryptoError::InvalidSignature)?;
        Ok(Self(bytes))
    }

    /// Get the raw signature bytes
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; ED25519_SIGNATURE_SIZE] {
        &self.0
    }

    fn to_dalek(self) -> ed25519_dalek::Signature {
        ed25519_dalek::Signature::from_bytes(&self.0)
    }
}

/// Ed25519 signing key (private key)
///
/// Zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SigningKey {
    inner: ed25519_dalek::SigningKey,
}

impl SigningKey {
    /// Generate a new random signing key
    #[must_use]
    pub fn generate<R: RngCore + CryptoRng>(rng: &mut R) -> Self {
        Self {
            inner: ed25519_dalek::SigningKey::generate(rng),
        }
    }

    /// Restore from the 64-byte keypair form (seed followed by public key).
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidKeyMaterial`] if the embedded public key
    /// does not belong to the seed.
    pub fn from_keypair_bytes(bytes: &[u8; ED25519_KEYPAIR_SIZE]) -> Result<Self, CryptoError> {
        let inner = ed25519_dalek::SigningKey::from_keypair_bytes(bytes)
            .map_err(|_| CryptoError::InvalidKeyMaterial)?;
        Ok(Self { inner })
    }

    /// Export the 64-byte keypair form.
    ///
    /// # Security
    ///
    /// Contains the secret seed; the buffer is zeroized when dropped.
    #[must_use]
    pub fn to_keypair_bytes(&self) -> Zeroizing<[u8; ED25519_KEYPAIR_SIZE]> {
        Zeroizing::new(self.inner.to_keypair_bytes())
    }

    /// Produce a detached signature over `message`.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        Signature(self.inner.sign(message).to_bytes())
    }

    /// Produce a combined signed message: `signature || message`.
    #[must_use]
    pub fn sign_combined(&self, message: &[u8]) -> Vec<u8> {
        let signature = self.sign(message);
        let mut signed = Vec::with_capacity(ED25519_SIGNATURE_SIZE + message.len());
        signed.extend_from_slice(signature.as_bytes());
        signed.extend_from_slice(message);
        signed
    }

    /// Get the corresponding verifying key (public key)
    #[must_use]
    pub fn verifying_key(&self) -> VerifyingKey {
        VerifyingKey {
            inner: self.inner.verifying_key(),
        }
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningKey")
            .field("verifying_key", &self.verifying_key())
            .finish_non_exhaustive()
    }
}

/// Ed25519 verifying key (public key)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VerifyingKey {
    inner: ed25519_dalek::VerifyingKey,
}

impl VerifyingKey {
    /// Create from raw 32-byte public key
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidPublicKey`] if the bytes do not
    /// represent a valid Ed25519 public key point.
    pub fn from_bytes(bytes: &[u8; ED25519_PUBLIC_KEY_SIZE]) -> Result<Self, CryptoError> {
        let inner = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { inner })
    }

    /// Get the raw public key bytes
    #[must_use]
    pub fn to_bytes(&self) -> [u8; ED25519_PUBLIC_KEY_SIZE] {
        self.inner.to_bytes()
    }

    /// Verify a detached signature on a message
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidSignature`] if the signature does not
    /// authenticate the message.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> Result<(), CryptoError> {
        self.inner
            .verify(message, &signature.to_dalek())
            .map_err(|_| CryptoError::InvalidSignature)
    }

    /// Open a combined signed message and return the embedded message.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidSignature`] if the input is shorter than
    /// a signature or the embedded signature does not verify.
    pub fn open(&self, signed: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if signed.len() < ED25519_SIGNATURE_SIZE {
            return Err(CryptoError::InvalidSignature);
        }
        let (signature, message) = signed.split_at(ED25519_SIGNATURE_SIZE);
        self.verify(message, &Signature::from_slice(signature)?)?;
        Ok(message.to_vec())
    }
}
