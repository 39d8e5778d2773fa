//! Long-term secret container.
//!
//! A wallet is the 96-byte concatenation `decrypt_sk(32) || sign_sk(64)`,
//! where `sign_sk` is the Ed25519 keypair form (seed followed by public key).
//! On disk it is an armored `SALTY WALLET` block, optionally
//! passphrase-encrypted with Argon2id + XChaCha20-Poly1305.

use rand_core::OsRng;
use salty_crypto::CryptoError;
use salty_crypto::armor::{self, KeyEncryptionParams};
use salty_crypto::signatures::{Signature, SigningKey};
use salty_crypto::x25519::PrivateKey;
use zeroize::Zeroizing;

use crate::error::{Error, FormatError, Result};
use crate::identity::Identity;
use crate::WALLET_SIZE;

/// Armor label of wallet blocks
pub const WALLET_LABEL: &str = "SALTY WALLET";

/// Whether an armored wallet is passphrase protected.
#[must_use]
pub fn is_encrypted_armor(text: &str) -> bool {
    armor::is_encrypted(text)
}

/// A user's long-term secret keys and the identity they belong to
#[derive(Clone)]
pub struct Wallet {
    decrypt_sk: PrivateKey,
    sign_sk: SigningKey,
    identity: Identity,
}

impl Wallet {
    /// Generate a fresh wallet.
    #[must_use]
    pub fn generate(name: Option<&str>, email: Option<&str>) -> Self {
        let decrypt_sk = PrivateKey::generate(&mut OsRng);
        let sign_sk = SigningKey::generate(&mut OsRng);
        let identity = Identity::new(
            decrypt_sk.public_key(),
            sign_sk.verifying_key(),
            name,
            email,
        );

        Self {
            decrypt_sk,
            sign_sk,
            identity,
        }
    }

    /// Decode the raw 96-byte secret.
    ///
    /// The identity carries no name or email; attach a stored pubkey with
    /// [`Wallet::with_identity`].
    ///
    /// # Errors
    ///
    /// - [`Error::Size`] if `buf` is not 96 bytes
    /// - [`FormatError::InvalidWallet`] if the signing keypair is inconsistent
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() != WALLET_SIZE {
            return Err(Error::Size {
                what: "wallet",
                expected: WALLET_SIZE,
                actual: buf.len(),
            });
        }

        let mut decrypt_bytes = Zeroizing::new([0u8; 32]);
        decrypt_bytes.copy_from_slice(&buf[..32]);
        let decrypt_sk = PrivateKey::from_bytes(*decrypt_bytes);

        let mut sign_bytes = Zeroizing::new([0u8; 64]);
        sign_bytes.copy_from_slice(&buf[32..]);
        let sign_sk = SigningKey::from_keypair_bytes(&sign_bytes)
            .map_err(|_| FormatError::InvalidWallet("signing keypair is inconsistent".into()))?;

        let identity = Identity::new(decrypt_sk.public_key(), sign_sk.verifying_key(), None, None);

        Ok(Self {
            decrypt_sk,
            sign_sk,
            identity,
        })
    }

    /// Serialize the raw 96-byte secret.
    #[must_use]
    pub fn to_bytes(&self) -> Zeroizing<[u8; WALLET_SIZE]> {
        let mut out = Zeroizing::new([0u8; WALLET_SIZE]);
        out[..32].copy_from_slice(&self.decrypt_sk.to_bytes());
        out[32..].copy_from_slice(self.sign_sk.to_keypair_bytes().as_slice());
        out
    }

    /// Attach a stored pubkey (for its name and email).
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::WalletMismatch`] if the pubkey's keys are not
    /// the public halves of this wallet.
    pub fn with_identity(mut self, identity: Identity) -> Result<Self> {
        if !self.identity.same_keys(&identity) {
            return Err(FormatError::WalletMismatch.into());
        }
        self.identity = identity;
        Ok(self)
    }

    /// The identity this wallet decrypts and signs for.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Sign a message: a 64-byte detached signature, or `signature || message`.
    #[must_use]
    pub fn sign(&self, message: &[u8], detached: bool) -> Vec<u8> {
        if detached {
            self.sign_detached(message).as_bytes().to_vec()
        } else {
            self.sign_sk.sign_combined(message)
        }
    }

    /// Produce a detached signature over `message`.
    #[must_use]
    pub fn sign_detached(&self, message: &[u8]) -> Signature {
        self.sign_sk.sign(message)
    }

    pub(crate) fn decrypt_sk(&self) -> &PrivateKey {
        &self.decrypt_sk
    }

    /// Wrap the wallet in armor, encrypted when a passphrase is given.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Crypto`] if the KDF parameters are invalid or
    /// encryption fails.
    pub fn to_armored(
        &self,
        passphrase: Option<&[u8]>,
        params: KeyEncryptionParams,
    ) -> Result<String> {
        let secret = self.to_bytes();
        Ok(armor::armor(WALLET_LABEL, secret.as_slice(), passphrase, params)?)
    }

    /// Decode an armored wallet.
    ///
    /// # Errors
    ///
    /// - [`FormatError::InvalidWallet`] if the armor is malformed
    /// - [`CryptoError::PassphraseRequired`] if the block is encrypted and no
    ///   passphrase was given
    /// - [`Error::Crypto`] if the passphrase is wrong
    /// - [`Error::Size`] if the decoded secret is not 96 bytes
    pub fn from_armored(text: &str, passphrase: Option<&[u8]>) -> Result<Self> {
        let secret = armor::dearmor(WALLET_LABEL, text, passphrase).map_err(|e| match e {
            CryptoError::InvalidArmor(reason) => Error::Format(FormatError::InvalidWallet(reason)),
            other => Error::Crypto(other),
        })?;

        Self::parse(&secret)
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Wallet")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
