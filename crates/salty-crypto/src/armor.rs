//! # Armored Secret Storage
//!
//! PEM-style text armor for long-term secrets, with optional passphrase
//! protection.
//!
//! ## Security Properties
//!
//! - **Key Derivation:** Argon2id with configurable parameters
//! - **Encryption:** XChaCha20-Poly1305 AEAD
//! - **Memory Safety:** decrypted secrets are returned in `Zeroizing` buffers
//! - **Version Migration:** Extensible format with version field
//!
//! ## Text Format
//!
//! ```text
//! -----BEGIN SALTY WALLET-----
//! Proc-Type: 4,ENCRYPTED
//! DEK-Info: ARGON2ID-XCHACHA20POLY1305
//!
//! <base64 body, 64 columns>
//! -----END SALTY WALLET-----
//! ```
//!
//! The two header lines are only present for passphrase-protected blocks.
//!
//! ## Encrypted Body Format
//!
//! ```text
//! +----------------+----------------+----------------+
//! | Version (1B)   | Argon2 Params  | Salt (32B)     |
//! +----------------+----------------+----------------+
//! | Nonce (24B)    | Ciphertext (secret + 16B tag)   |
//! +----------------+-----------------------------------+
//! ```

use argon2::{Algorithm, Argon2, Params, ParamsBuilder, Version};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::CryptoError;
use crate::random::fill_random;

/// Current format version for encrypted bodies.
const FORMAT_VERSION: u8 = 1;

/// Size of salt for Argon2 key derivation.
const SALT_SIZE: usize = 32;

/// Size of nonce for XChaCha20-Poly1305.
const NONCE_SIZE: usize = 24;

/// Size of authentication tag.
const TAG_SIZE: usize = 16;

/// Size of the serialized Argon2 parameters.
const PARAMS_SIZE: usize = 6;

/// Body header size: version + params + salt + nonce.
const BODY_HEADER_SIZE: usize = 1 + PARAMS_SIZE + SALT_SIZE + NONCE_SIZE;

/// Base64 line width inside the armor.
const LINE_WIDTH: usize = 64;

const PROC_TYPE_ENCRYPTED: &str = "Proc-Type: 4,ENCRYPTED";
const DEK_ALGORITHM: &str = "ARGON2ID-XCHACHA20POLY1305";

/// Parameters for Argon2id key derivation.
///
/// Default values follow OWASP recommendations for high-security applications:
/// - Memory: 64 MiB (65536 KiB)
/// - Iterations: 4
/// - Parallelism: 4
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEncryptionParams {
    /// Memory cost in KiB (default: 65536 = 64 MiB)
    pub memory_cost_kib: u32,
    /// Number of iterations (default: 4)
    pub iterations: u32,
    /// Degree of parallelism (default: 4)
    pub parallelism: u32,
}

impl Default for KeyEncryptionParams {
    fn default() -> Self {
        Self {
            memory_cost_kib: 65536,
            iterations: 4,
            parallelism: 4,
        }
    }
}

impl KeyEncryptionParams {
    /// Low-cost parameters for tests and constrained machines.
    ///
    /// **Warning:** Only use for testing. Not suitable for production.
    #[must_use]
    pub fn low_security() -> Self {
        Self {
            memory_cost_kib: 4096,
            iterations: 2,
            parallelism: 1,
        }
    }

    /// Validate parameters are within the bounds the body format can carry.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::InvalidParameter`] naming the offending field.
    pub fn validate(&self) -> Result<(), CryptoError> {
        // Argon2 minimum is 8 KiB; the body stores memory in 3 bytes
        if self.memory_cost_kib < 8 || self.memory_cost_kib > 0x00FF_FFFF {
            return Err(CryptoError::InvalidParameter(
                "memory_cost_kib must be between 8 KiB and 16 GiB".into(),
            ));
        }

        if self.iterations < 1 || self.iterations > u32::from(u16::MAX) {
            return Err(CryptoError::InvalidParameter(
                "iterations must be between 1 and 65535".into(),
            ));
        }

        if self.parallelism < 1 || self.parallelism > 255 {
            return Err(CryptoError::InvalidParameter(
                "parallelism must be between 1 and 255".into(),
            ));
        }

        Ok(())
    }

    fn build_argon2_params(&self) -> Result<Params, CryptoError> {
        self.validate()?;

        ParamsBuilder::new()
            .m_cost(self.memory_cost_kib)
            .t_cost(self.iterations)
            .p_cost(self.parallelism)
            .build()
            .map_err(|e| CryptoError::InvalidParameter(format!("Argon2 params: {e}")))
    }

    fn to_bytes(self) -> [u8; PARAMS_SIZE] {
        let mut bytes = [0u8; PARAMS_SIZE];
        bytes[0..3].copy_from_slice(&self.memory_cost_kib.to_le_bytes()[0..3]);
        bytes[3..5].copy_from_slice(&(self.iterations as u16).to_le_bytes());
        bytes[5] = self.parallelism as u8;
        bytes
    }

    fn from_bytes(bytes: &[u8; PARAMS_SIZE]) -> Self {
        let memory_cost_kib = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]);
        let iterations = u32::from(u16::from_le_bytes([bytes[3], bytes[4]]));
        let parallelism = u32::from(bytes[5]);

        Self {
            memory_cost_kib,
            iterations,
            parallelism,
        }
    }
}

/// A passphrase-encrypted secret with its key-derivation metadata.
#[derive(Clone)]
pub struct EncryptedSecret {
    version: u8,
    params: KeyEncryptionParams,
    salt: [u8; SALT_SIZE],
    nonce: [u8; NONCE_SIZE],
    ciphertext: Vec<u8>,
}

impl EncryptedSecret {
    /// Encrypt a secret of any length with a passphrase.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are invalid, randomness is
    /// unavailable, or encryption fails.
    pub fn encrypt(
        secret: &[u8],
        passphrase: &[u8],
        params: KeyEncryptionParams,
    ) -> Result<Self, CryptoError> {
        params.validate()?;

        let mut salt = [0u8; SALT_SIZE];
        fill_random(&mut salt)?;

        let mut nonce = [0u8; NONCE_SIZE];
        fill_random(&mut nonce)?;

        let derived_key = derive_key(passphrase, &salt, &params)?;
        let cipher = XChaCha20Poly1305::new_from_slice(derived_key.as_slice())
            .map_err(|_| CryptoError::KeyDerivationFailed)?;

        let ciphertext = cipher
            .encrypt(XNonce::from_slice(&nonce), secret)
            .map_err(|_| CryptoError::EncryptionFailed)?;

        Ok(Self {
            version: FORMAT_VERSION,
            params,
            salt,
            nonce,
            ciphertext,
        })
    }

    /// Decrypt the secret using the passphrase.
    ///
    /// # Errors
    ///
    /// Returns [`CryptoError::DecryptionFailed`] if the passphrase is wrong
    /// or the body has been tampered with.
    pub fn decrypt(&self, passphrase: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let derived_key = derive_key(passphrase, &self.salt, &self.params)?;
        let cipher = XChaCha20Poly1305::new_from_slice(derived_key.as_slice())
            .map_err(|_| CryptoError::KeyDerivationFailed)?;

        cipher
            .decrypt(XNonce::from_slice(&self.nonce), self.ciphertext.as_slice())
            .map(Zeroizing::new)
            .map_err(|_| CryptoError::DecryptionFailed)
    }

    /// Serialize to the binary body format.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(BODY_HEADER_SIZE + self.ciphertext.len());

        bytes.push(self.version);
        bytes.extend_from_slice(&self.params.to_bytes());
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.nonce);
        bytes.extend_from_slice(&self.ciphertext);

        bytes
    }

    /// Deserialize from the binary body format.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is too short, the version is
    /// unsupported, or the embedded parameters are out of range.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() < BODY_HEADER_SIZE + TAG_SIZE {
            return Err(CryptoError::InvalidKeyMaterial);
        }

        let (header, ciphertext) = bytes.split_at(BODY_HEADER_SIZE);
        let version = header[0];
        if version != FORMAT_VERSION {
            return Err(CryptoError::InvalidParameter(format!(
                "unsupported format version: {version}"
            )));
        }

        let mut params_bytes = [0u8; PARAMS_SIZE];
        params_bytes.copy_from_slice(&header[1..1 + PARAMS_SIZE]);
        let params = KeyEncryptionParams::from_bytes(&params_bytes);
        params.validate()?;

        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&header[1 + PARAMS_SIZE..1 + PARAMS_SIZE + SALT_SIZE]);

        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&header[1 + PARAMS_SIZE + SALT_SIZE..]);

        Ok(Self {
            version,
            params,
            salt,
            nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Wrap `secret` in an armored text block labelled `label`.
///
/// With a passphrase the body is an [`EncryptedSecret`]; without one the
/// body is the plain base64 of the secret.
///
/// # Errors
///
/// Returns an error if passphrase encryption fails.
pub fn armor(
    label: &str,
    secret: &[u8],
    passphrase: Option<&[u8]>,
    params: KeyEncryptionParams,
) -> Result<String, CryptoError> {
    let mut out = format!("-----BEGIN {label}-----\n");

    let body = match passphrase {
        Some(passphrase) => {
            out.push_str(PROC_TYPE_ENCRYPTED);
            out.push('\n');
            out.push_str(&format!("DEK-Info: {DEK_ALGORITHM}\n\n"));
            Zeroizing::new(EncryptedSecret::encrypt(secret, passphrase, params)?.to_bytes())
        }
        None => Zeroizing::new(secret.to_vec()),
    };

    let encoded = Zeroizing::new(BASE64.encode(body.as_slice()));
    for line in encoded.as_bytes().chunks(LINE_WIDTH) {
        // base64 output is ASCII, so every chunk boundary is a char boundary
        out.push_str(&String::from_utf8_lossy(line));
        out.push('\n');
    }

    out.push_str(&format!("-----END {label}-----"));
    Ok(out)
}

/// Whether an armored block declares passphrase protection.
#[must_use]
pub fn is_encrypted(text: &str) -> bool {
    text.lines().any(|line| line.trim() == PROC_TYPE_ENCRYPTED)
}

/// Unwrap an armored text block labelled `label`.
///
/// # Errors
///
/// - [`CryptoError::InvalidArmor`] if the markers, label, headers or base64
///   body are malformed
/// - [`CryptoError::PassphraseRequired`] if the block is encrypted and no
///   passphrase was given
/// - [`CryptoError::DecryptionFailed`] if the passphrase is wrong
pub fn dearmor(
    label: &str,
    text: &str,
    passphrase: Option<&[u8]>,
) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
    let begin = format!("-----BEGIN {label}-----");
    let end = format!("-----END {label}-----");

    let mut lines = text
        .lines()
        .map(str::trim)
        .skip_while(|line| line.is_empty());

    if lines.next() != Some(begin.as_str()) {
        return Err(CryptoError::InvalidArmor(format!("missing `{begin}` marker")));
    }

    let mut encrypted = false;
    let mut body = Zeroizing::new(String::new());
    let mut closed = false;

    for line in lines.by_ref() {
        if line == end {
            closed = true;
            break;
        }
        if let Some((key, value)) = line.split_once(": ") {
            match key {
                "Proc-Type" if value == "4,ENCRYPTED" => encrypted = true,
                "DEK-Info" if value == DEK_ALGORITHM => {}
                _ => {
                    return Err(CryptoError::InvalidArmor(format!(
                        "unsupported header `{line}`"
                    )));
                }
            }
            continue;
        }
        body.push_str(line);
    }

    if !closed {
        return Err(CryptoError::InvalidArmor(format!("missing `{end}` marker")));
    }
    if lines.any(|line| !line.is_empty()) {
        return Err(CryptoError::InvalidArmor("trailing data after armor".into()));
    }

    let decoded = Zeroizing::new(
        BASE64
            .decode(body.as_bytes())
            .map_err(|e| CryptoError::InvalidArmor(format!("base64 body: {e}")))?,
    );

    if !encrypted {
        return Ok(decoded);
    }

    let passphrase = passphrase.ok_or(CryptoError::PassphraseRequired)?;
    EncryptedSecret::from_bytes(&decoded)?.decrypt(passphrase)
}

fn derive_key(
    passphrase: &[u8],
    salt: &[u8; SALT_SIZE],
    params: &KeyEncryptionParams,
) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
    let argon2_params = params.build_argon2_params()?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let mut derived_key = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(passphrase, salt, derived_key.as_mut_slice())
        .map_err(|_| CryptoError::KeyDerivationFailed)?;

    Ok(derived_key)
}
