//! `salty-id` identity text format.
//!
//! An identity is a self-certifying public key pair plus optional display
//! metadata:
//!
//! ```text
//! salty-id <base64url(encrypt_pk(32) || verify_pk(32))> ["name"] [<email>]
//! ```
//!
//! The key blob is base64url without padding. Double quotes are removed from
//! names and `>` from emails when building, and CR/LF are removed from both,
//! so the canonical text always parses back to the same identity.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use regex::Regex;
use salty_crypto::hash;
use salty_crypto::signatures::{Signature, VerifyingKey};
use salty_crypto::x25519::PublicKey;

use crate::error::{Error, FormatError, Result};
use crate::IDENTITY_KEY_SIZE;

/// Leading tag of every pubkey line
pub const ID_TAG: &str = "salty-id";

static PUBKEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^\s*(\S+)\s+([A-Za-z0-9_-]+)\s*(?:"([^"]*)")?\s*(?:<([^>]*)>)?\s*$"#)
        .expect("static regex is valid")
});

/// Build the canonical pubkey text for a key pair and optional metadata.
#[must_use]
pub fn build_pubkey(
    encrypt_pk: &[u8; 32],
    verify_pk: &[u8; 32],
    name: Option<&str>,
    email: Option<&str>,
) -> String {
    let mut blob = [0u8; IDENTITY_KEY_SIZE];
    blob[..32].copy_from_slice(encrypt_pk);
    blob[32..].copy_from_slice(verify_pk);

    let mut out = format!("{ID_TAG} {}", URL_SAFE_NO_PAD.encode(blob));
    if let Some(name) = sanitize(name, '"') {
        out.push_str(&format!(" \"{name}\""));
    }
    if let Some(email) = sanitize(email, '>') {
        out.push_str(&format!(" <{email}>"));
    }
    out
}

/// Strip the closing delimiter and line breaks; empty values become `None`.
fn sanitize(value: Option<&str>, delimiter: char) -> Option<String> {
    value
        .map(|v| {
            v.chars()
                .filter(|&c| c != delimiter && c != '\r' && c != '\n')
                .collect::<String>()
        })
        .filter(|v| !v.is_empty())
}

/// Public half of a Salty keypair
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    encrypt_pk: PublicKey,
    verify_pk: VerifyingKey,
    name: Option<String>,
    email: Option<String>,
}

impl Identity {
    /// Assemble an identity from its keys and metadata.
    #[must_use]
    pub fn new(
        encrypt_pk: PublicKey,
        verify_pk: VerifyingKey,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Self {
        Self {
            encrypt_pk,
            verify_pk,
            name: sanitize(name, '"'),
            email: sanitize(email, '>'),
        }
    }

    /// Parse a `salty-id` pubkey line.
    ///
    /// # Errors
    ///
    /// Returns [`FormatError`] if the text does not match the pattern, the tag
    /// is not `salty-id`, the token is not base64url, or the decoded key blob
    /// is not exactly 64 bytes of valid keys.
    pub fn parse(input: &str) -> Result<Self> {
        let captures = PUBKEY_RE
            .captures(input)
            .ok_or_else(|| FormatError::InvalidPubkey("does not match salty-id pattern".into()))?;

        let tag = &captures[1];
        if tag != ID_TAG {
            return Err(FormatError::BadTag(tag.to_string()).into());
        }

        let blob = URL_SAFE_NO_PAD
            .decode(&captures[2])
            .map_err(|e| FormatError::InvalidPubkey(format!("bad base64url token: {e}")))?;

        let mut identity = Self::from_bytes(&blob)?;
        identity.name = sanitize(captures.get(3).map(|m| m.as_str()), '"');
        identity.email = sanitize(captures.get(4).map(|m| m.as_str()), '>');
        Ok(identity)
    }

    /// Decode a raw 64-byte key blob (no name or email).
    ///
    /// # Errors
    ///
    /// Returns [`FormatError::InvalidPubkey`] if the blob is not 64 bytes or
    /// the verification key is not a valid Ed25519 point.
    pub fn from_bytes(blob: &[u8]) -> Result<Self> {
        if blob.len() != IDENTITY_KEY_SIZE {
            return Err(FormatError::InvalidPubkey(format!(
                "key blob must be {IDENTITY_KEY_SIZE} bytes, got {}",
                blob.len()
            ))
            .into());
        }

        let mut encrypt_bytes = [0u8; 32];
        encrypt_bytes.copy_from_slice(&blob[..32]);
        let encrypt_pk = PublicKey::from_bytes(encrypt_bytes);
        let mut verify_bytes = [0u8; 32];
        verify_bytes.copy_from_slice(&blob[32..]);
        let verify_pk = VerifyingKey::from_bytes(&verify_bytes)
            .map_err(|_| FormatError::InvalidPubkey("invalid verification key".into()))?;

        Ok(Self {
            encrypt_pk,
            verify_pk,
            name: None,
            email: None,
        })
    }

    /// Raw 64-byte key blob.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; IDENTITY_KEY_SIZE] {
        let mut blob = [0u8; IDENTITY_KEY_SIZE];
        blob[..32].copy_from_slice(self.encrypt_pk.as_bytes());
        blob[32..].copy_from_slice(&self.verify_pk.to_bytes());
        blob
    }

    /// X25519 key messages to this identity are encrypted against.
    #[must_use]
    pub fn encrypt_pk(&self) -> &PublicKey {
        &self.encrypt_pk
    }

    /// Ed25519 key signatures by this identity verify against.
    #[must_use]
    pub fn verify_pk(&self) -> &VerifyingKey {
        &self.verify_pk
    }

    /// Display name, if any.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Email address, if any.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Whether both identities carry the same keys, ignoring metadata.
    #[must_use]
    pub fn same_keys(&self, other: &Identity) -> bool {
        self.encrypt_pk == other.encrypt_pk && self.verify_pk == other.verify_pk
    }

    /// Verify a signature made by this identity and return the message.
    ///
    /// With `detached` set, `signature` is a 64-byte detached signature over
    /// that message. Without it, `signature` is a combined
    /// `signature || message` blob and the embedded message is returned.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Crypto`] if the signature does not verify.
    pub fn verify(&self, signature: &[u8], detached: Option<&[u8]>) -> Result<Vec<u8>> {
        match detached {
            Some(message) => {
                let signature = Signature::from_slice(signature)?;
                self.verify_detached(message, &signature)?;
                Ok(message.to_vec())
            }
            None => Ok(self.verify_pk.open(signature)?),
        }
    }

    /// Verify a detached signature over `message`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Crypto`] if the signature does not verify.
    pub fn verify_detached(&self, message: &[u8], signature: &Signature) -> Result<()> {
        self.verify_pk.verify(message, signature).map_err(Error::from)
    }

    /// Human-friendly label: `"name" <email>`, or the key token when both
    /// are absent.
    #[must_use]
    pub fn nice_string(&self) -> String {
        match (self.name(), self.email()) {
            (Some(name), Some(email)) => format!("\"{name}\" <{email}>"),
            (Some(name), None) => format!("\"{name}\""),
            (None, Some(email)) => format!("<{email}>"),
            (None, None) => URL_SAFE_NO_PAD.encode(self.to_bytes()),
        }
    }

    /// Short BLAKE3 fingerprint of the key blob, hex encoded.
    #[must_use]
    pub fn fingerprint(&self) -> String {
        hex::encode(&hash::hash(&self.to_bytes())[..8])
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&build_pubkey(
            self.encrypt_pk.as_bytes(),
            &self.verify_pk.to_bytes(),
            self.name(),
            self.email(),
        ))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("fingerprint", &self.fingerprint())
            .field("name", &self.name)
            .field("email", &self.email)
            .finish()
    }
}

impl FromStr for Identity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
