//! # Salty Crypto
//!
//! Stateless cryptographic primitives used by the Salty envelope format.
//!
//! This crate provides:
//! - X25519 key agreement for the per-message ephemeral exchange
//! - Ed25519 signatures (detached and combined) for identities
//! - `XChaCha20-Poly1305` AEAD for size announcements and stream frames
//! - BLAKE3-based HKDF for the message key schedule
//! - Secure random number generation
//! - Passphrase armor for long-term secrets (Argon2id + XChaCha20-Poly1305)
//!
//! ## Cryptographic Suite
//!
//! | Function | Algorithm | Security Level |
//! |----------|-----------|----------------|
//! | Key Exchange | X25519 | 128-bit |
//! | AEAD | XChaCha20-Poly1305 | 256-bit key |
//! | KDF | HKDF-BLAKE3 | 128-bit |
//! | Signatures | Ed25519 | 128-bit |
//! | Secret Armor | Argon2id + XChaCha20-Poly1305 | 256-bit |

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod aead;
pub mod armor;
pub mod error;
pub mod hash;
pub mod random;
pub mod signatures;
pub mod x25519;

pub use error::CryptoError;

/// X25519 public key size
pub const X25519_PUBLIC_KEY_SIZE: usize = 32;

/// X25519 secret key size
pub const X25519_SECRET_KEY_SIZE: usize = 32;

/// XChaCha20-Poly1305 key size
pub const XCHACHA_KEY_SIZE: usize = 32;

/// XChaCha20-Poly1305 nonce size
pub const XCHACHA_NONCE_SIZE: usize = 24;

/// Ed25519 public key size
pub const ED25519_PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 keypair size (32-byte seed followed by the 32-byte public key)
pub const ED25519_KEYPAIR_SIZE: usize = 64;

/// Ed25519 signature size
pub const ED25519_SIGNATURE_SIZE: usize = 64;
