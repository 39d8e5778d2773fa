//! # Salty Core
//!
//! Envelope format for Salty: identity-based, forward-secret, streaming
//! authenticated encryption between holders of long-term keypairs.
//!
//! This crate provides:
//! - The `salty-id` identity text format
//! - The 96-byte wallet container and its armored form
//! - The per-message ephemeral key exchange (80-byte block)
//! - The chunked AEAD stream codec (constant memory per frame)
//! - Envelope header encoding and the async encrypt/decrypt pipeline
//! - Error types and handling
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         Envelope                                 │
//! │   (header lines, ephemeral block and frames over async I/O)     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                    Ephemeral Exchange                            │
//! │   (one-time X25519 key, sealed size announcement)               │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                      Chunk Stream                                │
//! │   (length-prefixed XChaCha20-Poly1305 frames)                   │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                 Identity / Wallet Codecs                         │
//! │   (salty-id text, 96-byte secret, armor)                        │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Wire Format
//!
//! ```text
//! From-Salty-Id: salty-id <base64url> "name" <email>\r\n
//! To-Salty-Id: salty-id <base64url>\r\n
//! Nonce: <base64url 24 bytes>\r\n
//! Signature: <base64url 64 bytes>\r\n
//! \r\n
//! <ephemeral block: eph_pk(32) | nonce(24) | sealed size(24)>
//! <frame: len(4, BE) | ciphertext(len) | tag(16)> ...
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod envelope;
pub mod ephemeral;
pub mod error;
pub mod header;
pub mod identity;
pub mod stream;
pub mod wallet;

pub use envelope::{DecryptSummary, EncryptSummary, EnvelopeConfig};
pub use ephemeral::Ephemeral;
pub use error::{Error, FormatError, ProtocolError, Result};
pub use header::EnvelopeHeader;
pub use identity::Identity;
pub use stream::{ChunkDecryptor, ChunkEncryptor};
pub use wallet::Wallet;

/// Maximum plaintext bytes carried by a single frame
pub const MAX_CHUNK: usize = 65_535 * 10;

/// Frame length prefix size in bytes
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// AEAD authentication tag size
pub const AUTH_TAG_SIZE: usize = salty_crypto::aead::TAG_SIZE;

/// Per-frame wire overhead (length prefix + tag)
pub const FRAME_OVERHEAD: usize = LENGTH_PREFIX_SIZE + AUTH_TAG_SIZE;

/// Message nonce size in bytes
pub const NONCE_SIZE: usize = salty_crypto::XCHACHA_NONCE_SIZE;

/// Serialized ephemeral block size in bytes
pub const EPHEMERAL_SIZE: usize = 80;

/// Serialized wallet secret size in bytes
pub const WALLET_SIZE: usize = 96;

/// Identity key blob size in bytes (encryption key + verification key)
pub const IDENTITY_KEY_SIZE: usize = 64;

/// Largest accepted envelope header, including the terminating blank line
pub const MAX_HEADER_SIZE: usize = 16 * 1024;
