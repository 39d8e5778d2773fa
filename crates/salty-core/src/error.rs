//! Error types for the Salty envelope format.

use thiserror::Error;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Core errors
///
/// Every variant is terminal: a failed authentication check is never retried.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed text or framing
    #[error("format error: {0}")]
    Format(#[from] FormatError),

    /// Buffer length invariant violated
    #[error("size error: {what} must be {expected} bytes, got {actual}")]
    Size {
        /// What was being decoded
        what: &'static str,
        /// Required length
        expected: usize,
        /// Length received
        actual: usize,
    },

    /// Cryptographic error (authentication, decryption, signature, passphrase)
    #[error("crypto error: {0}")]
    Crypto(#[from] salty_crypto::CryptoError),

    /// Envelope protocol violation
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Underlying reader or writer failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Format-level errors
#[derive(Debug, Error)]
pub enum FormatError {
    /// Pubkey text did not match the `salty-id` pattern
    #[error("invalid pubkey: {0}")]
    InvalidPubkey(String),

    /// Pubkey tag was something other than `salty-id`
    #[error("unexpected pubkey tag: {0:?}")]
    BadTag(String),

    /// Wallet armor could not be decoded
    #[error("invalid wallet: {0}")]
    InvalidWallet(String),

    /// Stored pubkey does not belong to the wallet secrets
    #[error("pubkey does not match wallet secrets")]
    WalletMismatch,

    /// Header line without a `Key: value` shape
    #[error("malformed header line: {0:?}")]
    MalformedHeaderLine(String),

    /// Header key given more than once
    #[error("duplicate header: {0}")]
    DuplicateHeader(String),

    /// Header value could not be decoded
    #[error("invalid {field} header value")]
    InvalidHeaderValue {
        /// Header name
        field: &'static str,
    },

    /// No header terminator within the size limit
    #[error("header exceeds {limit} bytes")]
    HeaderTooLarge {
        /// Size limit
        limit: usize,
    },

    /// Frame longer than the chunk limit
    #[error("chunk of {len} bytes exceeds limit of {max}")]
    ChunkTooLarge {
        /// Declared or supplied length
        len: usize,
        /// Chunk limit
        max: usize,
    },
}

/// Envelope protocol errors
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// Required header absent
    #[error("{0} header required")]
    MissingHeader(&'static str),

    /// Input ended before the header terminator
    #[error("stream ended inside the header")]
    IncompleteHeader,

    /// `To-Salty-Id` names a different identity than the decrypting wallet
    #[error("message addressed to some other salty-id")]
    WrongRecipient,

    /// `Nonce` header disagrees with the ephemeral block
    #[error("nonce header does not match ephemeral block")]
    NonceMismatch,

    /// Stream ended before the final frame
    #[error("stream truncated before final frame")]
    Truncated,

    /// Bytes found after the final frame
    #[error("trailing data after final frame")]
    TrailingData,

    /// Frame would carry more plaintext than was announced
    #[error("frame overruns announced size: {emitted} + {len} > {total}")]
    FrameOverrun {
        /// Plaintext bytes already emitted
        emitted: u64,
        /// Frame plaintext length
        len: u64,
        /// Announced total size
        total: u64,
    },

    /// Chunk requested after the final frame
    #[error("stream already finished")]
    StreamFinished,

    /// Frame counter space exhausted
    #[error("frame counter exhausted")]
    CounterExhausted,

    /// Plaintext source length disagrees with the declared size
    #[error("source length mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        /// Declared total size
        expected: u64,
        /// Bytes actually available
        actual: u64,
    },
}

impl Error {
    /// Whether this error came from a failed authentication or key check
    #[must_use]
    pub fn is_crypto(&self) -> bool {
        matches!(self, Self::Crypto(_))
    }

    /// Whether this error is a protocol violation
    #[must_use]
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Protocol(_))
    }

    /// Whether this error is a size invariant violation
    #[must_use]
    pub fn is_size(&self) -> bool {
        matches!(self, Self::Size { .. })
    }

    /// Whether this error is a format violation
    #[must_use]
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }
}
