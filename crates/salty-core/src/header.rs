//! Envelope header lines.
//!
//! ```text
//! From-Salty-Id: <salty-id>\r\n
//! To-Salty-Id: <salty-id>\r\n        (optional)
//! Nonce: <base64url, 24 bytes>\r\n
//! Signature: <base64url, 64 bytes>\r\n  (optional)
//! \r\n
//! ```
//!
//! Every line except `Signature` is authenticated: the lines are the
//! associated data of the size announcement and the prefix of the signed
//! bytes. On parse they are kept exactly as received, in order.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use salty_crypto::signatures::Signature;

use crate::error::{FormatError, ProtocolError, Result};
use crate::identity::Identity;
use crate::{MAX_HEADER_SIZE, NONCE_SIZE};

/// Sender identity header
pub const FROM_HEADER: &str = "From-Salty-Id";
/// Recipient identity header
pub const TO_HEADER: &str = "To-Salty-Id";
/// Message nonce header
pub const NONCE_HEADER: &str = "Nonce";
/// Sender signature header
pub const SIGNATURE_HEADER: &str = "Signature";

const LINE_END: &str = "\r\n";
const TERMINATOR: &[u8] = b"\r\n\r\n";

/// Locate the end of the header block.
///
/// Returns the offset just past the blank line, or `None` if more input is
/// needed.
///
/// # Errors
///
/// Returns [`FormatError::HeaderTooLarge`] if no terminator appears within
/// [`MAX_HEADER_SIZE`] bytes.
pub fn find_header_end(buf: &[u8]) -> Result<Option<usize>> {
    let window = &buf[..buf.len().min(MAX_HEADER_SIZE)];
    if let Some(pos) = window
        .windows(TERMINATOR.len())
        .position(|w| w == TERMINATOR)
    {
        return Ok(Some(pos + TERMINATOR.len()));
    }

    if buf.len() >= MAX_HEADER_SIZE {
        return Err(FormatError::HeaderTooLarge {
            limit: MAX_HEADER_SIZE,
        }
        .into());
    }
    Ok(None)
}

/// Parsed or freshly built envelope header
#[derive(Debug, Clone)]
pub struct EnvelopeHeader {
    from: Identity,
    to: Option<String>,
    nonce: [u8; NONCE_SIZE],
    signature: Option<Signature>,
    signed: Vec<u8>,
}

impl EnvelopeHeader {
    /// Build a header for a new message.
    #[must_use]
    pub fn new(from: &Identity, to: Option<&Identity>, nonce: [u8; NONCE_SIZE]) -> Self {
        let to = to.map(ToString::to_string);

        let mut signed = format!("{FROM_HEADER}: {from}{LINE_END}");
        if let Some(to) = &to {
            signed.push_str(&format!("{TO_HEADER}: {to}{LINE_END}"));
        }
        signed.push_str(&format!(
            "{NONCE_HEADER}: {}{LINE_END}",
            URL_SAFE_NO_PAD.encode(nonce)
        ));

        Self {
            from: from.clone(),
            to,
            nonce,
            signature: None,
            signed: signed.into_bytes(),
        }
    }

    /// Attach the sender's signature.
    #[must_use]
    pub fn with_signature(mut self, signature: Signature) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Declared sender.
    #[must_use]
    pub fn from(&self) -> &Identity {
        &self.from
    }

    /// Declared recipient, exactly as written.
    #[must_use]
    pub fn to(&self) -> Option<&str> {
        self.to.as_deref()
    }

    /// Message nonce.
    #[must_use]
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Sender signature, if present.
    #[must_use]
    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    /// Authenticated header lines.
    #[must_use]
    pub fn signed_bytes(&self) -> &[u8] {
        &self.signed
    }

    /// Full header block including the terminating blank line.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut out = self.signed.clone();
        if let Some(signature) = &self.signature {
            out.extend_from_slice(
                format!(
                    "{SIGNATURE_HEADER}: {}{LINE_END}",
                    URL_SAFE_NO_PAD.encode(signature.as_bytes())
                )
                .as_bytes(),
            );
        }
        out.extend_from_slice(LINE_END.as_bytes());
        out
    }

    /// Parse a header block (with or without its terminating blank line).
    ///
    /// Keys are case-insensitive; unknown keys are kept in the authenticated
    /// bytes but otherwise ignored.
    ///
    /// # Errors
    ///
    /// - [`FormatError`] for malformed or duplicate lines and undecodable values
    /// - [`ProtocolError::MissingHeader`] if `From-Salty-Id` or `Nonce` is absent
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() > MAX_HEADER_SIZE {
            return Err(FormatError::HeaderTooLarge {
                limit: MAX_HEADER_SIZE,
            }
            .into());
        }

        let text = std::str::from_utf8(bytes)
            .map_err(|_| FormatError::MalformedHeaderLine("header is not UTF-8".into()))?;
        let body = text
            .strip_suffix("\r\n\r\n")
            .or_else(|| text.strip_suffix(LINE_END))
            .unwrap_or(text);

        let mut from = None;
        let mut to = None;
        let mut nonce = None;
        let mut signature = None;
        let mut seen: Vec<String> = Vec::new();
        let mut signed = Vec::with_capacity(body.len());

        // An empty block carries no lines, so required headers report missing
        let lines = body.split(LINE_END).filter(|_| !body.is_empty());

        for line in lines {
            let (key, value) = line
                .split_once(": ")
                .ok_or_else(|| FormatError::MalformedHeaderLine(line.to_string()))?;

            let lower = key.to_ascii_lowercase();
            if seen.contains(&lower) {
                return Err(FormatError::DuplicateHeader(key.to_string()).into());
            }
            seen.push(lower.clone());

            if lower == SIGNATURE_HEADER.to_ascii_lowercase() {
                signature = Some(decode_signature(value)?);
                continue;
            }

            signed.extend_from_slice(line.as_bytes());
            signed.extend_from_slice(LINE_END.as_bytes());

            if lower == FROM_HEADER.to_ascii_lowercase() {
                from = Some(Identity::parse(value)?);
            } else if lower == TO_HEADER.to_ascii_lowercase() {
                to = Some(value.to_string());
            } else if lower == NONCE_HEADER.to_ascii_lowercase() {
                nonce = Some(decode_nonce(value)?);
            }
        }

        Ok(Self {
            from: from.ok_or(ProtocolError::MissingHeader(FROM_HEADER))?,
            to,
            nonce: nonce.ok_or(ProtocolError::MissingHeader(NONCE_HEADER))?,
            signature,
            signed,
        })
    }
}

fn decode_nonce(value: &str) -> Result<[u8; NONCE_SIZE]> {
    URL_SAFE_NO_PAD
        .decode(value)
        .ok()
        .and_then(|bytes| <[u8; NONCE_SIZE]>::try_from(bytes.as_slice()).ok())
        .ok_or_else(|| {
            FormatError::InvalidHeaderValue {
                field: NONCE_HEADER,
            }
            .into()
        })
}

fn decode_signature(value: &str) -> Result<Signature> {
    URL_SAFE_NO_PAD
        .decode(value)
        .ok()
        .and_then(|bytes| Signature::from_slice(&bytes).ok())
        .ok_or_else(|| {
            FormatError::InvalidHeaderValue {
                field: SIGNATURE_HEADER,
            }
            .into()
        })
}
