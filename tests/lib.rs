//! Shared helpers for Salty integration tests.
//!
//! Builds wallets and envelopes in memory and offers small byte surgery
//! utilities for tamper tests.

use salty_core::envelope::{self, DecryptSummary, EncryptSummary, EnvelopeConfig};
use salty_core::{Identity, Wallet};

/// Deterministic, non-repeating-looking test payload.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len)
        .map(|i| (i.wrapping_mul(31) ^ (i >> 8)) as u8)
        .collect()
}

/// A named wallet with an email, so header text is non-trivial.
pub fn wallet(name: &str) -> Wallet {
    Wallet::generate(
        Some(name),
        Some(&format!("{}@example.com", name.to_ascii_lowercase())),
    )
}

/// Encrypt `plaintext` with the default envelope configuration.
///
/// # Panics
///
/// Panics if encryption fails.
pub async fn seal(sender: &Wallet, recipient: Option<&Identity>, plaintext: &[u8]) -> Vec<u8> {
    seal_with(&EnvelopeConfig::default(), sender, recipient, plaintext)
        .await
        .0
}

/// Encrypt `plaintext` with an explicit configuration.
///
/// # Panics
///
/// Panics if encryption fails.
pub async fn seal_with(
    config: &EnvelopeConfig,
    sender: &Wallet,
    recipient: Option<&Identity>,
    plaintext: &[u8],
) -> (Vec<u8>, EncryptSummary) {
    let mut source = plaintext;
    let mut out = Vec::new();
    let summary = envelope::encrypt(
        config,
        sender,
        recipient,
        plaintext.len() as u64,
        &mut source,
        &mut out,
    )
    .await
    .expect("encrypt");
    (out, summary)
}

/// Decrypt an in-memory envelope.
pub async fn open(
    wallet: &Wallet,
    sealed: &[u8],
) -> salty_core::Result<(Vec<u8>, DecryptSummary)> {
    let mut source = sealed;
    let mut out = Vec::new();
    let summary =
        envelope::decrypt(&EnvelopeConfig::default(), wallet, &mut source, &mut out).await?;
    Ok((out, summary))
}

/// Offset just past the header's blank line.
///
/// # Panics
///
/// Panics if the envelope has no header terminator.
pub fn header_end(sealed: &[u8]) -> usize {
    sealed
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("header terminator")
        + 4
}

/// Header lines (without the blank line) and the binary remainder.
pub fn split(sealed: &[u8]) -> (Vec<String>, Vec<u8>) {
    let end = header_end(sealed);
    let text = std::str::from_utf8(&sealed[..end - 4]).expect("utf-8 header");
    let lines = text.split("\r\n").map(str::to_string).collect();
    (lines, sealed[end..].to_vec())
}

/// Reassemble header lines and a body.
pub fn join(lines: &[String], body: &[u8]) -> Vec<u8> {
    let mut out = lines.join("\r\n").into_bytes();
    out.extend_from_slice(b"\r\n\r\n");
    out.extend_from_slice(body);
    out
}

/// Rewrite the header with `edit` applied to its lines.
pub fn edit_header(sealed: &[u8], edit: impl FnOnce(&mut Vec<String>)) -> Vec<u8> {
    let (mut lines, body) = split(sealed);
    edit(&mut lines);
    join(&lines, &body)
}

/// Drop the `Signature` line, leaving an unsigned envelope.
pub fn strip_signature(sealed: &[u8]) -> Vec<u8> {
    edit_header(sealed, |lines| {
        lines.retain(|line| !line.starts_with("Signature: "));
    })
}
