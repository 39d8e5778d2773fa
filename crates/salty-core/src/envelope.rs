//! Async envelope encryption and decryption.
//!
//! Sequences the header, the ephemeral block and the chunk stream onto or
//! off an async byte stream. The source is only read once the key material
//! for the message is ready, and every authenticated chunk is written to the
//! destination as soon as it is available, so memory stays bounded by one
//! frame plus one read buffer.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use zeroize::Zeroizing;

use crate::ephemeral::Ephemeral;
use crate::error::{Error, ProtocolError, Result};
use crate::header::{EnvelopeHeader, find_header_end};
use crate::identity::Identity;
use crate::wallet::Wallet;
use crate::{EPHEMERAL_SIZE, FRAME_OVERHEAD, MAX_CHUNK};

/// Default read buffer size for decryption (64 KiB)
pub const DEFAULT_READ_BUFFER: usize = 64 * 1024;

/// Envelope I/O tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnvelopeConfig {
    /// Plaintext bytes per frame when encrypting (clamped to `1..=MAX_CHUNK`)
    pub chunk_size: usize,
    /// Bytes requested per read when decrypting
    pub read_buffer: usize,
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            chunk_size: MAX_CHUNK,
            read_buffer: DEFAULT_READ_BUFFER,
        }
    }
}

impl EnvelopeConfig {
    fn effective_chunk_size(&self) -> usize {
        self.chunk_size.clamp(1, MAX_CHUNK)
    }

    fn effective_read_buffer(&self) -> usize {
        self.read_buffer.max(1)
    }
}

/// Outcome of [`encrypt`]
#[derive(Debug, Clone)]
pub struct EncryptSummary {
    /// Identity the message was encrypted to
    pub recipient: Identity,
    /// Frames written
    pub frames: u64,
    /// Total bytes written to the destination
    pub bytes_written: u64,
}

/// Outcome of [`decrypt`]
#[derive(Debug, Clone)]
pub struct DecryptSummary {
    /// Declared sender
    pub sender: Identity,
    /// Whether the sender's signature was present and verified
    pub signed: bool,
    /// Plaintext bytes written to the destination
    pub plaintext_len: u64,
}

/// Encrypt `total_size` bytes from `source` into an envelope on `dest`.
///
/// The recipient defaults to the wallet's own identity.
///
/// # Errors
///
/// - [`ProtocolError::SizeMismatch`] if `source` is shorter or longer than
///   `total_size`
/// - [`Error::Crypto`] if key agreement or sealing fails
/// - [`Error::Io`] if reading or writing fails
pub async fn encrypt<R, W>(
    config: &EnvelopeConfig,
    wallet: &Wallet,
    recipient: Option<&Identity>,
    total_size: u64,
    source: &mut R,
    dest: &mut W,
) -> Result<EncryptSummary>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let recipient = recipient.unwrap_or_else(|| wallet.identity());
    let nonce = salty_crypto::random::random_24()?;

    let header = EnvelopeHeader::new(wallet.identity(), Some(recipient), nonce);
    let ephemeral = Ephemeral::derive(recipient, Some(nonce), total_size, header.signed_bytes())?;
    let block = ephemeral.to_bytes();

    let mut signed = header.signed_bytes().to_vec();
    signed.extend_from_slice(&block);
    let header = header.with_signature(wallet.sign_detached(&signed));

    let encoded = header.encode();
    dest.write_all(&encoded).await?;
    dest.write_all(&block).await?;
    let mut bytes_written = (encoded.len() + block.len()) as u64;

    tracing::info!(
        recipient = %recipient.nice_string(),
        total_size,
        "encrypting envelope"
    );

    let chunk_size = config.effective_chunk_size();
    let mut encryptor = ephemeral.encryptor();
    let mut buf = Zeroizing::new(vec![0u8; chunk_size]);
    let mut sent: u64 = 0;

    loop {
        let want = (total_size - sent).min(chunk_size as u64) as usize;
        let got = read_full(source, &mut buf[..want]).await?;
        if got < want {
            return Err(ProtocolError::SizeMismatch {
                expected: total_size,
                actual: sent + got as u64,
            }
            .into());
        }

        sent += got as u64;
        let is_final = sent == total_size;
        let frame = encryptor.encrypt_chunk(&buf[..got], is_final)?;
        dest.write_all(&frame).await?;
        bytes_written += frame.len() as u64;

        if is_final {
            break;
        }
    }

    let mut probe = [0u8; 1];
    if source.read(&mut probe).await? != 0 {
        return Err(ProtocolError::SizeMismatch {
            expected: total_size,
            actual: total_size + 1,
        }
        .into());
    }

    dest.flush().await?;

    tracing::debug!(frames = encryptor.frames(), bytes_written, "envelope written");

    Ok(EncryptSummary {
        recipient: recipient.clone(),
        frames: encryptor.frames(),
        bytes_written,
    })
}

/// Decrypt an envelope from `source` into `dest` with the recipient's wallet.
///
/// Checks run in this order: header syntax, `To-Salty-Id` against the
/// wallet, ephemeral block length, `Nonce` against the block, sender
/// signature, then the ephemeral announcement. Plaintext is written frame by
/// frame, each only after it authenticates.
///
/// # Errors
///
/// - [`Error::Format`] for a malformed or oversized header or frame
/// - [`Error::Protocol`] for a missing header, wrong recipient, nonce
///   mismatch, truncation or trailing data
/// - [`Error::Size`] if the ephemeral block is short
/// - [`Error::Crypto`] for a bad signature or any authentication failure
/// - [`Error::Io`] if reading or writing fails
pub async fn decrypt<R, W>(
    config: &EnvelopeConfig,
    wallet: &Wallet,
    source: &mut R,
    dest: &mut W,
) -> Result<DecryptSummary>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut read_buf = vec![0u8; config.effective_read_buffer()];
    let mut pending = Vec::new();

    let header_end = loop {
        if let Some(end) = find_header_end(&pending)? {
            break end;
        }
        let n = source.read(&mut read_buf).await?;
        if n == 0 {
            return Err(ProtocolError::IncompleteHeader.into());
        }
        pending.extend_from_slice(&read_buf[..n]);
    };

    let header = EnvelopeHeader::parse(&pending[..header_end])?;
    let mut pending = pending.split_off(header_end);

    if let Some(to) = header.to() {
        if to != wallet.identity().to_string() {
            return Err(ProtocolError::WrongRecipient.into());
        }
    }

    while pending.len() < EPHEMERAL_SIZE {
        let n = source.read(&mut read_buf).await?;
        if n == 0 {
            return Err(Error::Size {
                what: "ephemeral block",
                expected: EPHEMERAL_SIZE,
                actual: pending.len(),
            });
        }
        pending.extend_from_slice(&read_buf[..n]);
    }
    let body = pending.split_off(EPHEMERAL_SIZE);
    let block = pending;

    if &block[32..56] != header.nonce().as_slice() {
        return Err(ProtocolError::NonceMismatch.into());
    }

    let signed = match header.signature() {
        Some(signature) => {
            let mut message = header.signed_bytes().to_vec();
            message.extend_from_slice(&block);
            header.from().verify_detached(&message, signature)?;
            true
        }
        None => {
            tracing::warn!(
                sender = %header.from().nice_string(),
                "envelope is unsigned; sender is not authenticated"
            );
            false
        }
    };

    let ephemeral = Ephemeral::parse(wallet, &block, header.signed_bytes())?;

    tracing::info!(
        sender = %header.from().nice_string(),
        signed,
        total_size = ephemeral.total_size(),
        "decrypting envelope"
    );

    let mut decryptor = ephemeral.decryptor();
    decryptor.push(&body);

    loop {
        while let Some(chunk) = decryptor.next_chunk()? {
            dest.write_all(&chunk).await?;
        }

        let n = source.read(&mut read_buf).await?;
        if n == 0 {
            break;
        }
        decryptor.push(&read_buf[..n]);
    }

    decryptor.finish()?;
    dest.flush().await?;

    Ok(DecryptSummary {
        sender: header.from().clone(),
        signed,
        plaintext_len: decryptor.plaintext_len(),
    })
}

/// Read until `buf` is full or the source is exhausted.
async fn read_full<R: AsyncRead + Unpin>(source: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Ciphertext length of an envelope body carrying `plaintext_len` bytes.
#[must_use]
pub fn body_len(plaintext_len: u64, chunk_size: usize) -> u64 {
    let chunk = chunk_size.clamp(1, MAX_CHUNK) as u64;
    let frames = plaintext_len.div_ceil(chunk).max(1);
    EPHEMERAL_SIZE as u64 + plaintext_len + frames * FRAME_OVERHEAD as u64
}
