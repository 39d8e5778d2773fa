//! Chunked authenticated encryption stream.
//!
//! A message body is a sequence of frames:
//!
//! ```text
//! +----------------+---------------------------+--------------+
//! | Length (4B BE) | Ciphertext (Length bytes) | Tag (16B)    |
//! +----------------+---------------------------+--------------+
//! ```
//!
//! `Length` is the plaintext length of the frame and is also the frame's
//! associated data. Frame `i` is sealed under the nonce
//! `(i | FINAL_FLAG?) as u64 LE || message_nonce[0..16]`, where
//! [`FINAL_FLAG`] is set only on the last frame. Reordering, dropping or
//! promoting a frame to final therefore fails authentication.
//!
//! The decryptor keeps at most one frame buffered and never releases
//! plaintext before its tag has verified.

use salty_crypto::aead::{AeadKey, NONCE_SALT_SIZE, Nonce};

use crate::error::{FormatError, ProtocolError, Result};
use crate::{FRAME_OVERHEAD, LENGTH_PREFIX_SIZE, MAX_CHUNK, NONCE_SIZE};

/// Counter bit marking the final frame of a stream
pub const FINAL_FLAG: u64 = 1 << 63;

fn nonce_salt(message_nonce: &[u8; NONCE_SIZE]) -> [u8; NONCE_SALT_SIZE] {
    let mut salt = [0u8; NONCE_SALT_SIZE];
    salt.copy_from_slice(&message_nonce[..NONCE_SALT_SIZE]);
    salt
}

fn frame_nonce(counter: u64, is_final: bool, salt: &[u8; NONCE_SALT_SIZE]) -> Nonce {
    let value = if is_final { counter | FINAL_FLAG } else { counter };
    Nonce::from_counter(value, salt)
}

/// Encrypting half of a stream
pub struct ChunkEncryptor {
    key: Option<AeadKey>,
    salt: [u8; NONCE_SALT_SIZE],
    counter: u64,
}

impl ChunkEncryptor {
    /// Create an encryptor for one message.
    #[must_use]
    pub fn new(key: AeadKey, message_nonce: &[u8; NONCE_SIZE]) -> Self {
        Self {
            key: Some(key),
            salt: nonce_salt(message_nonce),
            counter: 0,
        }
    }

    /// Encrypt one chunk into a wire frame.
    ///
    /// The key is dropped (and zeroized) after the final chunk.
    ///
    /// # Errors
    ///
    /// - [`FormatError::ChunkTooLarge`] if `plaintext` exceeds [`MAX_CHUNK`]
    /// - [`ProtocolError::StreamFinished`] if the final chunk was already sealed
    pub fn encrypt_chunk(&mut self, plaintext: &[u8], is_final: bool) -> Result<Vec<u8>> {
        if plaintext.len() > MAX_CHUNK {
            return Err(FormatError::ChunkTooLarge {
                len: plaintext.len(),
                max: MAX_CHUNK,
            }
            .into());
        }
        if self.counter >= FINAL_FLAG {
            return Err(ProtocolError::CounterExhausted.into());
        }
        let key = self.key.as_ref().ok_or(ProtocolError::StreamFinished)?;

        // MAX_CHUNK fits in u32
        let prefix = (plaintext.len() as u32).to_be_bytes();
        let nonce = frame_nonce(self.counter, is_final, &self.salt);
        let sealed = key.encrypt(&nonce, plaintext, &prefix)?;

        let mut frame = Vec::with_capacity(LENGTH_PREFIX_SIZE + sealed.len());
        frame.extend_from_slice(&prefix);
        frame.extend_from_slice(&sealed);

        tracing::debug!(
            counter = self.counter,
            len = plaintext.len(),
            is_final,
            "sealed frame"
        );

        self.counter += 1;
        if is_final {
            self.key = None;
        }

        Ok(frame)
    }

    /// Whether the final chunk has been sealed.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.key.is_none()
    }

    /// Number of frames sealed so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.counter
    }
}

/// Decrypting half of a stream
pub struct ChunkDecryptor {
    key: Option<AeadKey>,
    salt: [u8; NONCE_SALT_SIZE],
    counter: u64,
    total: u64,
    emitted: u64,
    buffer: Vec<u8>,
}

impl ChunkDecryptor {
    /// Create a decryptor for a message announcing `total` plaintext bytes.
    #[must_use]
    pub fn new(key: AeadKey, message_nonce: &[u8; NONCE_SIZE], total: u64) -> Self {
        Self {
            key: Some(key),
            salt: nonce_salt(message_nonce),
            counter: 0,
            total,
            emitted: 0,
            buffer: Vec::new(),
        }
    }

    /// Buffer ciphertext bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Authenticate and return the next complete frame's plaintext.
    ///
    /// Returns `Ok(None)` when no complete frame is buffered yet, or when the
    /// stream has finished and nothing follows it. Bytes buffered after the
    /// final frame are reported on the following call.
    ///
    /// # Errors
    ///
    /// - [`FormatError::ChunkTooLarge`] if a frame declares more than [`MAX_CHUNK`]
    /// - [`ProtocolError::FrameOverrun`] if a frame passes the announced size
    /// - [`ProtocolError::TrailingData`] if bytes follow the final frame
    /// - [`Error::Crypto`](crate::Error::Crypto) if a frame fails authentication
    pub fn next_chunk(&mut self) -> Result<Option<Vec<u8>>> {
        let Some(key) = self.key.as_ref() else {
            if self.buffer.is_empty() {
                return Ok(None);
            }
            return Err(ProtocolError::TrailingData.into());
        };

        if self.buffer.len() < LENGTH_PREFIX_SIZE {
            return Ok(None);
        }

        let mut prefix = [0u8; LENGTH_PREFIX_SIZE];
        prefix.copy_from_slice(&self.buffer[..LENGTH_PREFIX_SIZE]);
        let len = u32::from_be_bytes(prefix) as usize;

        if len > MAX_CHUNK {
            return Err(FormatError::ChunkTooLarge {
                len,
                max: MAX_CHUNK,
            }
            .into());
        }

        let len64 = len as u64;
        if self.emitted + len64 > self.total {
            return Err(ProtocolError::FrameOverrun {
                emitted: self.emitted,
                len: len64,
                total: self.total,
            }
            .into());
        }

        let frame_len = len + FRAME_OVERHEAD;
        if self.buffer.len() < frame_len {
            return Ok(None);
        }

        let is_final = self.emitted + len64 == self.total;
        let nonce = frame_nonce(self.counter, is_final, &self.salt);
        let plaintext = key.decrypt(
            &nonce,
            &self.buffer[LENGTH_PREFIX_SIZE..frame_len],
            &prefix,
        )?;

        self.buffer.drain(..frame_len);
        self.counter += 1;
        self.emitted += len64;

        tracing::debug!(
            counter = self.counter - 1,
            len,
            is_final,
            "opened frame"
        );

        if is_final {
            self.key = None;
        }

        Ok(Some(plaintext))
    }

    /// Confirm the stream ended cleanly.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::Truncated`] if the final frame was never seen
    /// - [`ProtocolError::TrailingData`] if bytes follow the final frame
    pub fn finish(&self) -> Result<()> {
        if !self.is_finished() {
            return Err(ProtocolError::Truncated.into());
        }
        if !self.buffer.is_empty() {
            return Err(ProtocolError::TrailingData.into());
        }
        Ok(())
    }

    /// Whether the final frame has been authenticated.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.key.is_none()
    }

    /// Plaintext bytes released so far.
    #[must_use]
    pub fn plaintext_len(&self) -> u64 {
        self.emitted
    }

    /// Announced total plaintext size.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    const NONCE: [u8; NONCE_SIZE] = [0x24; NONCE_SIZE];

    fn key() -> AeadKey {
        AeadKey::new([0x42; 32])
    }

    fn encrypt_all(data: &[u8], chunk: usize) -> Vec<u8> {
        let mut encryptor = ChunkEncryptor::new(key(), &NONCE);
        let mut out = Vec::new();

        if data.is_empty() {
            out.extend(encryptor.encrypt_chunk(&[], true).unwrap());
            return out;
        }

        let pieces: Vec<&[u8]> = data.chunks(chunk).collect();
        for (i, piece) in pieces.iter().enumerate() {
            out.extend(encryptor.encrypt_chunk(piece, i + 1 == pieces.len()).unwrap());
        }
        out
    }

    fn decrypt_all(wire: &[u8], total: u64) -> Result<Vec<u8>> {
        let mut decryptor = ChunkDecryptor::new(key(), &NONCE, total);
        decryptor.push(wire);

        let mut out = Vec::new();
        while let Some(chunk) = decryptor.next_chunk()? {
            out.extend(chunk);
        }
        decryptor.finish()?;
        Ok(out)
    }

    #[test]
    fn test_single_frame_layout() {
        let wire = encrypt_all(b"hello, salty", MAX_CHUNK);

        assert_eq!(wire.len(), 4 + 12 + 16);
        assert_eq!(&wire[..4], &12u32.to_be_bytes());
        assert_eq!(decrypt_all(&wire, 12).unwrap(), b"hello, salty");
    }

    #[test]
    fn test_empty_stream_is_one_final_frame() {
        let wire = encrypt_all(b"", MAX_CHUNK);

        assert_eq!(wire.len(), FRAME_OVERHEAD);
        assert_eq!(&wire[..4], &[0, 0, 0, 0]);
        assert!(decrypt_all(&wire, 0).unwrap().is_empty());
    }

    #[test]
    fn test_multi_frame_roundtrip() {
        let data: Vec<u8> = (0..10_000u32).map(|i| i as u8).collect();
        let wire = encrypt_all(&data, 1000);

        assert_eq!(wire.len(), data.len() + 10 * FRAME_OVERHEAD);
        assert_eq!(decrypt_all(&wire, data.len() as u64).unwrap(), data);
    }

    #[test]
    fn test_byte_at_a_time_push() {
        let data = vec![0x5Au8; 3000];
        let wire = encrypt_all(&data, 700);

        let mut decryptor = ChunkDecryptor::new(key(), &NONCE, data.len() as u64);
        let mut out = Vec::new();
        for byte in &wire {
            decryptor.push(std::slice::from_ref(byte));
            while let Some(chunk) = decryptor.next_chunk().unwrap() {
                out.extend(chunk);
            }
        }

        decryptor.finish().unwrap();
        assert_eq!(out, data);
        assert_eq!(decryptor.plaintext_len(), 3000);
    }

    #[test]
    fn test_oversized_chunk_rejected_by_encryptor() {
        let mut encryptor = ChunkEncryptor::new(key(), &NONCE);
        let err = encryptor
            .encrypt_chunk(&vec![0u8; MAX_CHUNK + 1], true)
            .unwrap_err();

        assert!(matches!(
            err,
            Error::Format(FormatError::ChunkTooLarge { .. })
        ));
    }

    #[test]
    fn test_max_chunk_accepted() {
        let data = vec![1u8; MAX_CHUNK];
        let wire = encrypt_all(&data, MAX_CHUNK);

        assert_eq!(wire.len(), MAX_CHUNK + FRAME_OVERHEAD);
        assert_eq!(decrypt_all(&wire, MAX_CHUNK as u64).unwrap(), data);
    }

    #[test]
    fn test_encrypt_after_final_rejected() {
        let mut encryptor = ChunkEncryptor::new(key(), &NONCE);
        encryptor.encrypt_chunk(b"last", true).unwrap();

        assert!(encryptor.is_finished());
        assert!(matches!(
            encryptor.encrypt_chunk(b"more", false),
            Err(Error::Protocol(ProtocolError::StreamFinished))
        ));
    }

    #[test]
    fn test_declared_length_over_limit_rejected() {
        let mut decryptor = ChunkDecryptor::new(key(), &NONCE, u64::MAX);
        decryptor.push(&((MAX_CHUNK + 1) as u32).to_be_bytes());

        assert!(decryptor.next_chunk().unwrap_err().is_format());
    }

    #[test]
    fn test_frame_overrun_rejected() {
        let wire = encrypt_all(b"0123456789", MAX_CHUNK);

        let err = decrypt_all(&wire, 5).unwrap_err();
        assert!(matches!(
            err,
            Error::Protocol(ProtocolError::FrameOverrun { .. })
        ));
    }

    #[test]
    fn test_every_bit_flip_detected() {
        let wire = encrypt_all(b"hello, salty", MAX_CHUNK);

        // Prefix flips change the declared length; body and tag flips fail auth
        for byte in 0..wire.len() {
            for bit in 0..8 {
                let mut tampered = wire.clone();
                tampered[byte] ^= 1 << bit;
                assert!(decrypt_all(&tampered, 12).is_err(), "byte {byte} bit {bit}");
            }
        }
    }

    #[test]
    fn test_tampered_frame_releases_nothing() {
        let data = vec![7u8; 2000];
        let mut wire = encrypt_all(&data, 1000);
        // Corrupt the second frame's tag
        let last = wire.len() - 1;
        wire[last] ^= 0x01;

        let mut decryptor = ChunkDecryptor::new(key(), &NONCE, 2000);
        decryptor.push(&wire);

        assert_eq!(decryptor.next_chunk().unwrap().unwrap().len(), 1000);
        assert!(decryptor.next_chunk().unwrap_err().is_crypto());
        assert_eq!(decryptor.plaintext_len(), 1000);
    }

    #[test]
    fn test_truncation_detected() {
        let data = vec![3u8; 2000];
        let wire = encrypt_all(&data, 1000);

        // Drop the whole final frame
        let err = decrypt_all(&wire[..1000 + FRAME_OVERHEAD], 2000).unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::Truncated)));

        // Drop part of the final frame
        let err = decrypt_all(&wire[..wire.len() - 1], 2000).unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::Truncated)));
    }

    #[test]
    fn test_trailing_data_detected() {
        let mut wire = encrypt_all(b"abc", MAX_CHUNK);
        wire.push(0);

        let err = decrypt_all(&wire, 3).unwrap_err();
        assert!(matches!(err, Error::Protocol(ProtocolError::TrailingData)));
    }

    #[test]
    fn test_trailing_data_pushed_after_finish() {
        let wire = encrypt_all(b"abc", MAX_CHUNK);
        let mut decryptor = ChunkDecryptor::new(key(), &NONCE, 3);
        decryptor.push(&wire);

        assert_eq!(decryptor.next_chunk().unwrap().unwrap(), b"abc");
        assert!(decryptor.next_chunk().unwrap().is_none());

        decryptor.push(b"x");
        assert!(decryptor.next_chunk().unwrap_err().is_protocol());
        assert!(decryptor.finish().unwrap_err().is_protocol());
    }

    #[test]
    fn test_reordered_frames_rejected() {
        let data: Vec<u8> = (0..200u8).collect();
        let wire = encrypt_all(&data, 100);
        let frame = 100 + FRAME_OVERHEAD;

        let mut swapped = wire[frame..].to_vec();
        swapped.extend_from_slice(&wire[..frame]);

        assert!(decrypt_all(&swapped, 200).unwrap_err().is_crypto());
    }

    #[test]
    fn test_non_final_frame_cannot_end_stream() {
        // Sealed as non-final but the announcement says it is the whole message
        let mut encryptor = ChunkEncryptor::new(key(), &NONCE);
        let wire = encryptor.encrypt_chunk(b"partial", false).unwrap();

        assert!(decrypt_all(&wire, 7).unwrap_err().is_crypto());
    }

    #[test]
    fn test_wrong_nonce_rejected() {
        let wire = encrypt_all(b"data", MAX_CHUNK);
        let mut decryptor = ChunkDecryptor::new(key(), &[0x25; NONCE_SIZE], 4);
        decryptor.push(&wire);

        assert!(decryptor.next_chunk().unwrap_err().is_crypto());
    }
}
