//! Fuzz target for the chunk stream decryptor
//!
//! Feeds arbitrary ciphertext, split at arbitrary points, into a decryptor.
//! It must never panic and never release more than the announced size.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use salty_core::ChunkDecryptor;
use salty_crypto::aead::AeadKey;

#[derive(Debug, Arbitrary)]
struct Input {
    total: u32,
    splits: Vec<u16>,
    wire: Vec<u8>,
}

fuzz_target!(|input: Input| {
    let mut decryptor = ChunkDecryptor::new(AeadKey::new([7u8; 32]), &[9u8; 24], u64::from(input.total));
    let mut released = 0u64;
    let mut rest = input.wire.as_slice();

    for split in input.splits.iter().chain(std::iter::once(&u16::MAX)) {
        let at = usize::from(*split).min(rest.len());
        let (piece, tail) = rest.split_at(at);
        rest = tail;
        decryptor.push(piece);

        loop {
            match decryptor.next_chunk() {
                Ok(Some(chunk)) => released += chunk.len() as u64,
                Ok(None) => break,
                Err(_) => return,
            }
        }
    }

    assert!(released <= u64::from(input.total));
    let _ = decryptor.finish();
});
