//! Property-based tests for Salty
//!
//! Uses proptest to verify invariants across large input spaces.

use proptest::prelude::*;

// ============================================================================
// Chunk Stream Properties
// ============================================================================

mod stream_properties {
    use super::*;
    use salty_core::{ChunkDecryptor, ChunkEncryptor, MAX_CHUNK};
    use salty_crypto::aead::AeadKey;

    const NONCE: [u8; 24] = [0x24; 24];

    fn encrypt_all(data: &[u8], chunk: usize) -> Vec<u8> {
        let mut encryptor = ChunkEncryptor::new(AeadKey::new([0x17; 32]), &NONCE);
        let mut wire = Vec::new();
        if data.is_empty() {
            wire.extend(encryptor.encrypt_chunk(&[], true).unwrap());
            return wire;
        }
        let pieces: Vec<&[u8]> = data.chunks(chunk).collect();
        for (i, piece) in pieces.iter().enumerate() {
            wire.extend(encryptor.encrypt_chunk(piece, i + 1 == pieces.len()).unwrap());
        }
        wire
    }

    /// Feed `wire` to a decryptor in pieces cut at `cuts`
    fn decrypt_split(wire: &[u8], total: u64, cuts: &[usize]) -> salty_core::Result<Vec<u8>> {
        let mut decryptor = ChunkDecryptor::new(AeadKey::new([0x17; 32]), &NONCE, total);
        let mut out = Vec::new();

        let mut bounds: Vec<usize> = cuts.iter().map(|c| c % (wire.len() + 1)).collect();
        bounds.push(0);
        bounds.push(wire.len());
        bounds.sort_unstable();
        bounds.dedup();

        for pair in bounds.windows(2) {
            decryptor.push(&wire[pair[0]..pair[1]]);
            while let Some(chunk) = decryptor.next_chunk()? {
                out.extend(chunk);
            }
        }

        decryptor.finish()?;
        Ok(out)
    }

    proptest! {
        /// Any split of the ciphertext yields the same plaintext
        #[test]
        fn arbitrary_input_splitting(
            data in prop::collection::vec(any::<u8>(), 0..4096),
            chunk in 1usize..700,
            cuts in prop::collection::vec(any::<usize>(), 0..16),
        ) {
            let wire = encrypt_all(&data, chunk);
            let out = decrypt_split(&wire, data.len() as u64, &cuts).unwrap();
            prop_assert_eq!(out, data);
        }

        /// Every frame costs exactly 20 bytes of overhead
        #[test]
        fn frame_overhead_is_constant(
            len in 0usize..8192,
            chunk in 1usize..2048,
        ) {
            let data = vec![0x5A; len];
            let wire = encrypt_all(&data, chunk);
            let frames = len.div_ceil(chunk).max(1);
            prop_assert_eq!(wire.len(), len + frames * 20);
        }

        /// Dropping any suffix never yields a clean finish
        #[test]
        fn truncation_never_finishes(
            data in prop::collection::vec(any::<u8>(), 1..2048),
            chunk in 1usize..512,
            keep in any::<usize>(),
        ) {
            let wire = encrypt_all(&data, chunk);
            let keep = keep % wire.len();
            prop_assert!(decrypt_split(&wire[..keep], data.len() as u64, &[]).is_err());
        }

        /// A single bit flip anywhere is detected
        #[test]
        fn bit_flip_detected(
            data in prop::collection::vec(any::<u8>(), 0..1024),
            chunk in 1usize..256,
            position in any::<usize>(),
            bit in 0u8..8,
        ) {
            let mut wire = encrypt_all(&data, chunk);
            let index = position % wire.len();
            wire[index] ^= 1 << bit;
            prop_assert!(decrypt_split(&wire, data.len() as u64, &[]).is_err());
        }

        /// Announcing a different total size fails
        #[test]
        fn wrong_total_rejected(
            data in prop::collection::vec(any::<u8>(), 0..1024),
            delta in 1u64..1000,
        ) {
            let wire = encrypt_all(&data, MAX_CHUNK);
            let len = data.len() as u64;
            prop_assert!(decrypt_split(&wire, len + delta, &[]).is_err());
            if len >= delta {
                prop_assert!(decrypt_split(&wire, len - delta, &[]).is_err());
            }
        }
    }
}

// ============================================================================
// Identity Properties
// ============================================================================

mod identity_properties {
    use super::*;
    use salty_core::{Identity, Wallet};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// Display then parse preserves keys and metadata
        #[test]
        fn identity_text_roundtrip(
            name in prop::option::of("[A-Za-z0-9 ._-]{1,24}"),
            email in prop::option::of("[a-z0-9.]{1,12}@[a-z]{1,8}\\.com"),
        ) {
            let wallet = Wallet::generate(name.as_deref(), email.as_deref());
            let text = wallet.identity().to_string();
            let parsed = Identity::parse(&text).unwrap();

            prop_assert_eq!(&parsed, wallet.identity());
            prop_assert_eq!(parsed.to_string(), text);
        }

        /// Delimiters and line breaks in metadata never break the format
        #[test]
        fn hostile_metadata_still_parses(
            name in ".{0,32}",
            email in ".{0,32}",
        ) {
            let wallet = Wallet::generate(Some(&name), Some(&email));
            let text = wallet.identity().to_string();

            prop_assert!(!text.contains('\n') && !text.contains('\r'));
            let parsed = Identity::parse(&text).unwrap();
            prop_assert!(parsed.same_keys(wallet.identity()));
        }

        /// Arbitrary text never panics the parser
        #[test]
        fn identity_parse_total(input in ".{0,200}") {
            let _ = Identity::parse(&input);
        }
    }
}

// ============================================================================
// Header Properties
// ============================================================================

mod header_properties {
    use super::*;
    use salty_core::EnvelopeHeader;

    proptest! {
        /// Arbitrary bytes never panic the header parser
        #[test]
        fn header_parse_total(input in prop::collection::vec(any::<u8>(), 0..512)) {
            let _ = EnvelopeHeader::parse(&input);
        }

        /// Arbitrary `key: value` lines never panic either
        #[test]
        fn header_lines_total(
            lines in prop::collection::vec("[A-Za-z-]{1,16}: [ -~]{0,64}", 0..8),
        ) {
            let text = format!("{}\r\n\r\n", lines.join("\r\n"));
            let _ = EnvelopeHeader::parse(text.as_bytes());
        }
    }
}

// ============================================================================
// Envelope Properties
// ============================================================================

mod envelope_properties {
    use super::*;
    use salty_core::envelope::{EnvelopeConfig, body_len};
    use salty_integration_tests::{header_end, open, seal_with, wallet};

    fn block_on<F: std::future::Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(future)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Envelopes round trip for any payload and chunk size
        #[test]
        fn envelope_roundtrip(
            data in prop::collection::vec(any::<u8>(), 0..8192),
            chunk_size in 1usize..3000,
            read_buffer in 1usize..5000,
        ) {
            let alice = wallet("Alice");
            let bob = wallet("Bob");
            let config = EnvelopeConfig { chunk_size, read_buffer };

            let (sealed, plaintext) = block_on(async {
                let (sealed, _) = seal_with(&config, &alice, Some(bob.identity()), &data).await;
                let (plaintext, _) = open(&bob, &sealed).await.unwrap();
                (sealed, plaintext)
            });

            prop_assert_eq!(plaintext, data.clone());
            prop_assert_eq!(
                (sealed.len() - header_end(&sealed)) as u64,
                body_len(data.len() as u64, chunk_size)
            );
        }
    }
}
