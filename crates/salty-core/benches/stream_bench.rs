use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use salty_core::{ChunkDecryptor, ChunkEncryptor, Ephemeral, EnvelopeHeader, Identity, MAX_CHUNK, Wallet};
use salty_crypto::aead::AeadKey;

const NONCE: [u8; 24] = [0x11; 24];

fn bench_encrypt_chunk(c: &mut Criterion) {
    let sizes = [1024, 65_536, MAX_CHUNK];
    let mut group = c.benchmark_group("encrypt_chunk");

    for size in sizes {
        let plaintext = vec![0xAA; size];
        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| {
                let mut encryptor = ChunkEncryptor::new(AeadKey::new([0x42; 32]), &NONCE);
                encryptor.encrypt_chunk(black_box(&plaintext), true)
            })
        });
    }

    group.finish();
}

fn bench_decrypt_stream(c: &mut Criterion) {
    let total = 4 * MAX_CHUNK;
    let data = vec![0x5A; total];

    let mut encryptor = ChunkEncryptor::new(AeadKey::new([0x42; 32]), &NONCE);
    let pieces: Vec<&[u8]> = data.chunks(MAX_CHUNK).collect();
    let mut wire = Vec::new();
    for (i, piece) in pieces.iter().enumerate() {
        wire.extend(encryptor.encrypt_chunk(piece, i + 1 == pieces.len()).unwrap());
    }

    let mut group = c.benchmark_group("decrypt_stream");
    group.throughput(Throughput::Bytes(total as u64));

    // 64 KiB pushes, as the envelope reader delivers them
    group.bench_function("4_max_chunks", |b| {
        b.iter(|| {
            let mut decryptor =
                ChunkDecryptor::new(AeadKey::new([0x42; 32]), &NONCE, total as u64);
            let mut released = 0usize;
            for piece in wire.chunks(64 * 1024) {
                decryptor.push(piece);
                while let Some(chunk) = decryptor.next_chunk().unwrap() {
                    released += chunk.len();
                }
            }
            decryptor.finish().unwrap();
            black_box(released)
        })
    });

    group.finish();
}

fn bench_ephemeral(c: &mut Criterion) {
    let recipient = Wallet::generate(None, None);
    let header = EnvelopeHeader::new(recipient.identity(), None, NONCE);
    let block = Ephemeral::derive(recipient.identity(), Some(NONCE), 1024, header.signed_bytes())
        .unwrap()
        .to_bytes();

    c.bench_function("ephemeral_derive", |b| {
        b.iter(|| {
            Ephemeral::derive(
                black_box(recipient.identity()),
                Some(NONCE),
                1024,
                header.signed_bytes(),
            )
        })
    });

    c.bench_function("ephemeral_parse", |b| {
        b.iter(|| Ephemeral::parse(&recipient, black_box(&block), header.signed_bytes()))
    });
}

fn bench_identity_parse(c: &mut Criterion) {
    let text = Wallet::generate(Some("Bench User"), Some("bench@example.com"))
        .identity()
        .to_string();

    c.bench_function("identity_parse", |b| {
        b.iter(|| Identity::parse(black_box(&text)))
    });
}

criterion_group!(
    benches,
    bench_encrypt_chunk,
    bench_decrypt_stream,
    bench_ephemeral,
    bench_identity_parse,
);
criterion_main!(benches);
