//! BLAKE3 hashing and key derivation.
//!
//! Provides:
//! - Fast cryptographic hashing (identity fingerprints)
//! - HKDF-like extract/expand used by the per-message key schedule

/// BLAKE3 hash output (32 bytes).
pub type HashOutput = [u8; 32];

/// Compute BLAKE3 hash of input data.
#[must_use]
pub fn hash(data: &[u8]) -> HashOutput {
    *blake3::hash(data).as_bytes()
}

/// HKDF-Extract: Extract a pseudorandom key from input key material.
///
/// Corresponds to HKDF-Extract from RFC 5869, but using BLAKE3.
#[must_use]
pub fn hkdf_extract(salt: &[u8], ikm: &[u8]) -> [u8; 32] {
    if salt.is_empty() {
        hash(ikm)
    } else {
        let salt_hash = hash(salt);
        let mut hasher = blake3::Hasher::new_keyed(&salt_hash);
        hasher.update(ikm);
        *hasher.finalize().as_bytes()
    }
}

/// HKDF-Expand: Expand a pseudorandom key into arbitrary-length output.
///
/// Corresponds to HKDF-Expand from RFC 5869, but using BLAKE3.
pub fn hkdf_expand(prk: &[u8; 32], info: &[u8], output: &mut [u8]) {
    let mut hasher = blake3::Hasher::new_keyed(prk);
    hasher.update(info);

    let mut reader = hasher.finalize_xof();
    reader.fill(output);
}

/// Expand a pseudorandom key into a single 32-byte subkey.
#[must_use]
pub fn hkdf_expand_key(prk: &[u8; 32], info: &[u8]) -> [u8; 32] {
    let mut output = [0u8; 32];
    hkdf_expand(prk, info, &mut output);
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blake3_basic() {
        let hash1 = hash(b"hello world");
        let hash2 = hash(b"hello world");

        assert_eq!(hash1, hash2);
        assert_ne!(hash1, [0u8; 32]);
    }

    #[test]
    fn test_hkdf_extract_depends_on_salt() {
        let ikm = b"shared secret";
        assert_ne!(hkdf_extract(b"salt-a", ikm), hkdf_extract(b"salt-b", ikm));
        assert_eq!(hkdf_extract(b"salt-a", ikm), hkdf_extract(b"salt-a", ikm));
    }

    #[test]
    fn test_hkdf_no_salt_is_plain_hash() {
        assert_eq!(hkdf_extract(b"", b"input"), hash(b"input"));
    }

    #[test]
    fn test_expand_labels_separate_keys() {
        let prk = [0x42u8; 32];
        let a = hkdf_expand_key(&prk, b"salty/v1/announce");
        let b = hkdf_expand_key(&prk, b"salty/v1/stream");

        assert_ne!(a, b);
        assert_eq!(a, hkdf_expand_key(&prk, b"salty/v1/announce"));
    }

    #[test]
    fn test_expand_prefix_consistency() {
        let prk = [7u8; 32];
        let mut long = [0u8; 64];
        hkdf_expand(&prk, b"info", &mut long);

        assert_eq!(&long[..32], &hkdf_expand_key(&prk, b"info"));
    }

    // BLAKE3 known test vector
    #[test]
    fn test_blake3_empty_string() {
        let expected = [
            0xaf, 0x13, 0x49, 0xb9, 0xf5, 0xf9, 0xa1, 0xa6, 0xa0, 0x40, 0x4d, 0xea, 0x36, 0xdc,
            0xc9, 0x49, 0x9b, 0xcb, 0x25, 0xc9, 0xad, 0xc1, 0x12, 0xb7, 0xcc, 0x9a, 0x93, 0xca,
            0xe4, 0x1f, 0x32, 0x62,
        ];

        assert_eq!(hash(b""), expected);
    }
}
