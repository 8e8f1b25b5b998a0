use dexor::{
    decode, find_decode_key, recover_key, signatures, NoMatch, Signature, SignatureSet,
};
use proptest::prelude::*;
use rstest::*;

fn obscure(plain: &[u8], key: u8) -> Vec<u8> {
    plain.iter().map(|b| b ^ key).collect()
}

// ============================================================================
// Registry
// ============================================================================

#[rstest]
#[case(".jpeg", "FFD8FF")]
#[case(".png", "89504E47")]
#[case(".gif", "47494638")]
#[case(".tif", "49492A00")]
#[case(".bmp", "424D")]
fn test_builtin_signature(#[case] extension: &str, #[case] magic_hex: &str) {
    let sig = signatures().get(extension).unwrap();
    assert_eq!(sig.magic(), hex::decode(magic_hex).unwrap().as_slice());
    assert_eq!(sig, &Signature::from_hex(extension, magic_hex).unwrap());
}

#[test]
fn test_registry_idempotent() {
    let first: Vec<_> = signatures().iter().cloned().collect();
    let _ = find_decode_key(&[0xA5, 0x82, 0xA5], signatures());
    let second: Vec<_> = signatures().iter().cloned().collect();
    assert_eq!(first, second);
}

// ============================================================================
// Key recovery
// ============================================================================

#[rstest]
#[case(".jpeg")]
#[case(".png")]
#[case(".gif")]
#[case(".tif")]
#[case(".bmp")]
fn test_find_decode_key_every_format(#[case] extension: &str) {
    let sig = signatures().get(extension).unwrap();
    let mut plain = sig.magic().to_vec();
    plain.extend_from_slice(b"payload-bytes");
    let ciphertext = obscure(&plain, 0x77);

    let found = find_decode_key(&ciphertext[..10], signatures()).unwrap();
    assert_eq!(found.key, 0x77);
    assert_eq!(found.extension(), extension);
}

#[test]
fn test_jpeg_scenario_key_5a() {
    let mut plain = vec![0xFF, 0xD8, 0xFF];
    plain.extend((0..64u8).map(|i| i.wrapping_mul(13)));
    let file = obscure(&plain, 0x5A);

    let found = find_decode_key(&file[..10], signatures()).unwrap();
    assert_eq!(found.key, 0x5A);
    assert_eq!(found.extension(), ".jpeg");

    let decoded = decode(&file, found.key);
    assert_eq!(&decoded[..3], &[0xFF, 0xD8, 0xFF]);
    assert_eq!(decoded, plain);
}

#[test]
fn test_unrelated_bytes_fail() {
    let err = find_decode_key(&[0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07], signatures())
        .unwrap_err();
    assert_eq!(err.prefix, "00010203");
}

#[test]
fn test_too_short_for_every_signature() {
    assert!(find_decode_key(&[0x42 ^ 0x10], signatures()).is_err());
    assert!(find_decode_key(&[], signatures()).is_err());
}

#[test]
fn test_short_prefix_still_matches_shorter_signature() {
    // Two bytes are enough for BMP but not for the four-byte formats.
    let prefix = obscure(&[0x42, 0x4D], 0xE1);
    let found = find_decode_key(&prefix, signatures()).unwrap();
    assert_eq!(found.extension(), ".bmp");
    assert_eq!(found.key, 0xE1);
}

#[test]
fn test_custom_signature_set() {
    let set = SignatureSet::new([Signature::from_hex(".zip", "504B0304").unwrap()]);
    let prefix = obscure(&[0x50, 0x4B, 0x03, 0x04, 0x14], 0x0F);
    let found = find_decode_key(&prefix, &set).unwrap();
    assert_eq!(found.extension(), ".zip");
    assert!(find_decode_key(&prefix, signatures()).is_err());
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_decode_is_self_inverse(data in proptest::collection::vec(any::<u8>(), 0..512), key in any::<u8>()) {
        prop_assert_eq!(decode(&decode(&data, key), key), data);
    }

    #[test]
    fn prop_recover_key_exact(idx in 0usize..5, key in any::<u8>(), tail in proptest::collection::vec(any::<u8>(), 0..16)) {
        let sig = signatures().iter().nth(idx).unwrap();
        let mut plain = sig.magic().to_vec();
        plain.extend(tail);
        let ciphertext = obscure(&plain, key);
        prop_assert_eq!(recover_key(&ciphertext, sig), Ok(key));
    }

    #[test]
    fn prop_short_prefix_never_matches(idx in 0usize..5, prefix in proptest::collection::vec(any::<u8>(), 0..4)) {
        let sig = signatures().iter().nth(idx).unwrap();
        prop_assume!(prefix.len() < sig.len());
        prop_assert_eq!(recover_key(&prefix, sig), Err(NoMatch));
    }

    #[test]
    fn prop_find_decode_key_deterministic(prefix in proptest::collection::vec(any::<u8>(), 0..12)) {
        let first = find_decode_key(&prefix, signatures()).map(|k| (k.key, k.extension().to_string()));
        let second = find_decode_key(&prefix, signatures()).map(|k| (k.key, k.extension().to_string()));
        prop_assert_eq!(first, second);
    }
}
