//! Single-byte XOR key recovery against known magic bytes.

use crate::error::{DecodeFailure, NoMatch};
use crate::signatures::{Signature, SignatureSet};

/// A key together with the signature it was recovered against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveredKey<'a> {
    pub key: u8,
    pub signature: &'a Signature,
}

impl RecoveredKey<'_> {
    pub fn extension(&self) -> &str {
        self.signature.extension()
    }
}

/// Returns the key that maps `prefix` onto `signature`'s magic bytes.
///
/// Every magic position must agree on the same key. A prefix shorter than
/// the magic can never match.
pub fn recover_key(prefix: &[u8], signature: &Signature) -> Result<u8, NoMatch> {
    let magic = signature.magic();
    if prefix.len() < magic.len() || magic.is_empty() {
        return Err(NoMatch);
    }

    let key = prefix[0] ^ magic[0];
    if prefix.iter().zip(magic).all(|(&c, &m)| c ^ m == key) {
        Ok(key)
    } else {
        Err(NoMatch)
    }
}

/// Tries every signature in set order and returns the first consistent key.
pub fn find_decode_key<'a>(
    prefix: &[u8],
    signatures: &'a SignatureSet,
) -> Result<RecoveredKey<'a>, DecodeFailure> {
    signatures
        .iter()
        .find_map(|signature| {
            recover_key(prefix, signature)
                .ok()
                .map(|key| RecoveredKey { key, signature })
        })
        .ok_or_else(|| {
            let shown = prefix.len().min(signatures.longest_magic_len().max(1));
            DecodeFailure {
                prefix: hex::encode_upper(&prefix[..shown]),
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::signatures;

    fn jpeg() -> &'static Signature {
        signatures().get(".jpeg").unwrap()
    }

    #[test]
    fn test_recover_key_jpeg() {
        let prefix = [0xFF ^ 0x5A, 0xD8 ^ 0x5A, 0xFF ^ 0x5A, 0x12, 0x34];
        assert_eq!(recover_key(&prefix, jpeg()), Ok(0x5A));
    }

    #[test]
    fn test_recover_key_zero_key() {
        assert_eq!(recover_key(&[0xFF, 0xD8, 0xFF], jpeg()), Ok(0));
    }

    #[test]
    fn test_recover_key_inconsistent() {
        let prefix = [0xFF ^ 0x5A, 0xD8 ^ 0x5A, 0xFF ^ 0x5B];
        assert_eq!(recover_key(&prefix, jpeg()), Err(NoMatch));
    }

    #[test]
    fn test_recover_key_short_prefix() {
        assert_eq!(recover_key(&[], jpeg()), Err(NoMatch));
        assert_eq!(recover_key(&[0xA5, 0x82], jpeg()), Err(NoMatch));
    }

    #[test]
    fn test_find_decode_key_bmp() {
        let key = 0x9C;
        let prefix = [0x42 ^ key, 0x4D ^ key, 0x00, 0x00];
        let found = find_decode_key(&prefix, signatures()).unwrap();
        assert_eq!(found.key, key);
        assert_eq!(found.extension(), ".bmp");
    }

    #[test]
    fn test_find_decode_key_failure_reports_prefix() {
        let err = find_decode_key(&[0x00, 0x01, 0x02, 0x03, 0x04, 0x05], signatures()).unwrap_err();
        assert_eq!(err.prefix, "00010203");
        let err = find_decode_key(&[], signatures()).unwrap_err();
        assert_eq!(err.prefix, "");
    }

    #[test]
    fn test_tie_broken_by_extension_order() {
        let set = SignatureSet::new([
            Signature::from_hex(".zzz", "1020").unwrap(),
            Signature::from_hex(".aaa", "10").unwrap(),
        ]);
        let found = find_decode_key(&[0x10, 0x20], &set).unwrap();
        assert_eq!(found.extension(), ".aaa");
        assert_eq!(found.key, 0);
    }
}
