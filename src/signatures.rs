//! Signature registry
//!
//! Maps an output file extension to the magic bytes its format starts with.
//! The built-in table is built once and shared read-only; custom tables can be
//! assembled for tests and handed to the recovery functions directly.

use std::sync::LazyLock;

use crate::error::SignatureError;

/// Magic bytes identifying one output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    extension: String,
    magic: Vec<u8>,
}

impl Signature {
    /// Creates a signature, rejecting empty magic and malformed extensions.
    pub fn new(extension: impl Into<String>, magic: Vec<u8>) -> Result<Self, SignatureError> {
        let extension = extension.into();
        if !extension.starts_with('.') || extension.len() < 2 {
            return Err(SignatureError::InvalidExtension(extension));
        }
        if magic.is_empty() {
            return Err(SignatureError::EmptyMagic(extension));
        }
        Ok(Self { extension, magic })
    }

    /// Creates a signature from a hex string such as `"FFD8FF"`.
    pub fn from_hex(extension: impl Into<String>, magic_hex: &str) -> Result<Self, SignatureError> {
        let extension = extension.into();
        let magic = hex::decode(magic_hex).map_err(|e| SignatureError::InvalidHex {
            extension: extension.clone(),
            message: e.to_string(),
        })?;
        Self::new(extension, magic)
    }

    /// Extension including the leading dot, e.g. `.jpeg`.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn magic(&self) -> &[u8] {
        &self.magic
    }

    pub fn len(&self) -> usize {
        self.magic.len()
    }

    /// Never true for a signature built through [`Signature::new`].
    pub fn is_empty(&self) -> bool {
        self.magic.is_empty()
    }
}

/// Ordered, immutable set of signatures.
///
/// Signatures are sorted by extension and unique per extension, so iteration
/// order (and therefore which signature wins a tie during key recovery) is
/// fixed regardless of how the set was built.
///
/// ```
/// use dexor::signatures::signatures;
///
/// let set = signatures();
/// let order: Vec<_> = set.iter().map(|s| s.extension()).collect();
/// assert_eq!(order, [".bmp", ".gif", ".jpeg", ".png", ".tif"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureSet {
    signatures: Vec<Signature>,
}

static BUILTIN: LazyLock<SignatureSet> = LazyLock::new(SignatureSet::default_images);

/// The built-in registry. Every call returns the same instance.
pub fn signatures() -> &'static SignatureSet {
    &BUILTIN
}

impl SignatureSet {
    /// Builds a set; a later signature replaces an earlier one with the same extension.
    pub fn new(signatures: impl IntoIterator<Item = Signature>) -> Self {
        let mut sorted: Vec<Signature> = Vec::new();
        for sig in signatures {
            match sorted.binary_search_by(|s| s.extension.as_str().cmp(&sig.extension)) {
                Ok(idx) => sorted[idx] = sig,
                Err(idx) => sorted.insert(idx, sig),
            }
        }
        Self { signatures: sorted }
    }

    /// JPEG, PNG, GIF, little-endian TIFF and BMP.
    pub fn default_images() -> Self {
        // Literal table, validated by tests; construction cannot fail.
        const TABLE: [(&str, &[u8]); 5] = [
            (".jpeg", &[0xFF, 0xD8, 0xFF]),
            (".png", &[0x89, 0x50, 0x4E, 0x47]),
            (".gif", &[0x47, 0x49, 0x46, 0x38]),
            (".tif", &[0x49, 0x49, 0x2A, 0x00]),
            (".bmp", &[0x42, 0x4D]),
        ];

        Self::new(TABLE.iter().map(|(ext, magic)| Signature {
            extension: (*ext).to_string(),
            magic: magic.to_vec(),
        }))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.iter()
    }

    pub fn get(&self, extension: &str) -> Option<&Signature> {
        self.signatures
            .binary_search_by(|s| s.extension.as_str().cmp(extension))
            .ok()
            .map(|idx| &self.signatures[idx])
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Minimum prefix length needed to test every signature.
    pub fn longest_magic_len(&self) -> usize {
        self.signatures.iter().map(Signature::len).max().unwrap_or(0)
    }

    pub fn shortest_magic_len(&self) -> usize {
        self.signatures.iter().map(Signature::len).min().unwrap_or(0)
    }
}

impl Default for SignatureSet {
    fn default() -> Self {
        Self::default_images()
    }
}

impl<'a> IntoIterator for &'a SignatureSet {
    type Item = &'a Signature;
    type IntoIter = std::slice::Iter<'a, Signature>;

    fn into_iter(self) -> Self::IntoIter {
        self.signatures.iter()
    }
}
