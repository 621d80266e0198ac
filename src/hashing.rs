//! Hashing - SHA-256 Metafile Fingerprints
//!
//! Identical configurations compile to identical metafiles, so the digest of
//! the rendered text identifies a run's inputs.

use sha2::{Digest, Sha256};

use crate::metafile::MetafileLines;

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    let result = hasher.finalize();
    hex::encode(result)
}

/// Digest of the exact bytes written to the control file.
pub fn metafile_digest(metafile: &MetafileLines) -> String {
    sha256_hex(metafile.render().as_bytes())
}

mod hex {
    pub fn encode(bytes: impl AsRef<[u8]>) -> String {
        bytes.as_ref().iter().map(|b| format!("{:02x}", b)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::MetafileKey;

    #[test]
    fn test_known_digest() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_follows_order() {
        let mut a = MetafileLines::new();
        a.push(MetafileKey::DggsType, "ISEA3H").push(MetafileKey::DggsResSpec, 9);
        let mut b = MetafileLines::new();
        b.push(MetafileKey::DggsResSpec, 9).push(MetafileKey::DggsType, "ISEA3H");

        assert_eq!(metafile_digest(&a), metafile_digest(&a.clone()));
        assert_ne!(metafile_digest(&a), metafile_digest(&b));
    }
}
