use sha2::{Digest, Sha256};

/// Fingerprint of a sanitized HTML body, used for duplicate suppression and
/// change detection. Lowercase hex over the full digest.
pub fn content_hash(sanitized_html: &str) -> String {
    bytes_hash(sanitized_html.as_bytes())
}

/// Fingerprint of a downloaded file, used for cross-URL media dedup.
pub(crate) fn bytes_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest.iter() {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}
