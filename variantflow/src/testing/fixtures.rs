//! Synthetic artifact payloads.

/// Builds a payload that probes as a `width` x `height` PNG.
///
/// Only the signature and IHDR header are real; the rest is `payload_len`
/// bytes of filler so transforms have something to subsample.
#[must_use]
pub fn synthetic_png(width: u32, height: u32, payload_len: usize) -> Vec<u8> {
    let mut bytes = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    bytes.extend_from_slice(&13u32.to_be_bytes());
    bytes.extend_from_slice(b"IHDR");
    bytes.extend_from_slice(&width.to_be_bytes());
    bytes.extend_from_slice(&height.to_be_bytes());
    bytes.resize(bytes.len() + payload_len, 0x5A);
    bytes
}
