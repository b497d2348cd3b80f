//! Pixel dimensions and header-level media probing.
//!
//! The pipeline needs the source dimensions before any derivative work
//! starts. Probing reads only the container header, never decodes pixels.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Width and height in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Creates new dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Total pixel count.
    #[must_use]
    pub const fn area(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Scales these dimensions to fit inside `bound`, preserving aspect
    /// ratio (standard contain-fit on the limiting axis).
    ///
    /// A bound larger than the source clamps to the source: upscaling is
    /// never performed.
    #[must_use]
    pub fn fit_within(self, bound: Dimensions) -> Dimensions {
        if self.width <= bound.width && self.height <= bound.height {
            return self;
        }

        let scale = f64::min(
            f64::from(bound.width) / f64::from(self.width),
            f64::from(bound.height) / f64::from(self.height),
        );

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let width = ((f64::from(self.width) * scale).round() as u32).max(1);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let height = ((f64::from(self.height) * scale).round() as u32).max(1);

        Dimensions::new(width, height)
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Errors from header probing.
#[derive(Debug, Clone, Error)]
pub enum ProbeError {
    /// The payload is too short to carry any known header.
    #[error("artifact too short to identify")]
    TooShort,

    /// No known container signature matched.
    #[error("unsupported or unrecognized media format")]
    UnknownFormat,

    /// A recognized container carried a malformed header.
    #[error("malformed {0} header")]
    Malformed(&'static str),
}

const PNG_SIGNATURE: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

/// Extracts pixel dimensions from PNG, GIF, or JPEG bytes.
///
/// # Errors
///
/// Returns [`ProbeError`] when the payload does not carry a parseable
/// header. Probe failure is fatal to a pipeline run: malformed input does
/// not become valid by retrying.
pub fn probe_dimensions(bytes: &[u8]) -> Result<Dimensions, ProbeError> {
    if bytes.len() < 10 {
        return Err(ProbeError::TooShort);
    }

    if bytes.starts_with(&PNG_SIGNATURE) {
        return probe_png(bytes);
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return probe_gif(bytes);
    }
    if bytes.starts_with(&[0xFF, 0xD8]) {
        return probe_jpeg(bytes);
    }

    Err(ProbeError::UnknownFormat)
}

fn probe_png(bytes: &[u8]) -> Result<Dimensions, ProbeError> {
    // Signature (8) + IHDR length/type (8), then width and height as u32be.
    if bytes.len() < 24 {
        return Err(ProbeError::Malformed("PNG"));
    }
    let width = u32::from_be_bytes([bytes[16], bytes[17], bytes[18], bytes[19]]);
    let height = u32::from_be_bytes([bytes[20], bytes[21], bytes[22], bytes[23]]);
    if width == 0 || height == 0 {
        return Err(ProbeError::Malformed("PNG"));
    }
    Ok(Dimensions::new(width, height))
}

fn probe_gif(bytes: &[u8]) -> Result<Dimensions, ProbeError> {
    let width = u32::from(u16::from_le_bytes([bytes[6], bytes[7]]));
    let height = u32::from(u16::from_le_bytes([bytes[8], bytes[9]]));
    if width == 0 || height == 0 {
        return Err(ProbeError::Malformed("GIF"));
    }
    Ok(Dimensions::new(width, height))
}

fn probe_jpeg(bytes: &[u8]) -> Result<Dimensions, ProbeError> {
    let mut pos = 2;

    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return Err(ProbeError::Malformed("JPEG"));
        }
        // Skip fill bytes between segments.
        let mut marker = bytes[pos + 1];
        while marker == 0xFF {
            pos += 1;
            if pos + 4 > bytes.len() {
                return Err(ProbeError::Malformed("JPEG"));
            }
            marker = bytes[pos + 1];
        }

        match marker {
            // SOF0..SOF15 carry frame dimensions, except DHT/JPG/DAC.
            0xC0..=0xCF if marker != 0xC4 && marker != 0xC8 && marker != 0xCC => {
                if pos + 9 > bytes.len() {
                    return Err(ProbeError::Malformed("JPEG"));
                }
                let height = u32::from(u16::from_be_bytes([bytes[pos + 5], bytes[pos + 6]]));
                let width = u32::from(u16::from_be_bytes([bytes[pos + 7], bytes[pos + 8]]));
                if width == 0 || height == 0 {
                    return Err(ProbeError::Malformed("JPEG"));
                }
                return Ok(Dimensions::new(width, height));
            }
            // Start of scan or end of image: no frame header was seen.
            0xDA | 0xD9 => return Err(ProbeError::Malformed("JPEG")),
            _ => {
                let length = usize::from(u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]));
                if length < 2 {
                    return Err(ProbeError::Malformed("JPEG"));
                }
                pos += 2 + length;
            }
        }
    }

    Err(ProbeError::Malformed("JPEG"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_header(width: u32, height: u32) -> Vec<u8> {
        let mut bytes = PNG_SIGNATURE.to_vec();
        bytes.extend_from_slice(&13u32.to_be_bytes());
        bytes.extend_from_slice(b"IHDR");
        bytes.extend_from_slice(&width.to_be_bytes());
        bytes.extend_from_slice(&height.to_be_bytes());
        bytes
    }

    #[test]
    fn test_fit_within_scales_down() {
        let source = Dimensions::new(2000, 1500);
        assert_eq!(
            source.fit_within(Dimensions::new(640, 640)),
            Dimensions::new(640, 480)
        );
    }

    #[test]
    fn test_fit_within_limiting_axis() {
        let source = Dimensions::new(1000, 2000);
        assert_eq!(
            source.fit_within(Dimensions::new(500, 500)),
            Dimensions::new(250, 500)
        );
    }

    #[test]
    fn test_fit_within_clamps_to_source() {
        let source = Dimensions::new(120, 80);
        assert_eq!(source.fit_within(Dimensions::new(640, 640)), source);
    }

    #[test]
    fn test_fit_within_never_zero() {
        let source = Dimensions::new(10_000, 1);
        let fitted = source.fit_within(Dimensions::new(100, 100));
        assert_eq!(fitted, Dimensions::new(100, 1));
    }

    #[test]
    fn test_probe_png() {
        let bytes = png_header(2000, 1500);
        assert_eq!(
            probe_dimensions(&bytes).unwrap(),
            Dimensions::new(2000, 1500)
        );
    }

    #[test]
    fn test_probe_gif() {
        let mut bytes = b"GIF89a".to_vec();
        bytes.extend_from_slice(&320u16.to_le_bytes());
        bytes.extend_from_slice(&200u16.to_le_bytes());
        assert_eq!(probe_dimensions(&bytes).unwrap(), Dimensions::new(320, 200));
    }

    #[test]
    fn test_probe_jpeg_sof0() {
        let mut bytes = vec![0xFF, 0xD8];
        // APP0 segment, skipped.
        bytes.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00]);
        // SOF0: length 17, precision 8, height 1500, width 2000.
        bytes.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x11, 0x08]);
        bytes.extend_from_slice(&1500u16.to_be_bytes());
        bytes.extend_from_slice(&2000u16.to_be_bytes());
        assert_eq!(
            probe_dimensions(&bytes).unwrap(),
            Dimensions::new(2000, 1500)
        );
    }

    #[test]
    fn test_probe_unknown_format() {
        let bytes = vec![0u8; 64];
        assert!(matches!(
            probe_dimensions(&bytes),
            Err(ProbeError::UnknownFormat)
        ));
    }

    #[test]
    fn test_probe_too_short() {
        assert!(matches!(probe_dimensions(b"ab"), Err(ProbeError::TooShort)));
    }

    #[test]
    fn test_probe_zero_dimension_png() {
        let bytes = png_header(0, 100);
        assert!(matches!(
            probe_dimensions(&bytes),
            Err(ProbeError::Malformed("PNG"))
        ));
    }
}
