//! PNG encoding for RGBA tile images.
//!
//! Minimal encoder: 8-bit RGBA (color type 6), no filtering, zlib-deflated
//! scanlines. Enough to serve rendered tiles without an image crate.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PngError {
    #[error("Pixel buffer size mismatch: expected {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    #[error("PNG compression failed: {0}")]
    Compression(String),
}

/// Encode RGBA pixel data (4 bytes per pixel) as a PNG.
pub fn encode_rgba(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, PngError> {
    let expected = width * height * 4;
    if pixels.len() != expected {
        return Err(PngError::SizeMismatch {
            expected,
            actual: pixels.len(),
        });
    }

    let mut png = Vec::new();

    // PNG signature
    png.extend_from_slice(&[137, 80, 78, 71, 13, 10, 26, 10]);

    // IHDR chunk
    let mut ihdr = Vec::with_capacity(13);
    ihdr.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr.push(8); // bit depth
    ihdr.push(6); // color type (RGBA)
    ihdr.push(0); // compression method
    ihdr.push(0); // filter method
    ihdr.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr);

    // IDAT chunk (image data)
    let idat = deflate_scanlines(pixels, width, height)?;
    write_chunk(&mut png, b"IDAT", &idat);

    // IEND chunk
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Deflate the image data for the IDAT chunk, prefixing each scanline
/// with a filter byte (0 = no filter).
fn deflate_scanlines(pixels: &[u8], width: usize, height: usize) -> Result<Vec<u8>, PngError> {
    let mut raw = Vec::with_capacity(height * (1 + width * 4));
    for y in 0..height {
        raw.push(0);
        let start = y * width * 4;
        raw.extend_from_slice(&pixels[start..start + width * 4]);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::fast());
    encoder
        .write_all(&raw)
        .map_err(|e| PngError::Compression(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| PngError::Compression(e.to_string()))
}

/// Write a PNG chunk: length, type, data, CRC.
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_and_header() {
        let pixels = vec![200u8; 4 * 4 * 4];
        let png = encode_rgba(&pixels, 4, 4).unwrap();

        assert_eq!(&png[..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
        // IHDR follows: 4-byte length, "IHDR", then big-endian dimensions.
        assert_eq!(&png[12..16], b"IHDR");
        assert_eq!(&png[16..20], &4u32.to_be_bytes());
        assert_eq!(&png[20..24], &4u32.to_be_bytes());
        assert!(png.ends_with(&{
            let mut hasher = crc32fast::Hasher::new();
            hasher.update(b"IEND");
            hasher.finalize().to_be_bytes()
        }));
    }

    #[test]
    fn test_size_mismatch_rejected() {
        let err = encode_rgba(&[0u8; 10], 4, 4).unwrap_err();
        assert!(matches!(err, PngError::SizeMismatch { .. }));
    }
}
