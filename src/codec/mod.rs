//! Byte ⇄ image codec.
//!
//! # Layout
//! An encoded image is an 8-bit RGB raster whose channel bytes, read
//! row-major, hold:
//!
//! ```text
//! [ magic "PXMD" (4) | payload length u32 BE (4) | CRC32 u32 BE (4) | payload | zero padding ]
//! ```
//!
//! # Geometry
//! For a total length `L = 12 + payload.len()` the grid is near-square:
//! `width = ceil(sqrt(L / 3))`, `height = ceil(L / (width * 3))`.  Both are
//! computed with integer arithmetic so the dimensions are a pure function of
//! the payload length on every platform.
//!
//! # Lossless constraint
//! Pixels are only ever moved around verbatim: into a PNG (deflate), into a
//! PDF image XObject (Flate) or back.  Any resampling or lossy re-encoding of
//! the raster destroys the payload.

use std::io::Cursor;
use thiserror::Error;

use crate::header::{PayloadHeader, HEADER_SIZE};

/// Channels per pixel (RGB).
pub const CHANNELS: u8 = 3;
/// Value written into unused capacity. Ignored on decode.
pub const PAD_BYTE: u8 = 0;
/// Default payload ceiling: 64 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 64 * 1024 * 1024;

// ── Error type ───────────────────────────────────────────────────────────────

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("Bad magic marker — not an encoded payload image")]
    BadMagic,
    #[error("Checksum mismatch: header says {expected:08x}, payload hashes to {actual:08x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("Image capacity {capacity} B is smaller than the 12 B header")]
    TruncatedHeader { capacity: usize },
    #[error("Declared payload of {declared} B exceeds image capacity of {available} B")]
    UnsupportedSize { declared: usize, available: usize },
    #[error("Payload of {size} B exceeds the {limit} B ceiling")]
    PayloadTooLarge { size: usize, limit: usize },
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}

// ── EncodedImage ─────────────────────────────────────────────────────────────

/// An encoded payload laid out on a pixel grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    pub width:       u32,
    pub height:      u32,
    pub channels:    u8,
    /// `width * height * channels` bytes, row-major.
    pub pixels:      Vec<u8>,
    pub payload_len: u32,
    pub checksum:    u32,
}

impl EncodedImage {
    /// Total bytes representable by this grid.
    pub fn capacity(&self) -> usize {
        self.pixels.len()
    }

    /// Serialize as a lossless 8-bit RGB PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, CodecError> {
        let buf = image::RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .ok_or(CodecError::UnsupportedSize {
                declared:  raster_len(self.width, self.height, self.channels),
                available: self.pixels.len(),
            })?;
        let mut out = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(buf).write_to(&mut out, image::ImageOutputFormat::Png)?;
        Ok(out.into_inner())
    }

    /// Load a PNG written by [`EncodedImage::to_png`] and validate its header.
    ///
    /// Non-RGB8 inputs are converted to RGB8 first; the header is then read
    /// from the converted channel bytes.
    pub fn from_png(bytes: &[u8]) -> Result<Self, CodecError> {
        let rgb = image::load_from_memory(bytes)?.to_rgb8();
        let (width, height) = rgb.dimensions();
        let pixels = rgb.into_raw();
        let header = read_header(&pixels)?;
        Ok(Self {
            width,
            height,
            channels: CHANNELS,
            pixels,
            payload_len: header.payload_len,
            checksum: header.checksum,
        })
    }
}

/// Grid dimensions for a total byte length, near-square.
pub fn dimensions_for(total_len: usize, channels: u8) -> (u32, u32) {
    let channels = usize::from(channels.max(1));
    let pixels_needed = total_len.div_ceil(channels).max(1);
    let width = ceil_sqrt(pixels_needed).max(1);
    let height = total_len.div_ceil(width * channels).max(1);
    (width as u32, height as u32)
}

fn ceil_sqrt(n: usize) -> usize {
    if n < 2 {
        return n;
    }
    // Newton iteration on integers; converges to floor(sqrt(n)).
    let mut x = n;
    let mut y = (x + n / x) / 2;
    while y < x {
        x = y;
        y = (x + n / x) / 2;
    }
    if x * x == n { x } else { x + 1 }
}

fn raster_len(width: u32, height: u32, channels: u8) -> usize {
    width as usize * height as usize * usize::from(channels)
}

fn read_header(pixels: &[u8]) -> Result<PayloadHeader, CodecError> {
    if pixels.len() < HEADER_SIZE {
        return Err(CodecError::TruncatedHeader { capacity: pixels.len() });
    }
    let header = PayloadHeader::read(&pixels[..HEADER_SIZE])
        .map_err(|_| CodecError::TruncatedHeader { capacity: pixels.len() })?;
    if !header.has_valid_magic() {
        return Err(CodecError::BadMagic);
    }
    Ok(header)
}

// ── ByteImageCodec ───────────────────────────────────────────────────────────

/// Encoder/decoder with a configurable payload ceiling.
///
/// Stateless apart from the ceiling, so one instance can be shared across
/// worker threads.
#[derive(Debug, Clone, Copy)]
pub struct ByteImageCodec {
    max_payload: usize,
}

impl Default for ByteImageCodec {
    fn default() -> Self {
        Self { max_payload: DEFAULT_MAX_PAYLOAD }
    }
}

impl ByteImageCodec {
    pub fn new(max_payload: usize) -> Self {
        Self { max_payload }
    }

    pub fn max_payload(&self) -> usize {
        self.max_payload
    }

    pub fn encode(&self, payload: &[u8]) -> Result<EncodedImage, CodecError> {
        if payload.len() > self.max_payload {
            return Err(CodecError::PayloadTooLarge { size: payload.len(), limit: self.max_payload });
        }
        let header = PayloadHeader::for_payload(payload).ok_or(CodecError::PayloadTooLarge {
            size:  payload.len(),
            limit: u32::MAX as usize,
        })?;

        let total_len = HEADER_SIZE + payload.len();
        let (width, height) = dimensions_for(total_len, CHANNELS);

        let mut pixels = Vec::with_capacity(raster_len(width, height, CHANNELS));
        pixels.extend_from_slice(&header.to_bytes());
        pixels.extend_from_slice(payload);
        pixels.resize(raster_len(width, height, CHANNELS), PAD_BYTE);

        Ok(EncodedImage {
            width,
            height,
            channels: CHANNELS,
            pixels,
            payload_len: header.payload_len,
            checksum: header.checksum,
        })
    }

    /// Recover the payload from a raw channel buffer.
    ///
    /// Only the buffer length matters for capacity checks; the declared
    /// length in the header decides how many bytes are returned.
    pub fn decode(&self, pixels: &[u8]) -> Result<Vec<u8>, CodecError> {
        let header = read_header(pixels)?;
        let declared = header.payload_len as usize;
        let available = pixels.len() - HEADER_SIZE;
        if declared > available {
            return Err(CodecError::UnsupportedSize { declared, available });
        }
        let payload = &pixels[HEADER_SIZE..HEADER_SIZE + declared];
        let actual = crate::header::crc32(payload);
        if actual != header.checksum {
            return Err(CodecError::ChecksumMismatch { expected: header.checksum, actual });
        }
        Ok(payload.to_vec())
    }

    pub fn decode_image(&self, image: &EncodedImage) -> Result<Vec<u8>, CodecError> {
        self.decode(&image.pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hello_roundtrip() {
        let codec = ByteImageCodec::default();
        let img = codec.encode(b"hello").unwrap();
        assert!(img.capacity() >= HEADER_SIZE + 5);
        assert_eq!(img.capacity(), raster_len(img.width, img.height, img.channels));
        assert_eq!(codec.decode(&img.pixels).unwrap(), b"hello");
    }

    #[test]
    fn empty_payload_is_header_only() {
        let codec = ByteImageCodec::default();
        let img = codec.encode(&[]).unwrap();
        assert_eq!((img.width, img.height), (2, 2));
        assert_eq!(img.capacity(), HEADER_SIZE);
        assert_eq!(codec.decode(&img.pixels).unwrap(), Vec::<u8>::new());
    }

    #[test]
    fn dimensions_are_near_square_and_sufficient() {
        for len in [1usize, 12, 13, 17, 100, 4096, 1_000_003] {
            let (w, h) = dimensions_for(len, CHANNELS);
            let cap = raster_len(w, h, CHANNELS);
            assert!(cap >= len, "len {len}: {w}x{h}");
            assert!(h <= w, "len {len}: {w}x{h}");
            // one row fewer would not fit
            assert!((h as usize - 1) * w as usize * 3 < len, "len {len}: {w}x{h}");
        }
    }

    #[test]
    fn ceil_sqrt_matches_float() {
        for n in 0usize..5000 {
            let expected = (n as f64).sqrt().ceil() as usize;
            assert_eq!(ceil_sqrt(n), expected, "n = {n}");
        }
    }

    #[test]
    fn padding_is_zero_and_ignored() {
        let codec = ByteImageCodec::default();
        let img = codec.encode(b"abcd").unwrap();
        assert!(img.pixels[HEADER_SIZE + 4..].iter().all(|&b| b == PAD_BYTE));

        let mut noisy = img.pixels.clone();
        for b in &mut noisy[HEADER_SIZE + 4..] {
            *b = 0xFF;
        }
        assert_eq!(codec.decode(&noisy).unwrap(), b"abcd");
    }

    #[test]
    fn encode_is_deterministic() {
        let codec = ByteImageCodec::default();
        let data: Vec<u8> = (0u8..=255).cycle().take(10_000).collect();
        assert_eq!(codec.encode(&data).unwrap(), codec.encode(&data).unwrap());
    }

    #[test]
    fn flipped_bit_is_checksum_mismatch() {
        let codec = ByteImageCodec::default();
        let mut img = codec.encode(b"integrity matters").unwrap();
        img.pixels[HEADER_SIZE + 3] ^= 0x01;
        assert!(matches!(codec.decode(&img.pixels), Err(CodecError::ChecksumMismatch { .. })));
    }

    #[test]
    fn short_buffer_is_truncated_header() {
        let codec = ByteImageCodec::default();
        assert!(matches!(
            codec.decode(b"PXMD\0\0"),
            Err(CodecError::TruncatedHeader { capacity: 6 })
        ));
    }

    #[test]
    fn wrong_marker_is_bad_magic() {
        let codec = ByteImageCodec::default();
        let mut img = codec.encode(b"x").unwrap();
        img.pixels[0] = b'Q';
        assert!(matches!(codec.decode(&img.pixels), Err(CodecError::BadMagic)));
    }

    #[test]
    fn oversized_declaration_is_unsupported_size() {
        let codec = ByteImageCodec::default();
        let img = codec.encode(b"0123456789").unwrap();
        let truncated = &img.pixels[..HEADER_SIZE + 4];
        assert!(matches!(
            codec.decode(truncated),
            Err(CodecError::UnsupportedSize { declared: 10, available: 4 })
        ));
    }

    #[test]
    fn ceiling_is_enforced() {
        let codec = ByteImageCodec::new(8);
        assert!(codec.encode(&[0u8; 8]).is_ok());
        assert!(matches!(
            codec.encode(&[0u8; 9]),
            Err(CodecError::PayloadTooLarge { size: 9, limit: 8 })
        ));
    }

    #[test]
    fn png_preserves_pixels() {
        let codec = ByteImageCodec::default();
        let img = codec.encode(b"through a png file").unwrap();
        let png = img.to_png().unwrap();
        let back = EncodedImage::from_png(&png).unwrap();
        assert_eq!(back, img);
        assert_eq!(codec.decode_image(&back).unwrap(), b"through a png file");
    }
}
