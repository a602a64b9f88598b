//! PDF container for encoded images.
//!
//! [`PagePacker`] writes one page per image at native resolution (one PDF
//! unit per pixel) and [`ImageExtractor`] walks a document back into its
//! embedded image streams.  Pixel data only ever passes through Flate, so the
//! round trip is bit-exact.

pub mod extractor;
pub mod packer;

pub use extractor::{ExtractError, ExtractedImage, ImageExtractor, ScanContext};
pub use packer::{PackError, PackSummary, PagePacker};

/// Resource name under which each page references its image.
pub(crate) const IMAGE_RESOURCE: &str = "Im0";

/// PDF colour space for a channel count.
pub(crate) fn color_space(channels: u8) -> &'static str {
    match channels {
        1 => "DeviceGray",
        4 => "DeviceCMYK",
        _ => "DeviceRGB",
    }
}

pub(crate) fn channels_for(color_space: &[u8]) -> u8 {
    match color_space {
        b"DeviceGray" => 1,
        b"DeviceCMYK" => 4,
        _             => 3,
    }
}
