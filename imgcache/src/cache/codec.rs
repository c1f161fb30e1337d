//! Pluggable image codecs.
//!
//! The cache never interprets image bytes itself. A codec turns the encoded
//! bytes read from disk into the in-memory representation and back, and
//! reports how much memory a decoded image costs.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat};
use thiserror::Error;

/// Codec failures.
#[derive(Debug, Clone, Error)]
pub enum CodecError {
    #[error("Failed to decode image: {0}")]
    Decode(String),

    #[error("Failed to encode image: {0}")]
    Encode(String),
}

/// Conversion between encoded bytes and decoded images.
pub trait ImageCodec: Send + Sync + 'static {
    /// Decoded, ready-to-render representation.
    type Image: Send + Sync + 'static;

    /// Decode bytes read from the disk tier.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Image, CodecError>;

    /// Encode an image for the disk tier when no original bytes were kept.
    fn encode(&self, image: &Self::Image) -> Result<Vec<u8>, CodecError>;

    /// Memory cost of a decoded image, in bytes.
    fn cost(&self, image: &Self::Image) -> usize;
}

/// Identity codec: the "image" is the encoded byte buffer itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct BytesCodec;

impl ImageCodec for BytesCodec {
    type Image = Vec<u8>;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Image, CodecError> {
        Ok(bytes.to_vec())
    }

    fn encode(&self, image: &Self::Image) -> Result<Vec<u8>, CodecError> {
        Ok(image.clone())
    }

    fn cost(&self, image: &Self::Image) -> usize {
        image.len()
    }
}

/// Raster codec backed by the `image` crate.
///
/// Decodes any format the crate recognises. Images stored without their
/// original bytes are re-encoded as `output_format` (PNG by default).
#[derive(Debug, Clone, Copy)]
pub struct RasterCodec {
    output_format: ImageFormat,
}

impl RasterCodec {
    pub fn new(output_format: ImageFormat) -> Self {
        Self { output_format }
    }
}

impl Default for RasterCodec {
    fn default() -> Self {
        Self::new(ImageFormat::Png)
    }
}

impl ImageCodec for RasterCodec {
    type Image = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<Self::Image, CodecError> {
        image::load_from_memory(bytes).map_err(|e| CodecError::Decode(e.to_string()))
    }

    fn encode(&self, image: &Self::Image) -> Result<Vec<u8>, CodecError> {
        let mut buffer = Cursor::new(Vec::new());
        image
            .write_to(&mut buffer, self.output_format)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(buffer.into_inner())
    }

    fn cost(&self, image: &Self::Image) -> usize {
        image.as_bytes().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_bytes_codec_is_identity() {
        let codec = BytesCodec;
        let data = vec![1, 2, 3, 4];

        assert_eq!(codec.decode(&data).unwrap(), data);
        assert_eq!(codec.encode(&data).unwrap(), data);
        assert_eq!(codec.cost(&data), 4);
    }

    #[test]
    fn test_raster_codec_png_round_trip() {
        let codec = RasterCodec::default();
        let mut pixels = RgbaImage::new(4, 3);
        pixels.put_pixel(1, 1, Rgba([255, 0, 0, 255]));
        let image = DynamicImage::ImageRgba8(pixels);

        let encoded = codec.encode(&image).unwrap();
        assert_eq!(&encoded[1..4], b"PNG");

        let decoded = codec.decode(&encoded).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 3);
        assert_eq!(decoded.to_rgba8().get_pixel(1, 1), &Rgba([255, 0, 0, 255]));
    }

    #[test]
    fn test_raster_codec_cost_is_pixel_bytes() {
        let codec = RasterCodec::default();
        let image = DynamicImage::ImageRgba8(RgbaImage::new(10, 10));
        assert_eq!(codec.cost(&image), 400);
    }

    #[test]
    fn test_raster_codec_rejects_garbage() {
        let codec = RasterCodec::default();
        let result = codec.decode(b"definitely not an image");
        assert!(matches!(result, Err(CodecError::Decode(_))));
    }
}
