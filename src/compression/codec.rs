use crate::models::MediaType;
use crate::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::error::{DecodingError, ImageFormatHint};
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, ImageError, ImageFormat};
use std::io::Cursor;

/// One encode request handed to a codec.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeRequest {
    pub source: MediaType,
    pub target: MediaType,
    pub max_dimension: u32,
    /// Encoder quality in (0, 1].
    pub quality: f32,
}

/// Resize/re-encode/transcode backend. Implementations are CPU-bound and
/// synchronous; callers move them onto the blocking pool.
pub trait ImageCodec: Send + Sync {
    fn transcode(&self, input: &[u8], request: &EncodeRequest) -> Result<Vec<u8>>;
}

/// Codec backed by the `image` crate for decoding, resizing and JPEG/PNG
/// output, and libwebp for lossy WebP.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec;

impl NativeCodec {
    pub fn new() -> Self {
        Self
    }

    fn decode(input: &[u8], declared: MediaType) -> Result<DynamicImage> {
        let sniffed = image::guess_format(input)?;
        if sniffed != Self::image_format(declared) {
            return Err(Error::Image(ImageError::Decoding(DecodingError::new(
                ImageFormatHint::Exact(Self::image_format(declared)),
                format!("bytes look like {:?} but were declared as {}", sniffed, declared),
            ))));
        }
        Ok(image::load_from_memory_with_format(input, sniffed)?)
    }

    fn image_format(media_type: MediaType) -> ImageFormat {
        match media_type {
            MediaType::Jpeg => ImageFormat::Jpeg,
            MediaType::Png => ImageFormat::Png,
            MediaType::Webp => ImageFormat::WebP,
        }
    }

    fn fit_within(image: DynamicImage, max_dimension: u32) -> DynamicImage {
        if image.width() <= max_dimension && image.height() <= max_dimension {
            return image;
        }
        // `resize` keeps the aspect ratio and fits both edges inside the box.
        image.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    }

    fn encode_jpeg(image: &DynamicImage, quality: f32) -> Result<Vec<u8>> {
        let rgb = image.to_rgb8();
        let mut buffer = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, percent(quality));
        encoder.encode(
            rgb.as_raw(),
            rgb.width(),
            rgb.height(),
            ExtendedColorType::Rgb8,
        )?;
        Ok(buffer)
    }

    fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        image.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)?;
        Ok(buffer)
    }

    fn encode_webp(image: &DynamicImage, quality: f32) -> Result<Vec<u8>> {
        let rgba = image.to_rgba8();
        let encoder = webp::Encoder::from_rgba(rgba.as_raw(), rgba.width(), rgba.height());
        let encoded = encoder.encode(f32::from(percent(quality)));
        if encoded.is_empty() {
            return Err(Error::Invariant("WebP encoder produced no output".to_string()));
        }
        Ok(encoded.to_vec())
    }
}

/// Map a (0, 1] quality onto the 1..=100 scale encoders expect.
fn percent(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

impl ImageCodec for NativeCodec {
    fn transcode(&self, input: &[u8], request: &EncodeRequest) -> Result<Vec<u8>> {
        let decoded = Self::decode(input, request.source)?;
        let resized = Self::fit_within(decoded, request.max_dimension);

        match request.target {
            MediaType::Jpeg => Self::encode_jpeg(&resized, request.quality),
            // PNG is lossless; quality has no effect.
            MediaType::Png => Self::encode_png(&resized),
            MediaType::Webp => Self::encode_webp(&resized, request.quality),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn request(source: MediaType, target: MediaType) -> EncodeRequest {
        EncodeRequest {
            source,
            target,
            max_dimension: 1200,
            quality: 0.8,
        }
    }

    #[test]
    fn test_percent_scale() {
        assert_eq!(percent(0.75), 75);
        assert_eq!(percent(1.0), 100);
        assert_eq!(percent(0.001), 1);
    }

    #[test]
    fn test_png_to_webp() {
        let output = NativeCodec::new()
            .transcode(&png_bytes(64, 48), &request(MediaType::Png, MediaType::Webp))
            .unwrap();

        assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::WebP);
        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn test_png_to_jpeg() {
        let output = NativeCodec::new()
            .transcode(&png_bytes(32, 32), &request(MediaType::Png, MediaType::Jpeg))
            .unwrap();
        assert_eq!(image::guess_format(&output).unwrap(), ImageFormat::Jpeg);
    }

    #[test]
    fn test_resizes_long_edge_preserving_aspect_ratio() {
        let mut req = request(MediaType::Png, MediaType::Png);
        req.max_dimension = 100;

        let output = NativeCodec::new()
            .transcode(&png_bytes(400, 200), &req)
            .unwrap();
        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (100, 50));

        let output = NativeCodec::new()
            .transcode(&png_bytes(150, 600), &req)
            .unwrap();
        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (25, 100));
    }

    #[test]
    fn test_small_images_are_not_upscaled() {
        let output = NativeCodec::new()
            .transcode(&png_bytes(20, 10), &request(MediaType::Png, MediaType::Png))
            .unwrap();
        let decoded = image::load_from_memory(&output).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (20, 10));
    }

    #[test]
    fn test_corrupt_input_is_an_error() {
        let result = NativeCodec::new().transcode(
            b"\xFF\xD8\xFF\xE0 definitely not a jpeg body",
            &request(MediaType::Jpeg, MediaType::Webp),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_declared_type_must_match_bytes() {
        let result = NativeCodec::new().transcode(
            &png_bytes(8, 8),
            &request(MediaType::Jpeg, MediaType::Webp),
        );
        assert!(matches!(result, Err(Error::Image(_))));
    }
}
