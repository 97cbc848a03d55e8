use async_trait::async_trait;
use bytes::Bytes;
use image::{codecs::jpeg::JpegEncoder, imageops::FilterType, GenericImageView};
use tracing::debug;

use crate::{UploadConfig, UploadError, UploadRequest, UploadResult};

pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Bounds an oversized image is brought within
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownsizePolicy {
    pub max_dimension_px: u32,
    pub max_bytes: u64,
    /// 1-100
    pub quality: u8,
}

impl From<&UploadConfig> for DownsizePolicy {
    fn from(config: &UploadConfig) -> Self {
        Self {
            max_dimension_px: config.max_dimension_px,
            max_bytes: config.downsize_threshold_bytes,
            quality: config.jpeg_quality,
        }
    }
}

/// Shrinks images that are too large to send as-is.
///
/// Implementations must return the request untouched when it is already
/// within the policy's bounds, and must fail rather than hand back the
/// oversized original when re-encoding is impossible.
#[async_trait]
pub trait ImageDownsizer: Send + Sync {
    async fn downsize(&self, request: UploadRequest, policy: DownsizePolicy) -> UploadResult<UploadRequest>;
}

/// Scales to fit `max_dimension_px` and re-encodes as JPEG.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegDownsizer;

#[async_trait]
impl ImageDownsizer for JpegDownsizer {
    async fn downsize(&self, request: UploadRequest, policy: DownsizePolicy) -> UploadResult<UploadRequest> {
        let input = request.bytes.clone();
        let encoded = tokio::task::spawn_blocking(move || downsize_image(&input, policy))
            .await
            .map_err(|e| UploadError::downsize(format!("downsize task failed: {e}")))??;

        match encoded {
            None => Ok(request),
            Some(jpeg) => {
                debug!(
                    filename = %request.filename,
                    from_bytes = request.bytes.len(),
                    to_bytes = jpeg.len(),
                    "re-encoded oversized image"
                );
                Ok(UploadRequest {
                    bytes: Bytes::from(jpeg),
                    content_type: JPEG_CONTENT_TYPE.to_string(),
                    ..request
                })
            }
        }
    }
}

/// Decode, scale and re-encode `bytes`. `None` means the input is already
/// within bounds and should be sent unchanged.
pub fn downsize_image(bytes: &[u8], policy: DownsizePolicy) -> UploadResult<Option<Vec<u8>>> {
    let decoded = image::load_from_memory(bytes)?;
    let (width, height) = decoded.dimensions();

    if bytes.len() as u64 <= policy.max_bytes
        && width <= policy.max_dimension_px
        && height <= policy.max_dimension_px
    {
        return Ok(None);
    }

    let (target_width, target_height) = calculate_target_size(width, height, policy.max_dimension_px);
    let resized = if (target_width, target_height) == (width, height) {
        decoded
    } else {
        decoded.resize_exact(target_width, target_height, FilterType::Triangle)
    };

    // JPEG has no alpha channel
    let rgb = resized.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, policy.quality.clamp(1, 100)).encode_image(&rgb)?;

    Ok(Some(out))
}

/// Uniform scale so neither edge exceeds `max_edge`; the scaled edge is
/// rounded and never collapses below one pixel.
pub fn calculate_target_size(width: u32, height: u32, max_edge: u32) -> (u32, u32) {
    if width <= max_edge && height <= max_edge {
        return (width, height);
    }

    let ratio = f64::min(
        max_edge as f64 / width as f64,
        max_edge as f64 / height as f64,
    );
    let scaled = |edge: u32| (((edge as f64) * ratio).round() as u32).clamp(1, max_edge);
    (scaled(width), scaled(height))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_fn(width, height, |x, y| {
            image::Rgba([(x % 256) as u8, (y % 256) as u8, ((x ^ y) % 256) as u8, 200])
        });
        let mut bytes = Vec::new();
        image::DynamicImage::ImageRgba8(image)
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn policy(max_dimension_px: u32, max_bytes: u64) -> DownsizePolicy {
        DownsizePolicy {
            max_dimension_px,
            max_bytes,
            quality: 80,
        }
    }

    #[test]
    fn target_size_keeps_aspect_ratio() {
        assert_eq!(calculate_target_size(4000, 3000, 1920), (1920, 1440));
        assert_eq!(calculate_target_size(3000, 4000, 1920), (1440, 1920));
        assert_eq!(calculate_target_size(800, 600, 1920), (800, 600));
        assert_eq!(calculate_target_size(10_000, 1, 1920), (1920, 1));
    }

    #[test]
    fn image_within_bounds_is_left_alone() {
        let bytes = png(32, 16);
        let out = downsize_image(&bytes, policy(64, bytes.len() as u64)).unwrap();
        assert!(out.is_none());
    }

    #[test]
    fn large_image_is_scaled_and_reencoded_as_jpeg() {
        let bytes = png(200, 100);
        let out = downsize_image(&bytes, policy(50, 0)).unwrap().unwrap();

        assert_eq!(image::guess_format(&out).unwrap(), image::ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (50, 25));
    }

    #[test]
    fn heavy_image_within_dimensions_is_still_reencoded() {
        let bytes = png(40, 40);
        let out = downsize_image(&bytes, policy(64, 10)).unwrap().unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!(decoded.dimensions(), (40, 40));
    }

    #[test]
    fn undecodable_input_is_a_downsize_error() {
        let err = downsize_image(b"definitely not an image", policy(64, 0)).unwrap_err();
        assert!(err.is_downsize());
    }

    #[tokio::test]
    async fn jpeg_downsizer_keeps_filename_and_switches_content_type() {
        let request = UploadRequest::new(png(120, 60), "shot.png").with_content_type("image/png");
        let out = JpegDownsizer.downsize(request, policy(60, 0)).await.unwrap();

        assert_eq!(out.filename, "shot.png");
        assert_eq!(out.content_type, JPEG_CONTENT_TYPE);
        let decoded = image::load_from_memory(&out.bytes).unwrap();
        assert_eq!(decoded.dimensions(), (60, 30));
    }
}
