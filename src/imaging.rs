//! Decoding of downloaded uploads into model-ready RGB buffers.

use image::RgbImage;

use crate::errors::{AppError, AppResult};

/// Decode raw upload bytes into an 8-bit, 3-channel image.
///
/// The container format is sniffed from the content. Alpha is dropped and
/// grayscale or palette images are expanded to RGB.
pub fn decode(bytes: &[u8]) -> AppResult<RgbImage> {
    if bytes.is_empty() {
        return Err(AppError::Decode("empty file".to_string()));
    }

    let img = image::load_from_memory(bytes).map_err(|e| AppError::Decode(e.to_string()))?;
    Ok(img.to_rgb8())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, GrayImage, ImageOutputFormat, Luma, Rgba, RgbaImage};
    use std::io::Cursor;

    fn encode(img: &DynamicImage, format: ImageOutputFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).unwrap();
        buf.into_inner()
    }

    #[test]
    fn test_decode_png_with_alpha() {
        let rgba = RgbaImage::from_pixel(6, 4, Rgba([10, 20, 30, 0]));
        let bytes = encode(&DynamicImage::ImageRgba8(rgba), ImageOutputFormat::Png);

        let rgb = decode(&bytes).unwrap();
        assert_eq!(rgb.dimensions(), (6, 4));
        assert_eq!(rgb.get_pixel(0, 0).0, [10, 20, 30]);
    }

    #[test]
    fn test_decode_grayscale_expands_channels() {
        let gray = GrayImage::from_pixel(3, 3, Luma([200]));
        let bytes = encode(&DynamicImage::ImageLuma8(gray), ImageOutputFormat::Png);

        let rgb = decode(&bytes).unwrap();
        assert_eq!(rgb.get_pixel(1, 1).0, [200, 200, 200]);
    }

    #[test]
    fn test_decode_jpeg() {
        let img = DynamicImage::new_rgb8(16, 16);
        let bytes = encode(&img, ImageOutputFormat::Jpeg(90));

        let rgb = decode(&bytes).unwrap();
        assert_eq!(rgb.dimensions(), (16, 16));
    }

    #[test]
    fn test_rejects_non_image_bytes() {
        let err = decode(b"definitely not an image").unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));

        let err = decode(&[]).unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }

    #[test]
    fn test_rejects_truncated_png() {
        let img = DynamicImage::new_rgb8(32, 32);
        let bytes = encode(&img, ImageOutputFormat::Png);
        let err = decode(&bytes[..bytes.len() / 2]).unwrap_err();
        assert!(matches!(err, AppError::Decode(_)));
    }

    #[test]
    fn test_arbitrary_bytes_never_panic() {
        for seed in 0u8..64 {
            let junk: Vec<u8> = (0..256u32).map(|i| (i as u8).wrapping_mul(seed)).collect();
            let _ = decode(&junk);
        }
    }
}
