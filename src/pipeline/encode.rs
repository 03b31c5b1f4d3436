//! Image encoding: rendered pages and uploaded images → base64 `ImageData`.
//!
//! Rendered PDF pages are PNG-encoded (lossless keeps small table text
//! legible). Uploaded images are passed through untouched with the MIME type
//! sniffed from their bytes.

use crate::error::UnitError;
use crate::pipeline::input::{self, Upload};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as a base64 PNG.
pub fn encode_page(page: usize, img: &DynamicImage) -> Result<ImageData, UnitError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .map_err(|e| UnitError::EncodeFailed {
            unit: page,
            detail: e.to_string(),
        })?;

    let b64 = STANDARD.encode(&buf);
    debug!("Page {}: encoded → {} bytes base64", page, b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Wrap an uploaded image for the vision request.
pub fn encode_upload(unit: usize, upload: &Upload) -> Result<ImageData, UnitError> {
    let format = input::image_format(unit, upload)?;
    let mime = format.to_mime_type();

    let b64 = STANDARD.encode(&upload.bytes);
    debug!("Unit {}: '{}' as {} ({} bytes base64)", unit, upload.name, mime, b64.len());

    Ok(ImageData::new(b64, mime).with_detail("high"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 255])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn encode_rendered_page() {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])));
        let data = encode_page(1, &img).unwrap();
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).unwrap();
        assert!(decoded.starts_with(b"\x89PNG"));
    }

    #[test]
    fn upload_keeps_original_bytes() {
        let bytes = png_bytes();
        let data = encode_upload(1, &Upload::new("sheet.png", bytes.clone())).unwrap();
        assert_eq!(data.mime_type, "image/png");
        assert_eq!(STANDARD.decode(&data.data).unwrap(), bytes);
    }

    #[test]
    fn non_image_upload_fails_its_unit() {
        let err = encode_upload(3, &Upload::new("notes.png", b"plain text".to_vec())).unwrap_err();
        assert_eq!(err.unit(), 3);
    }
}
