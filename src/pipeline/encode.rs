//! Image encoding: `DynamicImage` → base64 PNG wrapped in `ImageData`.
//!
//! Vision APIs take images as base64 payloads inside the JSON body. PNG keeps
//! rendered text crisp, which matters more than size when the model has to
//! read an assignment brief.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use edgequake_llm::ImageData;
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as a base64 PNG with `detail: "high"`.
pub fn encode_page(img: &DynamicImage) -> Result<ImageData, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;

    let b64 = STANDARD.encode(&buf);
    debug!("Encoded page image → {} bytes base64", b64.len());

    Ok(ImageData::new(b64, "image/png").with_detail("high"))
}

/// Encode every page, in order.
pub fn encode_pages(images: &[DynamicImage]) -> Result<Vec<ImageData>, image::ImageError> {
    images.iter().map(encode_page).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn page(color: [u8; 4]) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 12, Rgba(color)))
    }

    #[test]
    fn encode_small_image() {
        let data = encode_page(&page([255, 0, 0, 255])).expect("encode should succeed");
        assert_eq!(data.mime_type, "image/png");
        let decoded = STANDARD.decode(&data.data).expect("valid base64");
        assert_eq!(&decoded[1..4], b"PNG");
    }

    #[test]
    fn encode_pages_keeps_order_and_count() {
        let pages = [page([0, 0, 0, 255]), page([255, 255, 255, 255])];
        let encoded = encode_pages(&pages).unwrap();
        assert_eq!(encoded.len(), 2);
        assert_ne!(encoded[0].data, encoded[1].data);
    }
}
