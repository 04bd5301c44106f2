//! Raster payload encoding.

use base64::Engine;
use image::{DynamicImage, ImageBuffer, ImageFormat};
use std::io::Cursor;

/// Encode straight-alpha RGBA samples as a PNG data URL.
pub(crate) fn rgba_to_data_url(data: &[u8], width: u32, height: u32) -> Option<String> {
    let buffer = ImageBuffer::from_raw(width, height, data.to_vec())?;
    let image = DynamicImage::ImageRgba8(buffer);

    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .ok()?;

    let mut url = "data:image/png;base64,".to_string();
    url.push_str(&base64::engine::general_purpose::STANDARD.encode(png));

    Some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_a_png_data_url() {
        let data = vec![255u8; 2 * 2 * 4];
        let url = rgba_to_data_url(&data, 2, 2).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        assert!(url.len() > "data:image/png;base64,".len());
    }

    #[test]
    fn rejects_mismatched_dimensions() {
        assert!(rgba_to_data_url(&[0u8; 4], 2, 2).is_none());
    }
}
