//! Camera frame decoding
//!
//! Frames arrive as data URIs (`data:image/jpeg;base64,<payload>`). The
//! payload after the first comma is base64 for a compressed image.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::RgbImage;
use neurolink_common::{Error, Result};

/// Decoded camera frame
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    pub width: u32,
    pub height: u32,
    /// MIME type from the data URI header, if any (`image/jpeg`)
    pub mime: Option<String>,
    /// Compressed image bytes as received
    pub encoded: Vec<u8>,
    pub pixels: RgbImage,
}

impl DecodedFrame {
    /// Re-encode the compressed bytes as a data URI
    pub fn to_data_uri(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime.as_deref().unwrap_or("image/jpeg"),
            STANDARD.encode(&self.encoded)
        )
    }
}

/// Split a data URI into its MIME type and base64 payload
pub fn split_data_uri(uri: &str) -> Result<(Option<&str>, &str)> {
    let (header, payload) = uri
        .split_once(',')
        .ok_or_else(|| Error::Decode("frame is not a data URI (missing ',')".to_string()))?;

    let mime = header
        .strip_prefix("data:")
        .map(|rest| rest.split(';').next().unwrap_or(""))
        .filter(|m| !m.is_empty());

    Ok((mime, payload))
}

/// Decode a data URI frame into pixels
///
/// `max_payload_bytes` bounds the base64 payload size, checked before any
/// decoding work.
pub fn decode_data_uri(uri: &str, max_payload_bytes: usize) -> Result<DecodedFrame> {
    let (mime, payload) = split_data_uri(uri)?;
    let payload = payload.trim();

    if payload.is_empty() {
        return Err(Error::Decode("empty frame payload".to_string()));
    }
    if payload.len() > max_payload_bytes {
        return Err(Error::Decode(format!(
            "frame payload of {} bytes exceeds limit of {}",
            payload.len(),
            max_payload_bytes
        )));
    }

    let encoded = STANDARD
        .decode(payload)
        .map_err(|e| Error::Decode(format!("invalid base64: {}", e)))?;

    let pixels = image::load_from_memory(&encoded)
        .map_err(|e| Error::Decode(format!("invalid image: {}", e)))?
        .to_rgb8();

    Ok(DecodedFrame {
        width: pixels.width(),
        height: pixels.height(),
        mime: mime.map(str::to_string),
        encoded,
        pixels,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use image::ImageFormat;
    use std::io::Cursor;

    /// Solid-color PNG of the given size as a data URI
    pub(crate) fn png_data_uri(width: u32, height: u32) -> String {
        let img = RgbImage::from_pixel(width, height, image::Rgb([120, 80, 40]));
        let mut bytes = Cursor::new(Vec::new());
        img.write_to(&mut bytes, ImageFormat::Png).unwrap();
        format!("data:image/png;base64,{}", STANDARD.encode(bytes.into_inner()))
    }

    #[test]
    fn test_split_data_uri() {
        let (mime, payload) = split_data_uri("data:image/jpeg;base64,QUJD").unwrap();
        assert_eq!(mime, Some("image/jpeg"));
        assert_eq!(payload, "QUJD");

        // Only the first comma separates header from payload
        let (_, payload) = split_data_uri("data:,a,b").unwrap();
        assert_eq!(payload, "a,b");

        assert!(split_data_uri("no comma here").is_err());
    }

    #[test]
    fn test_decode_png_frame() {
        let frame = decode_data_uri(&png_data_uri(200, 120), usize::MAX).unwrap();
        assert_eq!(frame.width, 200);
        assert_eq!(frame.height, 120);
        assert_eq!(frame.mime.as_deref(), Some("image/png"));
        assert_eq!(frame.pixels.get_pixel(0, 0).0, [120, 80, 40]);
        assert!(frame.to_data_uri().starts_with("data:image/png;base64,"));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(
            decode_data_uri("data:image/png;base64,@@@", usize::MAX),
            Err(Error::Decode(_))
        ));
        assert!(matches!(
            decode_data_uri("data:image/png;base64,QUJD", usize::MAX),
            Err(Error::Decode(_))
        ));
        assert!(matches!(
            decode_data_uri("data:image/png;base64,", usize::MAX),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_payload() {
        let uri = png_data_uri(16, 16);
        assert!(decode_data_uri(&uri, 8).is_err());
    }
}
