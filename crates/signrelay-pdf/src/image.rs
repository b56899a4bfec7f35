//! Signature image decoding and embedding
//!
//! Signatures arrive as data URLs produced by a browser canvas
//! (`data:image/png;base64,...`). Bare base64 is accepted as well.

use std::io::Cursor;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use crate::error::StampError;
use crate::font::deflate;

const PNG_MIME: &str = "image/png";

/// Decode the base64 payload of a data URL (or bare base64) into raw bytes
pub fn decode_data_url(payload: &str) -> Result<Vec<u8>, StampError> {
    let payload = payload.trim();

    let encoded = match payload.strip_prefix("data:") {
        Some(rest) => {
            let (header, data) = rest
                .split_once(',')
                .ok_or_else(|| StampError::ImageError("data URL has no payload".into()))?;
            let mime = header.strip_suffix(";base64").ok_or_else(|| {
                StampError::ImageError("data URL is not base64-encoded".into())
            })?;
            if !mime.is_empty() && !mime.eq_ignore_ascii_case(PNG_MIME) {
                return Err(StampError::ImageError(format!(
                    "unsupported image type '{}'",
                    mime
                )));
            }
            data
        }
        None => payload,
    };

    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = BASE64
        .decode(compact.as_bytes())
        .map_err(|e| StampError::ImageError(format!("invalid base64: {}", e)))?;

    if bytes.is_empty() {
        return Err(StampError::ImageError("image payload is empty".into()));
    }
    Ok(bytes)
}

/// A decoded raster image split into colour and alpha planes
#[derive(Debug, Clone)]
pub struct SignatureImage {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
    alpha: Option<Vec<u8>>,
}

impl SignatureImage {
    /// Decode a data URL carrying a PNG
    pub fn from_data_url(payload: &str) -> Result<Self, StampError> {
        Self::from_png(&decode_data_url(payload)?)
    }

    /// Decode PNG bytes, normalising to 8-bit RGB with optional alpha
    pub fn from_png(bytes: &[u8]) -> Result<Self, StampError> {
        let mut decoder = png::Decoder::new(Cursor::new(bytes));
        decoder.set_transformations(png::Transformations::EXPAND | png::Transformations::STRIP_16);
        let mut reader = decoder
            .read_info()
            .map_err(|e| StampError::ImageError(e.to_string()))?;

        let (color_type, _) = reader.output_color_type();
        let mut buf = vec![0; reader.output_buffer_size()];
        let frame = reader
            .next_frame(&mut buf)
            .map_err(|e| StampError::ImageError(e.to_string()))?;
        let pixels = &buf[..frame.buffer_size()];

        let pixel_count = (frame.width as usize) * (frame.height as usize);
        let mut rgb = Vec::with_capacity(pixel_count * 3);
        let mut alpha = Vec::with_capacity(pixel_count);

        match color_type {
            png::ColorType::Rgb => rgb.extend_from_slice(pixels),
            png::ColorType::Rgba => {
                for px in pixels.chunks_exact(4) {
                    rgb.extend_from_slice(&px[..3]);
                    alpha.push(px[3]);
                }
            }
            png::ColorType::Grayscale => {
                for g in pixels {
                    rgb.extend_from_slice(&[*g, *g, *g]);
                }
            }
            png::ColorType::GrayscaleAlpha => {
                for px in pixels.chunks_exact(2) {
                    rgb.extend_from_slice(&[px[0], px[0], px[0]]);
                    alpha.push(px[1]);
                }
            }
            png::ColorType::Indexed => {
                return Err(StampError::ImageError(
                    "indexed PNG was not expanded".into(),
                ))
            }
        }

        if rgb.len() != pixel_count * 3 {
            return Err(StampError::ImageError("truncated pixel data".into()));
        }

        // Fully opaque images need no soft mask
        let alpha = if alpha.iter().any(|a| *a != u8::MAX) {
            Some(alpha)
        } else {
            None
        };

        Ok(Self {
            width: frame.width,
            height: frame.height,
            rgb,
            alpha,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn has_alpha(&self) -> bool {
        self.alpha.is_some()
    }

    /// Add the image (and its soft mask) to `doc`, returning the image XObject id
    pub fn embed(&self, doc: &mut Document) -> Result<ObjectId, StampError> {
        let mut image = dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(self.width),
            "Height" => i64::from(self.height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "FlateDecode",
        };

        if let Some(alpha) = &self.alpha {
            let smask_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => i64::from(self.width),
                    "Height" => i64::from(self.height),
                    "ColorSpace" => "DeviceGray",
                    "BitsPerComponent" => 8,
                    "Filter" => "FlateDecode",
                },
                deflate(alpha)?,
            ));
            image.set("SMask", Object::Reference(smask_id));
        }

        Ok(doc.add_object(Stream::new(image, deflate(&self.rgb)?)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn encode_png(width: u32, height: u32, color: png::ColorType, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(color);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(data).unwrap();
        }
        out
    }

    pub(crate) fn signature_data_url() -> String {
        // 4x2 black stroke on transparent background
        let mut data = Vec::new();
        for i in 0..8 {
            let a = if i % 2 == 0 { 255 } else { 0 };
            data.extend_from_slice(&[0, 0, 0, a]);
        }
        let png = encode_png(4, 2, png::ColorType::Rgba, &data);
        format!("data:image/png;base64,{}", BASE64.encode(png))
    }

    #[test]
    fn test_decode_data_url_strips_prefix() {
        let bytes = decode_data_url("data:image/png;base64,aGVsbG8=").unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[test]
    fn test_decode_bare_base64() {
        assert_eq!(decode_data_url("aGVs\nbG8=").unwrap(), b"hello");
    }

    #[test]
    fn test_decode_rejects_other_mime() {
        let err = decode_data_url("data:image/jpeg;base64,aGVsbG8=").unwrap_err();
        assert!(err.to_string().contains("image/jpeg"));
    }

    #[test]
    fn test_decode_rejects_non_base64_data_url() {
        assert!(decode_data_url("data:image/png,rawbytes").is_err());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_data_url("data:image/png;base64,!!!").is_err());
        assert!(decode_data_url("").is_err());
    }

    #[test]
    fn test_rgba_png_keeps_alpha() {
        let image = SignatureImage::from_data_url(&signature_data_url()).unwrap();
        assert_eq!((image.width(), image.height()), (4, 2));
        assert!(image.has_alpha());
        assert_eq!(image.rgb.len(), 4 * 2 * 3);
    }

    #[test]
    fn test_opaque_grayscale_png_drops_alpha() {
        let png = encode_png(3, 1, png::ColorType::Grayscale, &[0, 128, 255]);
        let image = SignatureImage::from_png(&png).unwrap();
        assert!(!image.has_alpha());
        assert_eq!(image.rgb, vec![0, 0, 0, 128, 128, 128, 255, 255, 255]);
    }

    #[test]
    fn test_non_png_bytes_fail() {
        let result = SignatureImage::from_png(b"GIF89a....");
        assert!(matches!(result, Err(StampError::ImageError(_))));
    }

    #[test]
    fn test_embed_adds_smask_for_transparent_image() {
        let image = SignatureImage::from_data_url(&signature_data_url()).unwrap();
        let mut doc = Document::with_version("1.7");
        let id = image.embed(&mut doc).unwrap();

        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert_eq!(stream.dict.get(b"Width").unwrap().as_i64().unwrap(), 4);
        assert!(stream.dict.has(b"SMask"));
    }
}
