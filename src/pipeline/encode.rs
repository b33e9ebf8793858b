//! Placeholder encoding: RGBA pixels → ThumbHash → attribute value.
//!
//! Two representations are supported (see [`OutputFormat`]):
//!
//! * **RawHash** — base64 of the ~25 hash bytes. Smallest possible attribute;
//!   the page needs a ThumbHash decoder in JavaScript to render it.
//! * **DataUrl** — the hash decoded back to a ~32 px RGBA image, PNG-encoded and
//!   wrapped as `data:image/png;base64,…`. Several hundred bytes, but drops
//!   straight into `src` or `background-image` with no client code.
//!
//! Both paths are pure functions of the pixels, so the same image always
//! yields the same attribute bytes.

use crate::config::OutputFormat;
use crate::error::ImageError;
use crate::pipeline::decode::{PixelBuffer, MAX_DIMENSION};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Prefix of every [`OutputFormat::DataUrl`] value.
pub const DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// A computed ThumbHash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PerceptualHash(Vec<u8>);

impl PerceptualHash {
    /// Hash a downscaled pixel buffer.
    pub fn from_pixels(pixels: &PixelBuffer) -> Result<Self, ImageError> {
        let (w, h) = (pixels.width(), pixels.height());
        if w > MAX_DIMENSION || h > MAX_DIMENSION {
            return Err(ImageError::Encode {
                detail: format!("{w}x{h} exceeds the {MAX_DIMENSION}x{MAX_DIMENSION} hash limit"),
            });
        }
        let hash = thumbhash::rgba_to_thumb_hash(w as usize, h as usize, pixels.rgba());
        Ok(Self(hash))
    }

    /// Wrap bytes obtained elsewhere, checking they decode as a ThumbHash.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, ImageError> {
        // The 5-byte header is the minimum a decoder reads.
        if bytes.len() < 5 {
            return Err(ImageError::Encode {
                detail: format!("hash is {} bytes, need at least 5", bytes.len()),
            });
        }
        let hash = Self(bytes);
        hash.to_pixels()?;
        Ok(hash)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Base64 of the raw hash bytes.
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    /// Reconstruct the blurred low-resolution preview.
    pub fn to_pixels(&self) -> Result<PixelBuffer, ImageError> {
        let (w, h, rgba) = thumbhash::thumb_hash_to_rgba(&self.0).map_err(|_| ImageError::Encode {
            detail: "hash bytes could not be decoded".into(),
        })?;
        PixelBuffer::new(w as u32, h as u32, rgba)
    }

    /// Width / height of the original image, to roughly one decimal place.
    pub fn approximate_aspect_ratio(&self) -> Option<f32> {
        thumbhash::thumb_hash_to_approximate_aspect_ratio(&self.0).ok()
    }

    /// Average colour as straight RGBA in `0.0..=1.0`.
    pub fn average_rgba(&self) -> Option<[f32; 4]> {
        thumbhash::thumb_hash_to_average_rgba(&self.0)
            .ok()
            .map(|(r, g, b, a)| [r, g, b, a])
    }

    /// PNG data URI of the reconstructed preview.
    pub fn to_data_url(&self) -> Result<String, ImageError> {
        let preview = self.to_pixels()?;
        let img = DynamicImage::ImageRgba8(preview.into_image());

        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|e| ImageError::Encode {
                detail: format!("PNG encoding failed: {e}"),
            })?;

        let mut url = String::with_capacity(DATA_URL_PREFIX.len() + buf.len() * 4 / 3 + 4);
        url.push_str(DATA_URL_PREFIX);
        STANDARD.encode_string(&buf, &mut url);
        Ok(url)
    }

    /// Render in the requested representation.
    pub fn render(&self, format: OutputFormat) -> Result<String, ImageError> {
        match format {
            OutputFormat::RawHash => Ok(self.to_base64()),
            OutputFormat::DataUrl => self.to_data_url(),
        }
    }
}

/// Hash `pixels` and render the attribute value for `format`.
pub fn encode(pixels: &PixelBuffer, format: OutputFormat) -> Result<String, ImageError> {
    let hash = PerceptualHash::from_pixels(pixels)?;
    let value = hash.render(format)?;
    debug!(
        "Encoded {}x{} → {} hash bytes, {} attribute bytes",
        pixels.width(),
        pixels.height(),
        hash.as_bytes().len(),
        value.len()
    );
    Ok(value)
}

/// Parse a [`OutputFormat::RawHash`] attribute value back into its hash.
///
/// Surrounding whitespace is ignored. Data URLs are rejected: the PNG preview
/// does not carry the hash.
pub fn decode_placeholder(value: &str) -> Result<PerceptualHash, ImageError> {
    let value = value.trim();
    if value.starts_with("data:") {
        return Err(ImageError::Encode {
            detail: "data URL placeholders do not embed the hash".into(),
        });
    }
    let bytes = STANDARD.decode(value).map_err(|e| ImageError::Encode {
        detail: format!("invalid base64: {e}"),
    })?;
    PerceptualHash::from_bytes(bytes)
}
