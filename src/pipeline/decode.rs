//! Pixel decoding: read an image file and shrink it to hashable RGBA.
//!
//! ThumbHash only accepts images up to 100×100, so every decoder hands back a
//! [`PixelBuffer`] that fits inside that box. The default [`RasterDecoder`]
//! uses the `image` crate:
//!
//! 1. guess the format from the file's magic bytes, not its extension
//! 2. read the EXIF orientation and rotate/flip before resizing, so a portrait
//!    phone photo hashes as portrait
//! 3. fit inside `MAX_DIMENSION × MAX_DIMENSION` preserving aspect ratio,
//!    never upscaling
//! 4. convert to RGBA8 (opaque formats get alpha = 255)
//!
//! Decoding is CPU-bound and blocking; callers run it on the blocking pool.

use crate::error::ImageError;
use image::imageops::FilterType;
use image::metadata::Orientation;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbaImage};
use std::io;
use std::path::Path;
use tracing::debug;

/// Largest width or height accepted by the hash algorithm.
pub const MAX_DIMENSION: u32 = 100;

/// Downscaled RGBA pixels ready for hashing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl PixelBuffer {
    /// Wrap raw RGBA bytes, checking the length matches the dimensions.
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::Encode {
                detail: format!("empty image ({width}x{height})"),
            });
        }
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(ImageError::Encode {
                detail: format!(
                    "RGBA buffer is {} bytes, expected {expected} for {width}x{height}",
                    rgba.len()
                ),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw RGBA bytes, 4 per pixel, row-major.
    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    /// Consume the buffer into an `image` crate RGBA image.
    pub fn into_image(self) -> RgbaImage {
        // Length was checked in `new`.
        RgbaImage::from_raw(self.width, self.height, self.rgba)
            .unwrap_or_else(|| RgbaImage::new(0, 0))
    }
}

impl TryFrom<RgbaImage> for PixelBuffer {
    type Error = ImageError;

    fn try_from(img: RgbaImage) -> Result<Self, Self::Error> {
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw())
    }
}

/// Turns a local path into downscaled RGBA pixels.
///
/// Implementations must be `Send + Sync`; one decoder instance is shared by
/// every concurrent image task of an [`crate::Annotator`].
pub trait PixelDecoder: Send + Sync {
    /// Decode `path`, fitting the result inside [`MAX_DIMENSION`] on both sides.
    fn decode(&self, path: &Path) -> Result<PixelBuffer, ImageError>;
}

/// The default decoder, backed by the `image` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterDecoder;

impl PixelDecoder for RasterDecoder {
    fn decode(&self, path: &Path) -> Result<PixelBuffer, ImageError> {
        let img = read_oriented(path)?;
        let (src_w, src_h) = (img.width(), img.height());

        let img = fit_inside(img, MAX_DIMENSION);
        debug!(
            "Decoded {} {}x{} → {}x{}",
            path.display(),
            src_w,
            src_h,
            img.width(),
            img.height()
        );

        PixelBuffer::new(img.width(), img.height(), img.into_rgba8().into_raw())
    }
}

/// Open and decode `path` with its EXIF orientation applied.
fn read_oriented(path: &Path) -> Result<DynamicImage, ImageError> {
    let decode_err = |detail: String| ImageError::Decode {
        path: path.to_path_buf(),
        detail,
    };

    let reader = ImageReader::open(path).map_err(|e| io_error(path, e))?;
    let reader = reader.with_guessed_format().map_err(|e| io_error(path, e))?;
    let mut decoder = reader.into_decoder().map_err(|e| decode_err(e.to_string()))?;

    // Missing or malformed EXIF is not worth failing the image over.
    let orientation = decoder.orientation().unwrap_or(Orientation::NoTransforms);

    let mut img = DynamicImage::from_decoder(decoder).map_err(|e| decode_err(e.to_string()))?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Shrink to fit inside a `max × max` box, keeping aspect ratio.
///
/// Images already inside the box are returned unchanged.
pub fn fit_inside(img: DynamicImage, max: u32) -> DynamicImage {
    if img.width() <= max && img.height() <= max {
        return img;
    }
    img.resize(max, max, FilterType::Lanczos3)
}

fn io_error(path: &Path, e: io::Error) -> ImageError {
    match e.kind() {
        io::ErrorKind::NotFound => ImageError::NotFound {
            path: path.to_path_buf(),
        },
        _ => ImageError::Decode {
            path: path.to_path_buf(),
            detail: e.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{ExtendedColorType, ImageEncoder, Rgb, RgbImage, Rgba};
    use tempfile::TempDir;

    fn write_png(dir: &TempDir, name: &str, w: u32, h: u32) -> std::path::PathBuf {
        let path = dir.path().join(name);
        RgbImage::from_fn(w, h, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 128]))
            .save(&path)
            .unwrap();
        path
    }

    #[test]
    fn pixel_buffer_rejects_wrong_length() {
        let err = PixelBuffer::new(2, 2, vec![0; 15]).unwrap_err();
        assert!(matches!(err, ImageError::Encode { .. }));
    }

    #[test]
    fn pixel_buffer_rejects_zero_size() {
        assert!(PixelBuffer::new(0, 4, vec![]).is_err());
    }

    #[test]
    fn pixel_buffer_from_rgba_image() {
        let buf = PixelBuffer::try_from(RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4]))).unwrap();
        assert_eq!((buf.width(), buf.height()), (3, 2));
        assert_eq!(buf.rgba().len(), 24);
        assert_eq!(&buf.rgba()[..4], &[1, 2, 3, 4]);
    }

    #[test]
    fn empty_rgba_image_is_rejected() {
        let err = PixelBuffer::try_from(RgbaImage::new(0, 0)).unwrap_err();
        assert!(matches!(err, ImageError::Encode { .. }), "got: {err:?}");
        assert!(PixelBuffer::try_from(RgbaImage::new(5, 0)).is_err());
    }

    #[test]
    fn exif_orientation_is_applied_before_fitting() {
        // Big-endian TIFF header with one IFD entry: Orientation (0x0112) = 6,
        // "rotate 90° clockwise to display".
        let exif = vec![
            0x4d, 0x4d, 0x00, 0x2a, 0x00, 0x00, 0x00, 0x08, // header, IFD at 8
            0x00, 0x01, // one entry
            0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x06, 0x00, 0x00, // SHORT 6
            0x00, 0x00, 0x00, 0x00, // no next IFD
        ];
        let landscape = RgbImage::from_fn(200, 100, |x, _| Rgb([(x % 256) as u8, 64, 32]));
        let mut jpeg = Vec::new();
        let mut encoder = JpegEncoder::new(&mut jpeg);
        encoder.set_exif_metadata(exif).unwrap();
        encoder
            .write_image(landscape.as_raw(), 200, 100, ExtendedColorType::Rgb8)
            .unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rotated.jpg");
        std::fs::write(&path, &jpeg).unwrap();

        let buf = RasterDecoder.decode(&path).unwrap();
        assert_eq!((buf.width(), buf.height()), (50, 100));
    }

    #[test]
    fn large_image_is_fit_inside_box() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "wide.png", 400, 200);

        let buf = RasterDecoder.decode(&path).unwrap();
        assert_eq!(buf.width(), 100);
        assert_eq!(buf.height(), 50);
        assert_eq!(buf.rgba().len(), 100 * 50 * 4);
    }

    #[test]
    fn portrait_image_is_fit_inside_box() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "tall.png", 150, 600);

        let buf = RasterDecoder.decode(&path).unwrap();
        assert_eq!(buf.height(), 100);
        assert_eq!(buf.width(), 25);
    }

    #[test]
    fn small_image_is_not_upscaled() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "small.png", 40, 20);

        let buf = RasterDecoder.decode(&path).unwrap();
        assert_eq!((buf.width(), buf.height()), (40, 20));
    }

    #[test]
    fn opaque_image_gets_full_alpha() {
        let dir = TempDir::new().unwrap();
        let path = write_png(&dir, "opaque.png", 8, 8);

        let buf = RasterDecoder.decode(&path).unwrap();
        assert!(buf.rgba().chunks_exact(4).all(|px| px[3] == 255));
    }

    #[test]
    fn format_is_sniffed_from_content() {
        let dir = TempDir::new().unwrap();
        let png = write_png(&dir, "real.png", 10, 10);
        let misnamed = dir.path().join("actually-png.jpg");
        std::fs::rename(&png, &misnamed).unwrap();

        assert!(RasterDecoder.decode(&misnamed).is_ok());
    }

    #[test]
    fn missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = RasterDecoder
            .decode(&dir.path().join("missing.jpg"))
            .unwrap_err();
        assert!(matches!(err, ImageError::NotFound { .. }), "got: {err:?}");
    }

    #[test]
    fn corrupt_file_is_decode_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let err = RasterDecoder.decode(&path).unwrap_err();
        assert!(matches!(err, ImageError::Decode { .. }), "got: {err:?}");
    }
}
