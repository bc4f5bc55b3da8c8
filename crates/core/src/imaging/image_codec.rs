//! Conversions between encoded image bytes and [`PixelImage`].
//!
//! Decoding always yields [`PixelFormat::Rgb`]. Encoders expect RGB and
//! convert BGR input themselves, so the declared order of an image is
//! honoured at every boundary.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use ndarray::Axis;

use crate::shared::error::FaceScanError;
use crate::shared::pixel_image::{PixelFormat, PixelImage};

/// Output container for [`encode`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EncodeFormat {
    Png,
    Jpeg,
}

impl EncodeFormat {
    pub fn mime(self) -> &'static str {
        match self {
            EncodeFormat::Png => "image/png",
            EncodeFormat::Jpeg => "image/jpeg",
        }
    }
}

impl From<EncodeFormat> for ImageFormat {
    fn from(format: EncodeFormat) -> Self {
        match format {
            EncodeFormat::Png => ImageFormat::Png,
            EncodeFormat::Jpeg => ImageFormat::Jpeg,
        }
    }
}

/// Decodes a PNG or JPEG byte buffer into an RGB image.
///
/// Empty, corrupt, unsupported or zero-sized input fails with
/// [`FaceScanError::Decode`].
pub fn decode(bytes: &[u8]) -> Result<PixelImage, FaceScanError> {
    if bytes.is_empty() {
        return Err(FaceScanError::Decode("input is empty".into()));
    }
    let format =
        image::guess_format(bytes).map_err(|e| FaceScanError::Decode(e.to_string()))?;
    if !matches!(format, ImageFormat::Png | ImageFormat::Jpeg) {
        return Err(FaceScanError::Decode(format!(
            "unsupported image format {format:?}; expected PNG or JPEG"
        )));
    }

    let decoded = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| FaceScanError::Decode(e.to_string()))?;
    let rgb = decoded.into_rgb8();
    if rgb.width() == 0 || rgb.height() == 0 {
        return Err(FaceScanError::Decode("image has zero size".into()));
    }
    Ok(from_rgb_image(rgb))
}

pub fn decode_file(path: &Path) -> Result<PixelImage, FaceScanError> {
    let bytes = std::fs::read(path)?;
    decode(&bytes)
}

/// Fixed-point BT.601 luma, the same weights OpenCV uses for RGB to gray.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    ((4899 * r as u32 + 9617 * g as u32 + 1868 * b as u32 + 8192) >> 14) as u8
}

/// Reduces a colour image to one channel. Gray input is returned as is.
pub fn to_grayscale(image: &PixelImage) -> PixelImage {
    let (ri, bi) = match image.format() {
        PixelFormat::Gray => return image.clone(),
        PixelFormat::Rgb => (0, 2),
        PixelFormat::Bgr => (2, 0),
    };
    let data = image
        .as_ndarray()
        .lanes(Axis(2))
        .into_iter()
        .map(|px| luma(px[ri], px[1], px[bi]))
        .collect();
    PixelImage::new(data, image.width(), image.height(), PixelFormat::Gray)
}

/// Swaps the first and third channel (RGB <-> BGR).
pub fn convert_channel_order(image: &PixelImage) -> Result<PixelImage, FaceScanError> {
    let target = match image.format() {
        PixelFormat::Rgb => PixelFormat::Bgr,
        PixelFormat::Bgr => PixelFormat::Rgb,
        PixelFormat::Gray => {
            return Err(FaceScanError::Precondition(
                "channel order conversion needs a 3-channel image".into(),
            ))
        }
    };
    let mut data = image.data().to_vec();
    for px in data.chunks_exact_mut(3) {
        px.swap(0, 2);
    }
    Ok(PixelImage::new(data, image.width(), image.height(), target))
}

/// Returns `image` in the `target` colour order, converting only when needed.
pub fn with_channel_order(
    image: &PixelImage,
    target: PixelFormat,
) -> Result<PixelImage, FaceScanError> {
    if image.format() == target {
        return Ok(image.clone());
    }
    if !target.is_color() || !image.format().is_color() {
        return Err(FaceScanError::Precondition(format!(
            "cannot reorder {:?} image as {target:?}",
            image.format()
        )));
    }
    convert_channel_order(image)
}

pub fn encode(image: &PixelImage, format: EncodeFormat) -> Result<Vec<u8>, FaceScanError> {
    if image.is_empty() {
        return Err(FaceScanError::Encode(format!(
            "cannot encode a {}x{} image",
            image.width(),
            image.height()
        )));
    }

    let (w, h) = (image.width(), image.height());
    let dynamic = match image.format() {
        PixelFormat::Gray => GrayImage::from_raw(w, h, image.data().to_vec())
            .map(DynamicImage::ImageLuma8),
        PixelFormat::Rgb => RgbImage::from_raw(w, h, image.data().to_vec())
            .map(DynamicImage::ImageRgb8),
        PixelFormat::Bgr => RgbImage::from_raw(w, h, convert_channel_order(image)?.into_data())
            .map(DynamicImage::ImageRgb8),
    }
    .ok_or_else(|| FaceScanError::Encode("pixel buffer does not match dimensions".into()))?;

    let mut buf = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut buf, format.into())
        .map_err(|e| FaceScanError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

pub(crate) fn from_rgb_image(rgb: RgbImage) -> PixelImage {
    let (w, h) = rgb.dimensions();
    PixelImage::new(rgb.into_raw(), w, h, PixelFormat::Rgb)
}

pub(crate) fn to_gray_image(image: &PixelImage) -> Result<GrayImage, FaceScanError> {
    if image.format() != PixelFormat::Gray {
        return Err(FaceScanError::Precondition(format!(
            "expected a single-channel image, got {:?}",
            image.format()
        )));
    }
    GrayImage::from_raw(image.width(), image.height(), image.data().to_vec())
        .ok_or_else(|| FaceScanError::Precondition("pixel buffer does not match dimensions".into()))
}
