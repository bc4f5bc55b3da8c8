use ndarray::ArrayView3;

/// Declared layout of the bytes inside a [`PixelImage`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    Gray,
    Rgb,
    Bgr,
}

impl PixelFormat {
    pub fn channels(self) -> u8 {
        match self {
            PixelFormat::Gray => 1,
            PixelFormat::Rgb | PixelFormat::Bgr => 3,
        }
    }

    pub fn is_color(self) -> bool {
        self != PixelFormat::Gray
    }
}

/// A dense 8-bit image: `height * width * channels` bytes in row-major order.
///
/// Every image carries its channel-order convention, so conversions at the
/// codec and export boundaries never have to guess.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PixelImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl PixelImage {
    pub fn new(data: Vec<u8>, width: u32, height: u32, format: PixelFormat) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (format.channels() as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            format,
        }
    }

    /// A single-colour image; `value` is repeated for every pixel.
    pub fn filled(width: u32, height: u32, format: PixelFormat, value: &[u8]) -> Self {
        debug_assert_eq!(value.len(), format.channels() as usize);
        let data = value.repeat((width as usize) * (height as usize));
        Self::new(data, width, height, format)
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub(crate) fn into_data(self) -> Vec<u8> {
        self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn channels(&self) -> u8 {
        self.format.channels()
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Channel values of the pixel at column `x`, row `y`.
    pub fn pixel(&self, x: u32, y: u32) -> &[u8] {
        let c = self.channels() as usize;
        let offset = ((y as usize) * (self.width as usize) + x as usize) * c;
        &self.data[offset..offset + c]
    }

    pub fn as_ndarray(&self) -> ArrayView3<'_, u8> {
        ArrayView3::from_shape(self.shape(), &self.data)
            .expect("PixelImage data length must match dimensions")
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels() as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let image = PixelImage::new(data.clone(), 2, 2, PixelFormat::Rgb);
        assert_eq!(image.width(), 2);
        assert_eq!(image.height(), 2);
        assert_eq!(image.channels(), 3);
        assert_eq!(image.format(), PixelFormat::Rgb);
        assert_eq!(image.data(), &data[..]);
    }

    #[test]
    fn test_gray_has_one_channel() {
        let image = PixelImage::new(vec![0u8; 6], 3, 2, PixelFormat::Gray);
        assert_eq!(image.channels(), 1);
        assert!(!image.format().is_color());
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        PixelImage::new(vec![0u8; 10], 2, 2, PixelFormat::Bgr);
    }

    #[test]
    fn test_filled_repeats_value() {
        let image = PixelImage::filled(3, 2, PixelFormat::Rgb, &[1, 2, 3]);
        assert_eq!(image.data().len(), 18);
        assert_eq!(image.pixel(2, 1), &[1, 2, 3]);
    }

    #[test]
    fn test_empty_dimensions() {
        let image = PixelImage::new(Vec::new(), 0, 5, PixelFormat::Rgb);
        assert!(image.is_empty());
    }

    #[test]
    fn test_as_ndarray_shape() {
        let image = PixelImage::new(vec![0u8; 24], 4, 2, PixelFormat::Rgb);
        assert_eq!(image.as_ndarray().shape(), &[2, 4, 3]); // (height, width, channels)
    }

    #[test]
    fn test_pixel_matches_ndarray() {
        // 2x2 RGB: set pixel (row=1, col=0) to red
        let mut data = vec![0u8; 12];
        data[6] = 255;
        let image = PixelImage::new(data, 2, 2, PixelFormat::Rgb);
        let arr = image.as_ndarray();
        assert_eq!(arr[[1, 0, 0]], 255);
        assert_eq!(image.pixel(0, 1), &[255, 0, 0]);
    }

    #[test]
    fn test_clone_is_independent() {
        let image = PixelImage::filled(2, 2, PixelFormat::Gray, &[100]);
        let mut data = image.clone().into_data();
        data[0] = 0;
        assert_eq!(image.data()[0], 100);
    }
}
