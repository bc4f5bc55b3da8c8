use crate::shared::bounding_box::BoundingBox;
use crate::shared::error::FaceScanError;
use crate::shared::pixel_image::PixelImage;

/// Domain interface for marking detected boxes on a colour image.
///
/// Implementations return a new image and leave `image` untouched.
pub trait FrameAnnotator: Send + Sync {
    fn annotate(
        &self,
        image: &PixelImage,
        boxes: &[BoundingBox],
    ) -> Result<PixelImage, FaceScanError>;
}
