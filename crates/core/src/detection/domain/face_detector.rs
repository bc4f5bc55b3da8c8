use crate::detection::domain::detection_parameters::DetectionParameters;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::error::FaceScanError;
use crate::shared::pixel_image::PixelImage;

/// Domain interface for face detection on a grayscale image.
///
/// Implementations hold only read-only state, so one detector can serve
/// any number of images and parameter sets.
pub trait FaceDetector: Send + Sync {
    fn detect(
        &self,
        gray: &PixelImage,
        params: &DetectionParameters,
    ) -> Result<Vec<BoundingBox>, FaceScanError>;
}
