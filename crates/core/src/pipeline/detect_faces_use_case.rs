use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::annotation::export::{to_downloadable, DownloadArtifact};
use crate::detection::domain::detection_parameters::DetectionParameters;
use crate::detection::domain::face_detector::FaceDetector;
use crate::imaging::image_codec;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::error::FaceScanError;
use crate::shared::pixel_image::PixelImage;

/// Outcome of one detection request.
#[derive(Clone, Debug)]
pub struct DetectionReport {
    pub original: PixelImage,
    pub boxes: Vec<BoundingBox>,
    pub annotated: PixelImage,
}

impl DetectionReport {
    pub fn face_count(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    /// Boxes as a pretty-printed JSON array of `[x, y, width, height]`.
    pub fn boxes_json(&self) -> Result<String, FaceScanError> {
        serde_json::to_string_pretty(&self.boxes).map_err(|e| FaceScanError::Encode(e.to_string()))
    }

    pub fn download(&self) -> Result<DownloadArtifact, FaceScanError> {
        to_downloadable(&self.annotated)
    }
}

/// Single-image pipeline: decode → grayscale → detect → annotate.
pub struct DetectFacesUseCase {
    detector: Box<dyn FaceDetector>,
    annotator: Box<dyn FrameAnnotator>,
}

impl DetectFacesUseCase {
    pub fn new(detector: Box<dyn FaceDetector>, annotator: Box<dyn FrameAnnotator>) -> Self {
        Self {
            detector,
            annotator,
        }
    }

    pub fn execute(
        &self,
        bytes: &[u8],
        params: &DetectionParameters,
    ) -> Result<DetectionReport, FaceScanError> {
        let original = image_codec::decode(bytes)?;
        let gray = image_codec::to_grayscale(&original);
        let boxes = self.detector.detect(&gray, params)?;
        log::debug!(
            "Detected {} face(s) in {}x{} image",
            boxes.len(),
            original.width(),
            original.height()
        );
        let annotated = self.annotator.annotate(&original, &boxes)?;

        Ok(DetectionReport {
            original,
            boxes,
            annotated,
        })
    }
}
