//! Viola-Jones face detector over a loaded [`HaarCascade`].
//!
//! Scans an image pyramid with the cascade's base window, evaluating every
//! stage on integral images, then clusters the raw hits with
//! [`group_rectangles`].

use std::borrow::Cow;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::integral_image::{integral_image, integral_squared_image};

use crate::detection::domain::detection_parameters::DetectionParameters;
use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::infrastructure::haar_cascade::{HaarCascade, HaarFeature};
use crate::detection::infrastructure::rect_grouper::group_rectangles;
use crate::imaging::image_codec::to_gray_image;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::constants::GROUP_EPS;
use crate::shared::error::FaceScanError;
use crate::shared::pixel_image::PixelImage;

pub struct HaarFaceDetector {
    cascade: Arc<HaarCascade>,
}

impl HaarFaceDetector {
    pub fn new(cascade: Arc<HaarCascade>) -> Self {
        Self { cascade }
    }

    pub fn cascade(&self) -> &HaarCascade {
        &self.cascade
    }

    /// Raw positive windows across all pyramid levels, in original image
    /// coordinates and before grouping.
    fn scan(&self, gray: &GrayImage, params: &DetectionParameters) -> Vec<BoundingBox> {
        let (img_w, img_h) = gray.dimensions();
        let (win_w, win_h) = self.cascade.window_size();
        let (max_w, max_h) = params.max_size.unwrap_or((img_w, img_h));
        let (min_w, min_h) = params.min_size;

        let mut hits = Vec::new();
        let mut levels = 0usize;
        let mut factor = 1.0f64;
        loop {
            let window_w = (win_w as f64 * factor).round() as u32;
            let window_h = (win_h as f64 * factor).round() as u32;
            let scaled_w = (img_w as f64 / factor).round() as u32;
            let scaled_h = (img_h as f64 / factor).round() as u32;

            if window_w > max_w || window_h > max_h {
                break;
            }
            if scaled_w < win_w || scaled_h < win_h {
                break;
            }
            if window_w < min_w || window_h < min_h {
                factor *= params.scale_factor;
                continue;
            }

            let level: Cow<'_, GrayImage> = if (scaled_w, scaled_h) == (img_w, img_h) {
                Cow::Borrowed(gray)
            } else {
                Cow::Owned(imageops::resize(gray, scaled_w, scaled_h, FilterType::Triangle))
            };
            let integrals = Integrals::new(&level);
            let step = if factor >= 2.0 { 1 } else { 2 };

            let mut y = 0;
            while y + win_h <= scaled_h {
                let mut x = 0;
                while x + win_w <= scaled_w {
                    let result = self.classify(&integrals, x, y);
                    if result > 0 {
                        hits.push(BoundingBox::new(
                            (x as f64 * factor).round() as u32,
                            (y as f64 * factor).round() as u32,
                            window_w,
                            window_h,
                        ));
                    } else if result == 0 {
                        x += step;
                    }
                    x += step;
                }
                y += step;
            }

            levels += 1;
            factor *= params.scale_factor;
        }

        log::debug!("Scanned {levels} pyramid levels, {} raw hits", hits.len());
        hits
    }

    /// Runs the stages on the window at `(x, y)`.
    ///
    /// Returns 1 when every stage passes, otherwise minus the index of the
    /// rejecting stage (so 0 means the first stage rejected).
    fn classify(&self, integrals: &Integrals, x: u32, y: u32) -> i32 {
        let (win_w, win_h) = self.cascade.window_size();
        let inner_w = win_w - 2;
        let inner_h = win_h - 2;
        let area = (inner_w * inner_h) as f64;
        let sum = integrals.sum(x + 1, y + 1, inner_w, inner_h) as f64;
        let sqsum = integrals.sqsum(x + 1, y + 1, inner_w, inner_h) as f64;
        let variance = area * sqsum - sum * sum;
        let norm = if variance > 0.0 { variance.sqrt() } else { 1.0 };

        let features = self.cascade.features();
        for (index, stage) in self.cascade.stages().iter().enumerate() {
            let total: f64 = stage
                .trees
                .iter()
                .map(|tree| {
                    tree.evaluate(|f| feature_response(&features[f], integrals, x, y) / norm)
                })
                .sum();
            if total < stage.threshold {
                return -(index as i32);
            }
        }
        1
    }
}

impl FaceDetector for HaarFaceDetector {
    fn detect(
        &self,
        gray: &PixelImage,
        params: &DetectionParameters,
    ) -> Result<Vec<BoundingBox>, FaceScanError> {
        params.validate()?;
        let gray = to_gray_image(gray)?;
        if gray.width() == 0 || gray.height() == 0 {
            return Ok(Vec::new());
        }

        let raw = self.scan(&gray, params);
        let grouped = group_rectangles(&raw, params.min_neighbors, GROUP_EPS);
        log::debug!(
            "Grouped {} raw hits into {} detections (min_neighbors={})",
            raw.len(),
            grouped.len(),
            params.min_neighbors
        );
        Ok(grouped)
    }
}

fn feature_response(feature: &HaarFeature, integrals: &Integrals, x: u32, y: u32) -> f64 {
    feature
        .rects
        .iter()
        .map(|r| r.weight * integrals.sum(x + r.x, y + r.y, r.width, r.height) as f64)
        .sum()
}

/// Summed-area tables of one pyramid level, `(w + 1) x (h + 1)` with a
/// zero first row and column.
struct Integrals {
    sum: Vec<u64>,
    sqsum: Vec<u64>,
    stride: usize,
}

impl Integrals {
    fn new(image: &GrayImage) -> Self {
        Self {
            sum: integral_image::<_, u64>(image).into_raw(),
            sqsum: integral_squared_image::<_, u64>(image).into_raw(),
            stride: image.width() as usize + 1,
        }
    }

    fn sum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        rect_total(&self.sum, self.stride, x, y, w, h)
    }

    fn sqsum(&self, x: u32, y: u32, w: u32, h: u32) -> u64 {
        rect_total(&self.sqsum, self.stride, x, y, w, h)
    }
}

fn rect_total(table: &[u64], stride: usize, x: u32, y: u32, w: u32, h: u32) -> u64 {
    let at = |px: u32, py: u32| table[py as usize * stride + px as usize];
    (at(x + w, y + h) + at(x, y)) - (at(x, y + h) + at(x + w, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::infrastructure::cascade_loader;
    use crate::detection::infrastructure::haar_cascade::tests::{
        edge_cascade, TWO_STAGE_CASCADE_XML,
    };
    use crate::shared::pixel_image::PixelFormat;

    fn detector() -> HaarFaceDetector {
        HaarFaceDetector::new(Arc::new(edge_cascade()))
    }

    /// White above row `edge`, black from it down.
    fn horizontal_edge(width: u32, height: u32, edge: u32) -> PixelImage {
        let data = (0..height)
            .flat_map(|y| std::iter::repeat(if y < edge { 255 } else { 0 }).take(width as usize))
            .collect();
        PixelImage::new(data, width, height, PixelFormat::Gray)
    }

    fn two_stage_detector() -> HaarFaceDetector {
        let cascade = HaarCascade::from_xml_str(TWO_STAGE_CASCADE_XML).unwrap();
        HaarFaceDetector::new(Arc::new(cascade))
    }

    /// 64x64 image, white where `lit(x, y)` holds.
    fn lit_gray(lit: impl Fn(u32, u32) -> bool) -> GrayImage {
        GrayImage::from_fn(64, 64, |x, y| image::Luma([if lit(x, y) { 255 } else { 0 }]))
    }

    fn edge_params() -> DetectionParameters {
        DetectionParameters::new(1.5, 0).with_min_size(8, 8)
    }

    #[test]
    fn test_integral_rect_sum() {
        let img = GrayImage::from_fn(4, 3, |x, y| image::Luma([(x + 4 * y) as u8]));
        let integrals = Integrals::new(&img);
        // full image: 0 + 1 + ... + 11
        assert_eq!(integrals.sum(0, 0, 4, 3), 66);
        // pixels 5, 6, 9, 10
        assert_eq!(integrals.sum(1, 1, 2, 2), 30);
        assert_eq!(integrals.sqsum(1, 1, 2, 2), 25 + 36 + 81 + 100);
    }

    #[test]
    fn test_blank_image_has_no_detections() {
        let blank = PixelImage::filled(100, 100, PixelFormat::Gray, &[128]);
        let boxes = detector()
            .detect(&blank, &DetectionParameters::default())
            .unwrap();
        assert!(boxes.is_empty());
    }

    #[test]
    fn test_blank_image_without_grouping_has_no_hits() {
        let blank = PixelImage::filled(64, 64, PixelFormat::Gray, &[0]);
        assert!(detector().detect(&blank, &edge_params()).unwrap().is_empty());
    }

    #[test]
    fn test_edge_is_found_at_its_row() {
        let image = horizontal_edge(64, 64, 32);
        let boxes = detector().detect(&image, &edge_params()).unwrap();
        assert!(!boxes.is_empty());
        for b in &boxes {
            assert!(b.y <= 36 && b.y + b.height >= 28, "box {b:?} misses the edge");
        }
    }

    #[test]
    fn test_inverted_edge_is_ignored() {
        // dark above, bright below: the stump never fires
        let image = horizontal_edge(64, 64, 32);
        let inverted: Vec<u8> = image.data().iter().map(|v| 255 - v).collect();
        let image = PixelImage::new(inverted, 64, 64, PixelFormat::Gray);
        assert!(detector().detect(&image, &edge_params()).unwrap().is_empty());
    }

    #[test]
    fn test_min_size_skips_small_windows() {
        let image = horizontal_edge(64, 64, 32);
        let params = DetectionParameters::new(1.5, 0).with_min_size(20, 20);
        let boxes = detector().detect(&image, &params).unwrap();
        assert!(boxes.iter().all(|b| b.width >= 20 && b.height >= 20));
    }

    #[test]
    fn test_max_size_caps_windows() {
        let image = horizontal_edge(64, 64, 32);
        let params = edge_params().with_max_size(12, 12);
        let boxes = detector().detect(&image, &params).unwrap();
        assert!(!boxes.is_empty());
        assert!(boxes.iter().all(|b| b.width <= 12 && b.height <= 12));
    }

    #[test]
    fn test_detection_is_deterministic() {
        let image = horizontal_edge(80, 60, 25);
        let params = DetectionParameters::new(1.2, 1).with_min_size(8, 8);
        let first = detector().detect(&image, &params).unwrap();
        let second = detector().detect(&image, &params).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_image_smaller_than_window() {
        let tiny = PixelImage::filled(5, 5, PixelFormat::Gray, &[255]);
        assert!(detector().detect(&tiny, &edge_params()).unwrap().is_empty());
    }

    #[test]
    fn test_empty_image() {
        let empty = PixelImage::new(Vec::new(), 0, 0, PixelFormat::Gray);
        assert!(detector().detect(&empty, &edge_params()).unwrap().is_empty());
    }

    #[test]
    fn test_color_input_is_precondition_error() {
        let rgb = PixelImage::filled(64, 64, PixelFormat::Rgb, &[10, 20, 30]);
        assert!(matches!(
            detector().detect(&rgb, &DetectionParameters::default()),
            Err(FaceScanError::Precondition(_))
        ));
    }

    #[test]
    fn test_invalid_parameters_rejected_before_scanning() {
        let rgb = PixelImage::filled(64, 64, PixelFormat::Rgb, &[10, 20, 30]);
        for params in [
            DetectionParameters::new(1.0, 5),
            DetectionParameters::new(1.1, -1),
        ] {
            assert!(matches!(
                detector().detect(&rgb, &params),
                Err(FaceScanError::InvalidParameter(_))
            ));
        }
    }

    #[test]
    fn test_two_stage_classify_outcomes() {
        let detector = two_stage_detector();

        // top-left quadrant lit
        let corner = Integrals::new(&lit_gray(|x, y| x < 32 && y < 32));
        // straddles the row edge with uniform columns: passes both stages
        assert_eq!(detector.classify(&corner, 0, 28), 1);
        // straddles the corner: left half much brighter, second stage rejects
        assert_eq!(detector.classify(&corner, 28, 28), -1);
        // all dark: the root node sends it to a rejecting leaf
        assert_eq!(detector.classify(&corner, 40, 40), 0);

        // top-right quadrant lit: right half brighter, second node rejects
        let mirrored = Integrals::new(&lit_gray(|x, y| x >= 32 && y < 32));
        assert_eq!(detector.classify(&mirrored, 28, 28), 0);
    }

    #[test]
    fn test_two_stage_cascade_finds_row_edge() {
        let image = horizontal_edge(64, 64, 32);
        let boxes = two_stage_detector().detect(&image, &edge_params()).unwrap();
        assert!(!boxes.is_empty());
        for b in &boxes {
            assert!(b.y <= 36 && b.y + b.height >= 28, "box {b:?} misses the edge");
        }
    }

    #[test]
    fn test_two_stage_cascade_ignores_column_edge() {
        // bright on the left only: the top half is never brighter
        let data = (0..64u32)
            .flat_map(|_| (0..64u32).map(|x| if x < 32 { 255 } else { 0 }))
            .collect();
        let image = PixelImage::new(data, 64, 64, PixelFormat::Gray);
        assert!(two_stage_detector()
            .detect(&image, &edge_params())
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_opencv_cascade_on_blank_image() {
        let Ok(cascade) = cascade_loader::load(None) else {
            eprintln!(
                "skipping: no frontal-face cascade at {}",
                cascade_loader::resolve_default_path().display()
            );
            return;
        };
        let detector = HaarFaceDetector::new(Arc::new(cascade));
        let blank = PixelImage::filled(120, 120, PixelFormat::Gray, &[200]);
        assert!(detector
            .detect(&blank, &DetectionParameters::default())
            .unwrap()
            .is_empty());
    }
}
