use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::annotation::domain::annotation_style::AnnotationStyle;
use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::color::Color;
use crate::shared::error::FaceScanError;
use crate::shared::pixel_image::PixelImage;

/// Draws each box outline onto a copy of `image`.
///
/// The outline runs through `(x, y)` and `(x + width, y + height)`
/// inclusive. A stroke of `thickness` pixels is centred on it, with the
/// extra pixel of an even stroke falling outside. Pixels beyond the image
/// are clipped.
pub fn draw_boxes(
    image: &PixelImage,
    boxes: &[BoundingBox],
    color: Color,
    thickness: u32,
) -> Result<PixelImage, FaceScanError> {
    if thickness == 0 {
        return Err(FaceScanError::InvalidParameter(
            "thickness must be at least 1".into(),
        ));
    }
    let format = image.format();
    if !format.is_color() {
        return Err(FaceScanError::Precondition(
            "boxes can only be drawn on a 3-channel image".into(),
        ));
    }

    // The buffer is only a 3-channel container; the colour is already in
    // the image's channel order.
    let mut canvas = RgbImage::from_raw(image.width(), image.height(), image.data().to_vec())
        .ok_or_else(|| FaceScanError::Precondition("pixel buffer does not match dimensions".into()))?;
    let channels = color.channels_for(format);
    let ink = Rgb([channels[0], channels[1], channels[2]]);

    let inward = (thickness as i64 - 1) / 2;
    let outward = thickness as i64 / 2;
    for b in boxes {
        for d in -outward..=inward {
            if let Some(rect) = outline_rect(b, d, image.width(), image.height()) {
                draw_hollow_rect_mut(&mut canvas, rect, ink);
            }
        }
    }

    Ok(PixelImage::new(
        canvas.into_raw(),
        image.width(),
        image.height(),
        format,
    ))
}

/// The outline of `b` shifted `d` pixels inwards (negative is outwards),
/// trimmed to the canvas.
///
/// Edges beyond the canvas are pulled to one pixel outside it, so they
/// stay invisible while every coordinate fits in `i32`. `None` when the
/// outline has collapsed or misses the canvas.
fn outline_rect(b: &BoundingBox, d: i64, canvas_w: u32, canvas_h: u32) -> Option<Rect> {
    let left = b.x as i64 + d;
    let top = b.y as i64 + d;
    let right = b.x as i64 + b.width as i64 - d;
    let bottom = b.y as i64 + b.height as i64 - d;
    if right < left || bottom < top {
        return None;
    }
    let (w, h) = (canvas_w as i64, canvas_h as i64);
    if left >= w || top >= h || right < 0 || bottom < 0 {
        return None;
    }

    let left = left.max(-1);
    let top = top.max(-1);
    let right = right.min(w);
    let bottom = bottom.min(h);
    Some(
        Rect::at(left as i32, top as i32)
            .of_size((right - left + 1) as u32, (bottom - top + 1) as u32),
    )
}

/// [`FrameAnnotator`] drawing plain rectangle outlines in one style.
pub struct OutlineAnnotator {
    style: AnnotationStyle,
}

impl OutlineAnnotator {
    pub fn new(style: AnnotationStyle) -> Result<Self, FaceScanError> {
        style.validate()?;
        Ok(Self { style })
    }

    pub fn style(&self) -> AnnotationStyle {
        self.style
    }
}

impl FrameAnnotator for OutlineAnnotator {
    fn annotate(
        &self,
        image: &PixelImage,
        boxes: &[BoundingBox],
    ) -> Result<PixelImage, FaceScanError> {
        draw_boxes(image, boxes, self.style.color, self.style.thickness)
    }
}
