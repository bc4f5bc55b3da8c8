use crate::shared::color::Color;
use crate::shared::constants::DEFAULT_THICKNESS;
use crate::shared::error::FaceScanError;

/// Stroke settings for box outlines.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnnotationStyle {
    pub color: Color,
    /// Stroke width in pixels; at least 1.
    pub thickness: u32,
}

impl AnnotationStyle {
    pub fn new(color: Color, thickness: u32) -> Self {
        Self { color, thickness }
    }

    pub fn validate(&self) -> Result<(), FaceScanError> {
        if self.thickness == 0 {
            return Err(FaceScanError::InvalidParameter(
                "thickness must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for AnnotationStyle {
    fn default() -> Self {
        Self {
            color: Color::default(),
            thickness: DEFAULT_THICKNESS,
        }
    }
}
