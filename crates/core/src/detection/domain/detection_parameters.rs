use crate::shared::constants::{DEFAULT_MIN_NEIGHBORS, DEFAULT_MIN_SIZE, DEFAULT_SCALE_FACTOR};
use crate::shared::error::FaceScanError;

/// Tunables for one multi-scale detection run.
#[derive(Clone, Debug, PartialEq)]
pub struct DetectionParameters {
    /// Window growth between pyramid levels; must exceed 1.0.
    pub scale_factor: f64,
    /// Raw hits a cluster needs beyond the first to be reported.
    /// Zero disables grouping.
    pub min_neighbors: i32,
    /// Smallest window (width, height) searched.
    pub min_size: (u32, u32),
    /// Largest window searched; `None` means the image size.
    pub max_size: Option<(u32, u32)>,
}

impl DetectionParameters {
    pub fn new(scale_factor: f64, min_neighbors: i32) -> Self {
        Self {
            scale_factor,
            min_neighbors,
            ..Self::default()
        }
    }

    pub fn with_min_size(mut self, width: u32, height: u32) -> Self {
        self.min_size = (width, height);
        self
    }

    pub fn with_max_size(mut self, width: u32, height: u32) -> Self {
        self.max_size = Some((width, height));
        self
    }

    /// Rejects values that would make the pyramid loop degenerate.
    pub fn validate(&self) -> Result<(), FaceScanError> {
        if !self.scale_factor.is_finite() || self.scale_factor <= 1.0 {
            return Err(FaceScanError::InvalidParameter(format!(
                "scale factor must be greater than 1.0, got {}",
                self.scale_factor
            )));
        }
        if self.min_neighbors < 0 {
            return Err(FaceScanError::InvalidParameter(format!(
                "min neighbors must be non-negative, got {}",
                self.min_neighbors
            )));
        }
        if self.min_size.0 == 0 || self.min_size.1 == 0 {
            return Err(FaceScanError::InvalidParameter(format!(
                "min size must be positive, got {}x{}",
                self.min_size.0, self.min_size.1
            )));
        }
        if let Some((w, h)) = self.max_size {
            if w < self.min_size.0 || h < self.min_size.1 {
                return Err(FaceScanError::InvalidParameter(format!(
                    "max size {w}x{h} is smaller than min size {}x{}",
                    self.min_size.0, self.min_size.1
                )));
            }
        }
        Ok(())
    }
}

impl Default for DetectionParameters {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            min_neighbors: DEFAULT_MIN_NEIGHBORS,
            min_size: DEFAULT_MIN_SIZE,
            max_size: None,
        }
    }
}
