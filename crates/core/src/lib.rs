//! Haar cascade face detection: image decoding, multi-scale detection,
//! box annotation and PNG export.

pub mod annotation;
pub mod detection;
pub mod imaging;
pub mod pipeline;
pub mod shared;

pub use shared::error::FaceScanError;
