pub mod bounding_box;
pub mod color;
pub mod constants;
pub mod error;
pub mod pixel_image;
