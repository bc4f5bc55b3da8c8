pub mod cascade_loader;
pub mod haar_cascade;
pub mod haar_face_detector;
pub mod math;
pub mod rect_grouper;
