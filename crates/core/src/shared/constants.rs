pub const DEFAULT_CASCADE_NAME: &str = "haarcascade_frontalface_default.xml";
pub const DEFAULT_CASCADE_URL: &str =
    "https://raw.githubusercontent.com/opencv/opencv/4.x/data/haarcascades/haarcascade_frontalface_default.xml";

/// Overrides the directory searched first for the default cascade.
pub const CASCADE_DIR_ENV: &str = "FACESCAN_CASCADE_DIR";

/// Where OpenCV installations usually put their bundled Haar cascades.
pub const OPENCV_CASCADE_DIRS: &[&str] = &[
    "/usr/share/opencv4/haarcascades",
    "/usr/local/share/opencv4/haarcascades",
    "/usr/share/opencv/haarcascades",
    "/usr/local/share/opencv/haarcascades",
    "/opt/homebrew/share/opencv4/haarcascades",
];

pub const DOWNLOAD_FILE_NAME: &str = "annotated_faces.png";
pub const DOWNLOAD_MIME: &str = "image/png";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

pub const DEFAULT_SCALE_FACTOR: f64 = 1.10;
pub const DEFAULT_MIN_NEIGHBORS: i32 = 5;
pub const DEFAULT_MIN_SIZE: (u32, u32) = (30, 30);
pub const DEFAULT_THICKNESS: u32 = 2;

/// Relative tolerance used when clustering raw detections.
pub const GROUP_EPS: f64 = 0.2;
