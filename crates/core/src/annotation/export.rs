//! Turning an annotated image into something a user can look at or save.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::imaging::image_codec::{self, EncodeFormat};
use crate::shared::constants::{DOWNLOAD_FILE_NAME, DOWNLOAD_MIME};
use crate::shared::error::FaceScanError;
use crate::shared::pixel_image::{PixelFormat, PixelImage};

/// An encoded image ready to be offered as a file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadArtifact {
    pub file_name: String,
    pub mime: String,
    pub bytes: Vec<u8>,
}

impl DownloadArtifact {
    /// Writes the bytes to `path`, replacing any existing file.
    ///
    /// The bytes are staged in a temporary file next to `path` and renamed
    /// into place, so a failed write never leaves a truncated PNG behind.
    pub fn write_to(&self, path: &Path) -> Result<(), FaceScanError> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut staged = NamedTempFile::new_in(dir)?;
        staged.write_all(&self.bytes)?;
        staged.flush()?;
        staged.persist(path).map_err(|e| e.error)?;
        log::debug!("Wrote {} bytes to {}", self.bytes.len(), path.display());
        Ok(())
    }
}

/// The image in RGB order, as screens and browsers expect it.
pub fn to_displayable(image: &PixelImage) -> Result<PixelImage, FaceScanError> {
    match image.format() {
        PixelFormat::Gray => {
            let data = image.data().iter().flat_map(|&v| [v, v, v]).collect();
            Ok(PixelImage::new(
                data,
                image.width(),
                image.height(),
                PixelFormat::Rgb,
            ))
        }
        _ => image_codec::with_channel_order(image, PixelFormat::Rgb),
    }
}

/// PNG-encodes the image as `annotated_faces.png`.
pub fn to_downloadable(image: &PixelImage) -> Result<DownloadArtifact, FaceScanError> {
    let bytes = image_codec::encode(image, EncodeFormat::Png)?;
    Ok(DownloadArtifact {
        file_name: DOWNLOAD_FILE_NAME.to_string(),
        mime: DOWNLOAD_MIME.to_string(),
        bytes,
    })
}
