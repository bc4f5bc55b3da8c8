use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::detection::infrastructure::haar_cascade::HaarCascade;
use crate::shared::constants::{
    CASCADE_DIR_ENV, DEFAULT_CASCADE_NAME, DEFAULT_CASCADE_URL, OPENCV_CASCADE_DIRS,
};
use crate::shared::error::FaceScanError;

#[derive(Error, Debug)]
pub enum CascadeFetchError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write cascade to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Location of the bundled frontal-face cascade.
///
/// Resolution order:
/// 1. `$FACESCAN_CASCADE_DIR`
/// 2. User cache directory (where [`fetch_default`] stores it)
/// 3. OpenCV installation data directories
///
/// When no candidate exists the cache location is returned, so loading it
/// reports a not-found error naming the place a download would go.
pub fn resolve_default_path() -> PathBuf {
    let env_dir = std::env::var_os(CASCADE_DIR_ENV).map(PathBuf::from);
    let cache_dir = cascade_cache_dir().ok();
    let candidates = candidate_paths(env_dir, cache_dir.clone());

    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        log::debug!("Using Haar cascade at {}", found.display());
        return found.clone();
    }
    cache_dir
        .map(|d| d.join(DEFAULT_CASCADE_NAME))
        .unwrap_or_else(|| candidates[0].clone())
}

/// Loads a cascade from `path`, or from [`resolve_default_path`] when absent.
pub fn load(path: Option<&Path>) -> Result<HaarCascade, FaceScanError> {
    let path = path.map_or_else(resolve_default_path, Path::to_path_buf);
    if !path.exists() {
        return Err(FaceScanError::CascadeNotFound { path });
    }

    let cascade = HaarCascade::from_file(&path).map_err(|e| FaceScanError::CascadeLoad {
        path: path.clone(),
        reason: e.to_string(),
    })?;
    if cascade.is_empty() {
        return Err(FaceScanError::CascadeLoad {
            path,
            reason: "classifier has no stages".into(),
        });
    }

    let (w, h) = cascade.window_size();
    log::debug!(
        "Loaded {} stages, {} features, {w}x{h} window from {}",
        cascade.stages().len(),
        cascade.features().len(),
        path.display()
    );
    Ok(cascade)
}

/// Downloads the OpenCV frontal-face cascade into the cache directory
/// unless a cached copy already exists.
pub fn fetch_default(progress: Option<ProgressFn>) -> Result<PathBuf, CascadeFetchError> {
    let cache_dir = cascade_cache_dir()?;
    fetch(DEFAULT_CASCADE_NAME, DEFAULT_CASCADE_URL, &cache_dir, progress)
}

/// Platform-specific cascade cache directory.
///
/// - macOS: `~/Library/Application Support/FaceScan/cascades/`
/// - Linux: `$XDG_CACHE_HOME/FaceScan/cascades/` or `~/.cache/FaceScan/cascades/`
/// - Windows: `%LOCALAPPDATA%/FaceScan/cascades/`
pub fn cascade_cache_dir() -> Result<PathBuf, CascadeFetchError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("FaceScan").join("cascades"))
            .ok_or(CascadeFetchError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("FaceScan").join("cascades"))
            .ok_or(CascadeFetchError::NoCacheDir)
    }
}

fn candidate_paths(env_dir: Option<PathBuf>, cache_dir: Option<PathBuf>) -> Vec<PathBuf> {
    env_dir
        .into_iter()
        .chain(cache_dir)
        .chain(OPENCV_CASCADE_DIRS.iter().map(PathBuf::from))
        .map(|dir| dir.join(DEFAULT_CASCADE_NAME))
        .collect()
}

fn fetch(
    name: &str,
    url: &str,
    dir: &Path,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, CascadeFetchError> {
    let dest = dir.join(name);
    if dest.exists() {
        return Ok(dest);
    }
    fs::create_dir_all(dir).map_err(CascadeFetchError::CacheDir)?;
    log::info!("Downloading {name} from {url}");
    download(url, &dest, progress)?;
    Ok(dest)
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), CascadeFetchError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    // Clean up .part file on any error
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), CascadeFetchError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| CascadeFetchError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let write_err = |e| CascadeFetchError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    };
    let mut file = fs::File::create(temp_path).map_err(write_err)?;

    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| CascadeFetchError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::infrastructure::haar_cascade::tests::EDGE_CASCADE_XML;
    use tempfile::TempDir;

    #[test]
    fn test_candidates_search_env_then_cache_then_opencv() {
        let candidates = candidate_paths(
            Some(PathBuf::from("/env/dir")),
            Some(PathBuf::from("/cache/dir")),
        );
        assert_eq!(candidates.len(), 2 + OPENCV_CASCADE_DIRS.len());
        assert_eq!(candidates[0], Path::new("/env/dir").join(DEFAULT_CASCADE_NAME));
        assert_eq!(candidates[1], Path::new("/cache/dir").join(DEFAULT_CASCADE_NAME));
        assert_eq!(
            candidates[2],
            Path::new(OPENCV_CASCADE_DIRS[0]).join(DEFAULT_CASCADE_NAME)
        );
    }

    #[test]
    fn test_candidates_without_env_or_cache() {
        let candidates = candidate_paths(None, None);
        assert_eq!(candidates.len(), OPENCV_CASCADE_DIRS.len());
        assert!(candidates
            .iter()
            .all(|p| p.ends_with(DEFAULT_CASCADE_NAME)));
    }

    #[test]
    fn test_resolve_default_path_names_the_cascade() {
        assert!(resolve_default_path().ends_with(DEFAULT_CASCADE_NAME));
    }

    #[test]
    fn test_cascade_cache_dir_returns_path() {
        let path = cascade_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains("FaceScan"));
        assert!(path.to_string_lossy().contains("cascades"));
    }

    #[test]
    fn test_load_missing_file_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("missing.xml");
        match load(Some(&path)) {
            Err(FaceScanError::CascadeNotFound { path: reported }) => assert_eq!(reported, path),
            other => panic!("expected CascadeNotFound, got {other:?}"),
        }
    }

    #[test]
    fn test_load_garbage_is_load_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.xml");
        fs::write(&path, "this is not xml").unwrap();
        assert!(matches!(
            load(Some(&path)),
            Err(FaceScanError::CascadeLoad { .. })
        ));
    }

    #[test]
    fn test_load_cascade_without_stages_is_load_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("empty.xml");
        let xml = EDGE_CASCADE_XML.replace(
            EDGE_CASCADE_XML
                .split("<stages>")
                .nth(1)
                .unwrap()
                .split("</stages>")
                .next()
                .unwrap(),
            "",
        );
        fs::write(&path, xml).unwrap();
        match load(Some(&path)) {
            Err(FaceScanError::CascadeLoad { reason, .. }) => assert!(reason.contains("no stages")),
            other => panic!("expected CascadeLoad, got {other:?}"),
        }
    }

    #[test]
    fn test_load_valid_cascade() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("edge.xml");
        fs::write(&path, EDGE_CASCADE_XML).unwrap();
        let cascade = load(Some(&path)).unwrap();
        assert_eq!(cascade.window_size(), (8, 8));
    }

    #[test]
    fn test_fetch_uses_existing_file_without_network() {
        let tmp = TempDir::new().unwrap();
        let existing = tmp.path().join("cascade.xml");
        fs::write(&existing, EDGE_CASCADE_XML).unwrap();
        let path = fetch(
            "cascade.xml",
            "http://invalid.nonexistent.example.com/cascade.xml",
            tmp.path(),
            None,
        )
        .unwrap();
        assert_eq!(path, existing);
    }

    #[test]
    fn test_download_invalid_url_returns_error() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("cascade.xml");
        let result = download("http://invalid.nonexistent.example.com/cascade", &dest, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_download_atomic_no_partial_on_failure() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("cascade.xml");
        let _ = download("http://invalid.nonexistent.example.com/cascade", &dest, None);
        // Neither the dest nor the .part file should exist after failure
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }

    #[test]
    fn test_default_cascade_loads_when_installed() {
        let path = resolve_default_path();
        if !path.exists() {
            eprintln!("skipping: no frontal-face cascade at {}", path.display());
            return;
        }
        let cascade = load(None).unwrap();
        assert_eq!(cascade.window_size(), (24, 24));
        assert!(!cascade.is_empty());
    }
}
