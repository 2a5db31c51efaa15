//! Local Image Cache
//!
//! Keeps image files on local disk, named `<record id><extension>`, so they can
//! be served without going back to the origin.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info};

/// Name affixes of in-flight writes
const TEMP_PREFIX: &str = ".";
const TEMP_SUFFIX: &str = ".tmp";

/// Local disk cache for student images
#[derive(Debug, Clone)]
pub struct ImageCache {
    /// Root directory for cached files
    cache_dir: PathBuf,
}

impl ImageCache {
    /// Open the cache, creating the directory if needed
    ///
    /// # Arguments
    /// * `cache_dir` - Directory to store cached files
    pub fn new(cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let cache_dir = cache_dir.into();
        fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory: {:?}", cache_dir))?;

        let cache = Self { cache_dir };

        // Clean up any stale temp files from previous runs
        cache.cleanup();

        info!(cache_dir = %cache.cache_dir.display(), "Image cache initialized");
        Ok(cache)
    }

    /// Write image bytes under `filename`, replacing any existing file
    ///
    /// # Returns
    /// Path to the cached file
    pub fn store(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let local_path = self
            .path_for(filename)
            .with_context(|| format!("Refusing to cache invalid file name: {:?}", filename))?;

        // Write atomically so readers never see a half-written image
        let mut tmp = tempfile::Builder::new()
            .prefix(TEMP_PREFIX)
            .suffix(TEMP_SUFFIX)
            .tempfile_in(&self.cache_dir)
            .context("Failed to create temp file for cache")?;

        tmp.write_all(data).context("Failed to write cache file")?;

        tmp.persist(&local_path)
            .with_context(|| format!("Failed to persist cache file: {:?}", local_path))?;

        debug!(
            file = filename,
            local = %local_path.display(),
            size = data.len(),
            "Stored image in cache"
        );

        Ok(local_path)
    }

    /// Whether a cached file exists under `filename`
    pub fn contains(&self, filename: &str) -> bool {
        self.path_for(filename).is_some_and(|p| p.is_file())
    }

    /// Remove a cached file
    ///
    /// # Returns
    /// `true` if a file was removed, `false` if there was none
    pub fn remove(&self, filename: &str) -> Result<bool> {
        let Some(local_path) = self.path_for(filename) else {
            return Ok(false);
        };

        match fs::remove_file(&local_path) {
            Ok(()) => {
                debug!(file = filename, "Removed cached image");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove cache file: {:?}", local_path))
            }
        }
    }

    /// Clean up stale temp files on startup
    pub fn cleanup(&self) {
        // Only the hidden temp files `store` creates; images are never dot-prefixed
        if let Ok(read_dir) = fs::read_dir(&self.cache_dir) {
            for entry in read_dir.flatten() {
                let name = entry.file_name();
                let is_temp = name
                    .to_str()
                    .is_some_and(|n| n.starts_with(TEMP_PREFIX) && n.ends_with(TEMP_SUFFIX));
                if is_temp {
                    let path = entry.path();
                    debug!(path = %path.display(), "Removing stale temp file");
                    let _ = fs::remove_file(&path);
                }
            }
        }
    }

    /// Resolve a cache file name to its path on disk
    ///
    /// Returns `None` for anything that is not a plain file name, so request
    /// paths can never escape the cache directory.
    pub fn path_for(&self, filename: &str) -> Option<PathBuf> {
        is_plain_filename(filename).then(|| self.cache_dir.join(filename))
    }
}

fn is_plain_filename(filename: &str) -> bool {
    !filename.is_empty()
        && filename != "."
        && filename != ".."
        && !filename.contains(['/', '\\', '\0'])
}

/// Cache file name for a record: its id plus the extension of `source_name`
///
/// The extension is reduced to ASCII alphanumerics; anything else is dropped.
pub fn cache_filename(id: &str, source_name: &str) -> String {
    format!("{}{}", id, sanitized_extension(source_name))
}

/// Extension of the last path segment of a URL, with the leading dot
pub fn remote_extension(url: &str) -> String {
    let path = match reqwest::Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or(url).to_string(),
    };
    sanitized_extension(&path)
}

fn sanitized_extension(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let ext: String = Path::new(base)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.chars().filter(|c| c.is_ascii_alphanumeric()).collect())
        .unwrap_or_default();

    if ext.is_empty() {
        String::new()
    } else {
        format!(".{}", ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_contains_remove() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ImageCache::new(dir.path().join("uploads")).unwrap();

        assert!(!cache.contains("abc.png"));
        let path = cache.store("abc.png", b"png-bytes").unwrap();
        assert_eq!(path, dir.path().join("uploads").join("abc.png"));
        assert!(cache.contains("abc.png"));
        assert_eq!(fs::read(&path).unwrap(), b"png-bytes");

        // Overwrite in place
        cache.store("abc.png", b"new").unwrap();
        assert_eq!(fs::read(&path).unwrap(), b"new");

        assert!(cache.remove("abc.png").unwrap());
        assert!(!cache.remove("abc.png").unwrap());
        assert!(!cache.contains("abc.png"));
    }

    #[test]
    fn test_rejects_path_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ImageCache::new(dir.path()).unwrap();

        assert!(cache.path_for("../etc/passwd").is_none());
        assert!(cache.path_for("a/b.png").is_none());
        assert!(cache.path_for("..").is_none());
        assert!(cache.path_for("").is_none());
        assert!(cache.store("../escape.png", b"x").is_err());
        assert!(!cache.remove("../escape.png").unwrap());
    }

    #[test]
    fn test_cleanup_removes_stale_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".abc123.tmp"), b"partial").unwrap();
        fs::write(dir.path().join("keep.png"), b"img").unwrap();

        let cache = ImageCache::new(dir.path()).unwrap();
        assert!(!dir.path().join(".abc123.tmp").exists());
        assert!(cache.contains("keep.png"));
    }

    #[test]
    fn test_cleanup_keeps_images_with_tmp_extension() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ImageCache::new(dir.path()).unwrap();
        let filename = cache_filename("abc", "scan.tmp");
        cache.store(&filename, b"img").unwrap();

        cache.cleanup();
        assert!(cache.contains(&filename));

        ImageCache::new(dir.path()).unwrap();
        assert!(cache.contains(&filename));
    }

    #[test]
    fn test_cache_filename() {
        assert_eq!(cache_filename("abc", "photo.JPG"), "abc.JPG");
        assert_eq!(cache_filename("abc", "../../weird name.p n g"), "abc.png");
        assert_eq!(cache_filename("abc", "noext"), "abc");
        assert_eq!(cache_filename("abc", "archive.tar.gz"), "abc.gz");
    }

    #[test]
    fn test_remote_extension() {
        assert_eq!(
            remote_extension("https://raw.githubusercontent.com/o/r/main/up/abc.png"),
            ".png"
        );
        assert_eq!(
            remote_extension("https://raw.githubusercontent.com/o/r/main/up/abc.jpeg?token=XYZ"),
            ".jpeg"
        );
        assert_eq!(remote_extension("https://example.test/images/abc"), "");
        assert_eq!(remote_extension("not a url/abc.gif?x=1"), ".gif");
    }
}
