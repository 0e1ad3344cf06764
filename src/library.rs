//! Read-only access to finished videos in the output directory.

use std::path::{Path, PathBuf};

/// Extension of every file the pipeline produces.
pub const VIDEO_EXTENSION: &str = "mp4";

/// Download URL for a video, as served by the web front end.
pub fn download_url(filename: &str) -> String {
    format!("/download-video?path={}", filename)
}

/// Errors that can occur when looking up videos.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("Video file not found: {0}")]
    NotFound(String),

    #[error("IO error reading {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// The directory finished videos are written to.
#[derive(Debug, Clone)]
pub struct VideoLibrary {
    dir: PathBuf,
}

impl VideoLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File names of all videos, sorted. A missing directory lists as empty.
    pub fn list(&self) -> Result<Vec<String>, LibraryError> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let entries = std::fs::read_dir(&self.dir).map_err(|source| LibraryError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut videos: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| path.extension().is_some_and(|ext| ext == VIDEO_EXTENSION))
            .filter_map(|path| path.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        videos.sort();

        log::debug!("Found {} videos in {}", videos.len(), self.dir.display());
        Ok(videos)
    }

    /// Resolve a requested video name to a path inside the library.
    ///
    /// Only the final component of `requested` is used, so absolute paths and
    /// `..` segments cannot escape the directory. The resolved file must
    /// exist and canonicalize to a location under the library directory.
    pub fn resolve(&self, requested: &str) -> Result<PathBuf, LibraryError> {
        let not_found = || LibraryError::NotFound(requested.to_string());

        let filename = Path::new(requested).file_name().ok_or_else(not_found)?;
        let base = self.dir.canonicalize().map_err(|_| not_found())?;
        let candidate = base.join(filename).canonicalize().map_err(|_| not_found())?;

        if !candidate.is_file() || !candidate.starts_with(&base) || candidate == base {
            return Err(not_found());
        }
        Ok(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn library_with(files: &[&str]) -> (tempfile::TempDir, VideoLibrary) {
        let dir = tempfile::tempdir().unwrap();
        for name in files {
            std::fs::write(dir.path().join(name), b"data").unwrap();
        }
        let library = VideoLibrary::new(dir.path());
        (dir, library)
    }

    #[test]
    fn test_download_url() {
        assert_eq!(
            download_url("video_1700000000.mp4"),
            "/download-video?path=video_1700000000.mp4"
        );
    }

    #[test]
    fn test_list_only_mp4_files_sorted() {
        let (dir, library) =
            library_with(&["video_2.mp4", "notes.txt", "video_1.mp4", "frame.png"]);
        std::fs::create_dir(dir.path().join("folder.mp4")).unwrap();

        assert_eq!(library.list().unwrap(), vec!["video_1.mp4", "video_2.mp4"]);
    }

    #[test]
    fn test_list_missing_dir_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let library = VideoLibrary::new(dir.path().join("absent"));
        assert!(library.list().unwrap().is_empty());
    }

    #[test]
    fn test_resolve_existing_video() {
        let (dir, library) = library_with(&["video_1.mp4"]);
        let path = library.resolve("video_1.mp4").unwrap();
        assert_eq!(
            path,
            dir.path().canonicalize().unwrap().join("video_1.mp4")
        );
    }

    #[test]
    fn test_resolve_uses_only_file_name() {
        let (_dir, library) = library_with(&["video_1.mp4"]);
        assert!(library.resolve("static/videos/video_1.mp4").is_ok());
        assert!(library.resolve("/etc/elsewhere/video_1.mp4").is_ok());
    }

    #[test]
    fn test_resolve_rejects_traversal_and_missing() {
        let outer = tempfile::tempdir().unwrap();
        let videos = outer.path().join("videos");
        std::fs::create_dir(&videos).unwrap();
        std::fs::write(outer.path().join("secret.mp4"), b"s").unwrap();
        let library = VideoLibrary::new(&videos);

        assert!(matches!(
            library.resolve("../secret.mp4"),
            Err(LibraryError::NotFound(_))
        ));
        assert!(matches!(library.resolve(".."), Err(LibraryError::NotFound(_))));
        assert!(matches!(library.resolve(""), Err(LibraryError::NotFound(_))));
        assert!(matches!(
            library.resolve("video_9.mp4"),
            Err(LibraryError::NotFound(_))
        ));
    }
}
