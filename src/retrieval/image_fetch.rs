//! Fetcher for local imagery files

use std::path::PathBuf;
use std::sync::Arc;

use image::RgbaImage;

use super::fetch::{FetchError, FetchFuture, FetchTarget, Fetcher};

/// Reads and decodes image files (PNG, JPEG, ...) into RGBA8
///
/// File reads go through `tokio::fs`, decoding runs on the blocking pool so
/// the runtime's worker threads stay free. Remote URLs need a network
/// fetcher and fail with [`FetchError::Connection`].
#[derive(Clone, Debug, Default)]
pub struct ImageFileFetcher {
    /// Relative paths are resolved against this directory
    root: Option<PathBuf>,
}

impl ImageFileFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative paths against `root`
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: Some(root.into()) }
    }

    fn resolve(&self, path: PathBuf) -> PathBuf {
        match &self.root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path,
        }
    }

    async fn load(path: PathBuf) -> Result<Arc<RgbaImage>, FetchError> {
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(FetchError::NotFound),
            Err(e) => return Err(FetchError::Io(e)),
        };

        let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await
            .map_err(|e| FetchError::Decode(format!("decode task failed: {}", e)))?
            .map_err(|e| FetchError::Decode(format!("{}: {}", path.display(), e)))?;

        Ok(Arc::new(decoded.to_rgba8()))
    }
}

impl Fetcher<Arc<RgbaImage>> for ImageFileFetcher {
    fn fetch(&self, target: FetchTarget) -> FetchFuture<Arc<RgbaImage>> {
        match target {
            FetchTarget::Local(path) => Box::pin(Self::load(self.resolve(path))),
            FetchTarget::Remote(url) => Box::pin(async move {
                Err(FetchError::Connection(format!("no network transport for {}", url)))
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn write_png(dir: &std::path::Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let image = RgbaImage::from_pixel(4, 4, Rgba([10, 20, 30, 255]));
        image.save(&path).unwrap();
        path
    }

    #[tokio::test]
    async fn test_load_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_png(dir.path(), "tile.png");

        let fetcher = ImageFileFetcher::new();
        let image = fetcher.fetch(FetchTarget::Local(path)).await.unwrap();
        assert_eq!(image.dimensions(), (4, 4));
        assert_eq!(image.get_pixel(1, 1), &Rgba([10, 20, 30, 255]));
    }

    #[tokio::test]
    async fn test_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        write_png(dir.path(), "tile.png");

        let fetcher = ImageFileFetcher::with_root(dir.path());
        let result = fetcher.fetch(FetchTarget::Local(PathBuf::from("tile.png"))).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = ImageFileFetcher::new();
        let result = fetcher.fetch(FetchTarget::Local(dir.path().join("missing.png"))).await;
        assert!(matches!(result, Err(FetchError::NotFound)));
    }

    #[tokio::test]
    async fn test_corrupt_file_is_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corrupt.png");
        std::fs::write(&path, b"definitely not an image").unwrap();

        let fetcher = ImageFileFetcher::new();
        let result = fetcher.fetch(FetchTarget::Local(path)).await;
        assert!(matches!(result, Err(FetchError::Decode(_))));
    }

    #[tokio::test]
    async fn test_remote_unsupported() {
        let fetcher = ImageFileFetcher::new();
        let result = fetcher.fetch(FetchTarget::Remote("https://tiles.example/1.png".into())).await;
        assert!(matches!(result, Err(FetchError::Connection(_))));
    }
}
