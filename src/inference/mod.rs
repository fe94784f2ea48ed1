//! Single-song genre classification.
//!
//! Each request works in its own directory under the scratch root:
//!
//! ```text
//! scratch/request-XXXXXX/
//!   audio.wav         deleted as soon as the spectrogram exists
//!   spectrogram.png
//!   thumbnail.png     downloaded thumbnail or generated placeholder
//! ```
//!
//! Requests never share files, so a service can serve several at once. A
//! service keeps the directories of its most recent completed requests and
//! deletes older ones as new requests finish.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::classifier::Classifier;
use crate::curation::ScratchFile;
use crate::error::{Error, IoPathExt, Result};
use crate::model::{ClassificationReport, DisplayImage, Prediction};
use crate::resolver::{AudioResolver, ResolvedSource};
use crate::spectrogram::SpectrogramRenderer;
use crate::thumbnail::{self, ThumbnailFetcher};

/// Prefix of per-request directories.
const REQUEST_PREFIX: &str = "request-";

const AUDIO_FILE: &str = "audio.wav";
const SPECTROGRAM_FILE: &str = "spectrogram.png";
const THUMBNAIL_FILE: &str = "thumbnail.png";

/// Resolve → render → classify → report.
pub struct InferenceService {
    resolver: Arc<dyn AudioResolver>,
    renderer: SpectrogramRenderer,
    classifier: Arc<dyn Classifier>,
    thumbnails: Arc<dyn ThumbnailFetcher>,
    scratch_root: PathBuf,
    fallback_thumbnail: Option<PathBuf>,
    top_k: usize,
    keep_requests: usize,
    completed: Mutex<VecDeque<PathBuf>>,
}

impl InferenceService {
    pub fn new(
        resolver: Arc<dyn AudioResolver>,
        renderer: SpectrogramRenderer,
        classifier: Arc<dyn Classifier>,
        thumbnails: Arc<dyn ThumbnailFetcher>,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            resolver,
            renderer,
            classifier,
            thumbnails,
            scratch_root: scratch_root.into(),
            fallback_thumbnail: None,
            top_k: 5,
            keep_requests: 8,
            completed: Mutex::new(VecDeque::new()),
        }
    }

    /// Image shown when the thumbnail can't be fetched.
    pub fn fallback_thumbnail(mut self, path: Option<PathBuf>) -> Self {
        self.fallback_thumbnail = path;
        self
    }

    pub fn top_k(mut self, k: usize) -> Self {
        self.top_k = k;
        self
    }

    /// How many completed request directories to keep (at least one).
    pub fn keep_requests(mut self, n: usize) -> Self {
        self.keep_requests = n.max(1);
        self
    }

    /// Classify one song by title.
    ///
    /// Nothing is written when the title can't be resolved. If any later step
    /// fails the request directory is removed again.
    pub async fn classify(&self, title: &str) -> Result<ClassificationReport> {
        let source = self.resolver.search(title).await?;
        info!(%title, resolved = %source.title, "Resolved song");

        std::fs::create_dir_all(&self.scratch_root).at_path(&self.scratch_root)?;
        // Removed on drop unless the request completes.
        let request = tempfile::Builder::new()
            .prefix(REQUEST_PREFIX)
            .tempdir_in(&self.scratch_root)
            .at_path(&self.scratch_root)?;

        let spectrogram = request.path().join(SPECTROGRAM_FILE);
        {
            let audio = ScratchFile::new(request.path().join(AUDIO_FILE));
            self.resolver
                .acquire_audio(&source.url, audio.path())
                .await?;
            self.renderer
                .render_async(audio.path(), &spectrogram)
                .await?;
        }

        let top = self.predict(&spectrogram).await?;
        let image = self.display_image(&source, request.path()).await;

        let dir = request.keep();
        info!(request = %dir.display(), "Classification complete");
        self.retire_old_requests(dir);

        Ok(ClassificationReport {
            song_title: title.to_string(),
            resolved_title: source.title,
            top,
            image,
            spectrogram,
        })
    }

    async fn predict(&self, spectrogram: &Path) -> Result<Vec<Prediction>> {
        let classifier = self.classifier.clone();
        let image = spectrogram.to_path_buf();
        let k = self.top_k;

        tokio::task::spawn_blocking(move || classifier.top(&image, k))
            .await
            .map_err(|e| Error::classifier(format!("classifier task failed: {}", e)))?
    }

    /// Downloaded thumbnail, configured fallback, or generated placeholder.
    async fn display_image(&self, source: &ResolvedSource, dir: &Path) -> DisplayImage {
        let dest = dir.join(THUMBNAIL_FILE);

        match &source.thumbnail_url {
            Some(url) => match self.thumbnails.fetch(url).await {
                Ok(bytes) => match thumbnail::save_as_png(&bytes, &dest) {
                    Ok(()) => return DisplayImage::Thumbnail(dest),
                    Err(e) => warn!(%url, "Unusable thumbnail: {}", e),
                },
                Err(e) => warn!(%url, "Thumbnail download failed: {}", e),
            },
            None => warn!(title = %source.title, "No thumbnail reference"),
        }

        if let Some(fallback) = &self.fallback_thumbnail
            && fallback.is_file()
        {
            return DisplayImage::Fallback(fallback.clone());
        }

        if let Err(e) = thumbnail::write_placeholder(&dest) {
            warn!("Failed to write placeholder thumbnail: {}", e);
        }
        DisplayImage::Fallback(dest)
    }

    fn retire_old_requests(&self, finished: PathBuf) {
        let expired: Vec<PathBuf> = {
            let mut completed = self.completed.lock();
            completed.push_back(finished);
            let excess = completed.len().saturating_sub(self.keep_requests);
            completed.drain(..excess).collect()
        };

        for dir in expired {
            match std::fs::remove_dir_all(&dir) {
                Ok(()) => tracing::debug!(request = %dir.display(), "Removed old request"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!(request = %dir.display(), "Failed to remove old request: {}", e),
            }
        }
    }

    /// Remove request directories left by earlier calls. Returns how many.
    pub fn purge_scratch(&self) -> Result<usize> {
        purge_scratch(&self.scratch_root)
    }
}

/// Remove every request directory under `scratch_root`.
///
/// Other files in the scratch root are left alone.
pub fn purge_scratch(scratch_root: &Path) -> Result<usize> {
    let entries = match std::fs::read_dir(scratch_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(Error::filesystem(scratch_root, e)),
    };

    let mut removed = 0;
    for entry in entries {
        let entry = entry.at_path(scratch_root)?;
        let path = entry.path();
        let is_request = entry.file_name().to_string_lossy().starts_with(REQUEST_PREFIX);
        if is_request && path.is_dir() {
            std::fs::remove_dir_all(&path).at_path(&path)?;
            removed += 1;
        }
    }

    info!(removed, scratch = %scratch_root.display(), "Purged scratch");
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SpectrogramConfig;
    use crate::test_utils::{FakeClassifier, FakeResolver, FakeThumbnails};
    use tempfile::{TempDir, tempdir};

    struct Fixture {
        dir: TempDir,
        resolver: Arc<FakeResolver>,
        classifier: Arc<FakeClassifier>,
    }

    impl Fixture {
        fn new(resolver: FakeResolver, classifier: FakeClassifier) -> Self {
            Self {
                dir: tempdir().unwrap(),
                resolver: Arc::new(resolver),
                classifier: Arc::new(classifier),
            }
        }

        fn scratch(&self) -> PathBuf {
            self.dir.path().join("scratch")
        }

        fn service(&self, thumbnails: FakeThumbnails) -> InferenceService {
            let renderer = SpectrogramRenderer::new(SpectrogramConfig {
                width_in: 1.0,
                height_in: 1.0,
                dpi: 32,
                ..SpectrogramConfig::default()
            });
            InferenceService::new(
                self.resolver.clone(),
                renderer,
                self.classifier.clone(),
                Arc::new(thumbnails),
                self.scratch(),
            )
        }

        fn files_under_scratch(&self) -> Vec<PathBuf> {
            walkdir::WalkDir::new(self.scratch())
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
                .map(|e| e.into_path())
                .collect()
        }
    }

    #[tokio::test]
    async fn test_classify_reports_top_five() {
        let fx = Fixture::new(FakeResolver::new(), FakeClassifier::genres());
        let service = fx.service(FakeThumbnails::ok());

        let report = service.classify("Shape of You").await.unwrap();

        assert_eq!(report.song_title, "Shape of You");
        assert_eq!(report.resolved_title, "Shape of You (Official Audio)");
        assert_eq!(report.top.len(), 5);
        assert_eq!(report.top[0].label, "pop");
        assert!(!report.image.is_fallback());
        assert!(report.image.path().is_file());
        assert!(report.spectrogram.is_file());
        assert!(report.to_string().starts_with("pop 91.20%    rock 5.03%    edm 2.00%"));
    }

    #[tokio::test]
    async fn test_not_found_writes_nothing() {
        let fx = Fixture::new(FakeResolver::new().missing("Imagine"), FakeClassifier::genres());
        let service = fx.service(FakeThumbnails::ok());

        let err = service.classify("Imagine").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(fx.files_under_scratch().is_empty());
        assert!(fx.classifier.seen().is_empty());
    }

    #[tokio::test]
    async fn test_audio_removed_after_success() {
        let fx = Fixture::new(FakeResolver::new(), FakeClassifier::genres());
        let service = fx.service(FakeThumbnails::ok());

        service.classify("Song").await.unwrap();

        let acquired = fx.resolver.acquired();
        assert_eq!(acquired.len(), 1);
        assert!(!acquired[0].exists());
        assert!(
            fx.files_under_scratch()
                .iter()
                .all(|p| p.extension().is_some_and(|e| e == "png"))
        );
    }

    #[tokio::test]
    async fn test_classifier_failure_removes_request() {
        let fx = Fixture::new(FakeResolver::new(), FakeClassifier::failing());
        let service = fx.service(FakeThumbnails::ok());

        let err = service.classify("Song").await.unwrap_err();

        assert!(matches!(err, Error::Classifier(_)));
        assert_eq!(fx.classifier.seen().len(), 1);
        assert!(fx.files_under_scratch().is_empty());
    }

    #[tokio::test]
    async fn test_render_failure_removes_audio() {
        let fx = Fixture::new(FakeResolver::new().corrupt("Noise"), FakeClassifier::genres());
        let service = fx.service(FakeThumbnails::ok());

        let err = service.classify("Noise").await.unwrap_err();

        assert!(matches!(err, Error::Media { .. }));
        assert!(fx.files_under_scratch().is_empty());
        assert!(fx.classifier.seen().is_empty());
    }

    #[tokio::test]
    async fn test_thumbnail_failure_uses_placeholder() {
        let fx = Fixture::new(FakeResolver::new(), FakeClassifier::genres());
        let service = fx.service(FakeThumbnails::failing());

        let report = service.classify("Song").await.unwrap();

        assert!(report.image.is_fallback());
        assert!(report.image.path().is_file());
        assert_eq!(report.top.len(), 5);
    }

    #[tokio::test]
    async fn test_thumbnail_failure_uses_configured_fallback() {
        let fx = Fixture::new(FakeResolver::new(), FakeClassifier::genres());
        let fallback = fx.dir.path().join("fallback.png");
        thumbnail::write_placeholder(&fallback).unwrap();
        let service = fx
            .service(FakeThumbnails::failing())
            .fallback_thumbnail(Some(fallback.clone()));

        let report = service.classify("Song").await.unwrap();

        assert_eq!(report.image, DisplayImage::Fallback(fallback));
    }

    #[tokio::test]
    async fn test_requests_do_not_share_directories() {
        let fx = Fixture::new(FakeResolver::new(), FakeClassifier::genres());
        let service = fx.service(FakeThumbnails::ok());

        let (a, b) = tokio::join!(service.classify("Same"), service.classify("Same"));
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_ne!(a.spectrogram, b.spectrogram);
        assert!(a.spectrogram.is_file() && b.spectrogram.is_file());
    }

    #[tokio::test]
    async fn test_only_recent_requests_are_kept() {
        let fx = Fixture::new(FakeResolver::new(), FakeClassifier::genres());
        let service = fx.service(FakeThumbnails::ok()).keep_requests(2);

        let first = service.classify("One").await.unwrap();
        let second = service.classify("Two").await.unwrap();
        let third = service.classify("Three").await.unwrap();

        assert!(!first.spectrogram.exists());
        assert!(second.spectrogram.is_file());
        assert!(third.spectrogram.is_file());
        let requests = std::fs::read_dir(fx.scratch()).unwrap().count();
        assert_eq!(requests, 2);
    }

    #[tokio::test]
    async fn test_purge_scratch() {
        let fx = Fixture::new(FakeResolver::new(), FakeClassifier::genres());
        let service = fx.service(FakeThumbnails::ok());

        assert_eq!(service.purge_scratch().unwrap(), 0);
        service.classify("One").await.unwrap();
        service.classify("Two").await.unwrap();
        std::fs::write(fx.scratch().join("keep-me.txt"), b"unrelated").unwrap();

        assert_eq!(service.purge_scratch().unwrap(), 2);
        assert_eq!(fx.files_under_scratch(), vec![fx.scratch().join("keep-me.txt")]);
    }
}
