//! Test utilities and fixtures for genre-lens tests.
//!
//! This module provides WAV fixtures and deterministic fakes for the
//! injected capabilities (resolver, classifier, thumbnails), so pipeline
//! tests never touch the network or an ONNX model.
//!
//! # Example
//!
//! ```ignore
//! use genre_lens::test_utils::{FakeResolver, write_sine_wav};
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let resolver = FakeResolver::new().missing("Imagine");
//!     // ... test logic
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use parking_lot::Mutex;

use crate::classifier::{Classifier, rank};
use crate::error::{Error, Result};
use crate::model::Prediction;
use crate::resolver::{AudioResolver, ResolutionError, ResolvedSource};
use crate::thumbnail::{ThumbnailError, ThumbnailFetcher};

/// A mono sine wave.
pub fn sine(freq: f32, sample_rate: u32, secs: f32) -> Vec<f32> {
    let n = (sample_rate as f32 * secs) as usize;
    (0..n)
        .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
        .collect()
}

/// Write a 16-bit WAV with `C` channels from interleaved frames.
pub fn write_wav<const C: usize>(path: &Path, sample_rate: u32, frames: &[[f32; C]]) {
    let spec = hound::WavSpec {
        channels: C as u16,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).expect("Failed to create WAV");
    for frame in frames {
        for &sample in frame {
            let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            writer.write_sample(value).expect("Failed to write sample");
        }
    }
    writer.finalize().expect("Failed to finalize WAV");
}

/// Write a mono 16-bit sine WAV.
pub fn write_sine_wav(path: &Path, freq: f32, sample_rate: u32, secs: f32) {
    let frames: Vec<[f32; 1]> = sine(freq, sample_rate, secs)
        .into_iter()
        .map(|s| [s])
        .collect();
    write_wav(path, sample_rate, &frames);
}

/// Resolver that answers from memory and writes short sine clips.
///
/// Each title gets its own tone, so different titles render to different
/// images.
#[derive(Default)]
pub struct FakeResolver {
    missing: HashSet<String>,
    corrupt: HashSet<String>,
    searches: AtomicUsize,
    acquired: Mutex<Vec<PathBuf>>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report `title` as not found.
    pub fn missing(mut self, title: &str) -> Self {
        self.missing.insert(title.to_string());
        self
    }

    /// Acquire undecodable bytes for `title`.
    pub fn corrupt(mut self, title: &str) -> Self {
        self.corrupt.insert(title.to_string());
        self
    }

    pub fn search_count(&self) -> usize {
        self.searches.load(Ordering::SeqCst)
    }

    /// Every path audio was written to, in order.
    pub fn acquired(&self) -> Vec<PathBuf> {
        self.acquired.lock().clone()
    }
}

#[async_trait]
impl AudioResolver for FakeResolver {
    async fn search(&self, title: &str) -> std::result::Result<ResolvedSource, ResolutionError> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if self.missing.contains(title) {
            return Err(ResolutionError::NotFound(title.to_string()));
        }
        Ok(ResolvedSource {
            title: format!("{} (Official Audio)", title),
            url: format!("fake://{}", title),
            thumbnail_url: Some(format!("fake://thumb/{}", title)),
        })
    }

    async fn acquire_audio(
        &self,
        url: &str,
        dest: &Path,
    ) -> std::result::Result<(), ResolutionError> {
        let title = url.trim_start_matches("fake://");
        self.acquired.lock().push(dest.to_path_buf());

        if self.corrupt.contains(title) {
            std::fs::write(dest, b"not audio at all")
                .map_err(|e| ResolutionError::ToolFailed(e.to_string()))?;
            return Ok(());
        }

        let freq = 110.0 + (title.bytes().map(u32::from).sum::<u32>() % 40) as f32 * 50.0;
        write_sine_wav(dest, freq, 22_050, 0.5);
        Ok(())
    }
}

/// Classifier returning fixed scores.
pub struct FakeClassifier {
    scores: Vec<(String, f32)>,
    fail: bool,
    seen: Mutex<Vec<PathBuf>>,
}

impl FakeClassifier {
    pub fn new(scores: &[(&str, f32)]) -> Self {
        Self {
            scores: scores.iter().map(|(l, s)| (l.to_string(), *s)).collect(),
            fail: false,
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Six genres with a clear winner.
    pub fn genres() -> Self {
        Self::new(&[
            ("edm", 0.02),
            ("latin", 0.01),
            ("pop", 0.912),
            ("r&b", 0.0077),
            ("rap", 0.0),
            ("rock", 0.0503),
        ])
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(&[])
        }
    }

    /// Images passed to `predict`, in order.
    pub fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().clone()
    }
}

impl Classifier for FakeClassifier {
    fn predict(&self, image: &Path) -> Result<Vec<Prediction>> {
        self.seen.lock().push(image.to_path_buf());
        if self.fail {
            return Err(Error::classifier("model exploded"));
        }
        if !image.is_file() {
            return Err(Error::media(image, "no such image"));
        }
        let labels: Vec<String> = self.scores.iter().map(|(l, _)| l.clone()).collect();
        let scores: Vec<f32> = self.scores.iter().map(|(_, s)| *s).collect();
        Ok(rank(&labels, &scores))
    }
}

/// Thumbnail source that either serves a tiny PNG or fails.
pub struct FakeThumbnails {
    fail: bool,
}

impl FakeThumbnails {
    pub fn ok() -> Self {
        Self { fail: false }
    }

    pub fn failing() -> Self {
        Self { fail: true }
    }
}

#[async_trait]
impl ThumbnailFetcher for FakeThumbnails {
    async fn fetch(&self, _url: &str) -> std::result::Result<Vec<u8>, ThumbnailError> {
        if self.fail {
            return Err(ThumbnailError::Status(404));
        }
        let mut bytes = std::io::Cursor::new(Vec::new());
        RgbImage::from_pixel(16, 9, Rgb([10, 120, 200]))
            .write_to(&mut bytes, ImageFormat::Png)
            .map_err(|e| ThumbnailError::Network(e.to_string()))?;
        Ok(bytes.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sine_wav_roundtrips_through_hound() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.wav");
        write_sine_wav(&path, 440.0, 8_000, 0.25);

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 2_000);
    }

    #[tokio::test]
    async fn test_fake_resolver() {
        let dir = tempdir().unwrap();
        let resolver = FakeResolver::new().missing("Imagine");

        assert!(matches!(
            resolver.search("Imagine").await,
            Err(ResolutionError::NotFound(_))
        ));
        let source = resolver.search("Yesterday").await.unwrap();
        let dest = dir.path().join("Yesterday.wav");
        resolver.acquire_audio(&source.url, &dest).await.unwrap();

        assert!(dest.is_file());
        assert_eq!(resolver.search_count(), 2);
        assert_eq!(resolver.acquired(), vec![dest]);
    }

    #[test]
    fn test_fake_classifier_ranks() {
        let dir = tempdir().unwrap();
        let image = dir.path().join("x.png");
        std::fs::write(&image, b"png").unwrap();

        let top = FakeClassifier::genres().top(&image, 5).unwrap();
        assert_eq!(top.len(), 5);
        assert_eq!(top[0].label, "pop");
        assert!(FakeClassifier::failing().predict(&image).is_err());
    }
}
