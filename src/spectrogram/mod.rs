//! Audio to Mel-spectrogram image rendering.
//!
//! The same transformation feeds both the curated dataset and inference
//! requests, so it lives behind one type: [`SpectrogramRenderer`].
//!
//! # Pipeline
//!
//! 1. Decode the whole file to mono and resample to the analysis rate
//! 2. Mel power spectrogram (centered STFT, Hann window, Slaney filterbank)
//! 3. Decibels relative to the clip's peak, clipped at `top_db`
//! 4. Magma color map, low frequencies at the bottom
//! 5. PNG written atomically at the configured pixel size

mod colormap;
mod mel;
mod render;

use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use mel::MelMatrix;

use mel::MelAnalyzer;

use crate::audio;
use crate::config::SpectrogramConfig;
use crate::error::{Error, Result};

/// Outcome of a successful render.
#[derive(Debug, Clone)]
pub struct RenderedSpectrogram {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// STFT frames in the underlying matrix
    pub n_frames: usize,
    pub duration_secs: f64,
}

/// Renders audio into normalized spectrogram images.
///
/// Cheap to clone; the FFT plan and filterbank are shared.
#[derive(Clone)]
pub struct SpectrogramRenderer {
    config: SpectrogramConfig,
    analyzer: Arc<MelAnalyzer>,
}

impl SpectrogramRenderer {
    pub fn new(config: SpectrogramConfig) -> Self {
        let analyzer = MelAnalyzer::new(
            config.sample_rate,
            config.n_fft,
            config.hop_length,
            config.n_mels,
        );
        Self {
            config,
            analyzer: Arc::new(analyzer),
        }
    }

    pub fn config(&self) -> &SpectrogramConfig {
        &self.config
    }

    /// Decibel spectrogram of raw samples.
    ///
    /// Samples at a rate other than the analysis rate are resampled first.
    pub fn compute(&self, samples: &[f32], sample_rate: u32) -> Result<MelMatrix> {
        let power = if sample_rate == self.config.sample_rate {
            self.analyzer.power(samples)?
        } else {
            let resampled = audio::resample_mono(samples, sample_rate, self.config.sample_rate)?;
            self.analyzer.power(&resampled)?
        };
        Ok(power.to_decibels(self.config.top_db))
    }

    /// Render the audio file at `audio_path` to a PNG at `dest`.
    ///
    /// Never touches `audio_path` beyond reading it. Nothing is written if
    /// decoding fails.
    pub fn render(&self, audio_path: &Path, dest: &Path) -> Result<RenderedSpectrogram> {
        let decoded = audio::load_mono(audio_path, self.config.sample_rate)?;
        let rendered = self.render_samples(&decoded.samples, decoded.sample_rate, dest)?;

        tracing::debug!(
            audio = %audio_path.display(),
            image = %dest.display(),
            frames = rendered.n_frames,
            "Rendered spectrogram"
        );
        Ok(rendered)
    }

    /// [`render`](Self::render) on Tokio's blocking pool.
    pub async fn render_async(&self, audio_path: &Path, dest: &Path) -> Result<RenderedSpectrogram> {
        let renderer = self.clone();
        let audio = audio_path.to_path_buf();
        let target = dest.to_path_buf();

        tokio::task::spawn_blocking(move || renderer.render(&audio, &target))
            .await
            .map_err(|e| Error::media(dest, format!("render task failed: {}", e)))?
    }

    /// Render already-decoded samples to a PNG at `dest`.
    pub fn render_samples(
        &self,
        samples: &[f32],
        sample_rate: u32,
        dest: &Path,
    ) -> Result<RenderedSpectrogram> {
        let db = self.compute(samples, sample_rate)?;
        let (width, height) = self.config.pixel_size();

        let image = render::paint(&db, width, height);
        render::save_png(&image, dest)?;

        Ok(RenderedSpectrogram {
            path: dest.to_path_buf(),
            width,
            height,
            n_frames: db.n_frames,
            duration_secs: if sample_rate == 0 {
                0.0
            } else {
                samples.len() as f64 / sample_rate as f64
            },
        })
    }
}
