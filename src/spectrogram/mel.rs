//! Mel power spectrogram and decibel conversion.
//!
//! Frames are centred (the signal is zero-padded by `n_fft / 2` on both
//! sides), windowed with a periodic Hann window and transformed with a real
//! FFT. Power spectra are projected onto a Slaney-style Mel filterbank with
//! area-normalized triangular filters spanning `0..sr/2`.

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Smallest power considered when taking logarithms.
const AMIN: f32 = 1e-10;

/// A Mel-by-time matrix, stored band-major.
#[derive(Debug, Clone, PartialEq)]
pub struct MelMatrix {
    pub n_mels: usize,
    pub n_frames: usize,
    /// `values[mel * n_frames + frame]`
    pub values: Vec<f32>,
}

impl MelMatrix {
    pub fn get(&self, mel: usize, frame: usize) -> f32 {
        self.values[mel * self.n_frames + frame]
    }

    pub fn max(&self) -> f32 {
        self.values.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    pub fn min(&self) -> f32 {
        self.values.iter().copied().fold(f32::INFINITY, f32::min)
    }

    /// Convert power to decibels relative to the loudest cell.
    ///
    /// The result peaks at 0 dB and is clipped at `-top_db`.
    pub fn to_decibels(&self, top_db: f32) -> MelMatrix {
        let reference = self.max().max(AMIN);
        let ref_db = 10.0 * reference.log10();

        let mut values: Vec<f32> = self
            .values
            .iter()
            .map(|&p| 10.0 * p.max(AMIN).log10() - ref_db)
            .collect();

        let floor = values.iter().copied().fold(f32::NEG_INFINITY, f32::max) - top_db;
        for v in &mut values {
            *v = v.max(floor);
        }

        MelMatrix {
            n_mels: self.n_mels,
            n_frames: self.n_frames,
            values,
        }
    }
}

/// STFT + Mel filterbank for one fixed parameter set.
pub struct MelAnalyzer {
    fft: Arc<dyn RealToComplex<f32>>,
    n_fft: usize,
    hop_length: usize,
    window: Vec<f32>,
    /// `n_mels` filters of `n_fft / 2 + 1` weights each
    filterbank: Vec<Vec<f32>>,
}

impl MelAnalyzer {
    pub fn new(sample_rate: u32, n_fft: usize, hop_length: usize, n_mels: usize) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(n_fft);

        Self {
            fft,
            n_fft,
            hop_length,
            window: hann_window(n_fft),
            filterbank: mel_filterbank(sample_rate as f64, n_fft, n_mels),
        }
    }

    pub fn n_mels(&self) -> usize {
        self.filterbank.len()
    }

    /// Number of frames produced for `len` samples.
    pub fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop_length
    }

    /// Mel power spectrogram of a mono signal.
    pub fn power(&self, samples: &[f32]) -> Result<MelMatrix> {
        let n_bins = self.n_fft / 2 + 1;
        let n_mels = self.n_mels();
        let n_frames = self.frame_count(samples.len());
        let pad = self.n_fft / 2;

        let mut input = self.fft.make_input_vec();
        let mut spectrum: Vec<Complex<f32>> = self.fft.make_output_vec();
        let mut scratch = self.fft.make_scratch_vec();
        let mut power = vec![0.0f32; n_bins];
        let mut values = vec![0.0f32; n_mels * n_frames];

        for frame in 0..n_frames {
            // Frame start in the zero-padded signal, mapped back to `samples`.
            let start = (frame * self.hop_length) as isize - pad as isize;
            for (i, slot) in input.iter_mut().enumerate() {
                let idx = start + i as isize;
                let sample = if idx >= 0 && (idx as usize) < samples.len() {
                    samples[idx as usize]
                } else {
                    0.0
                };
                *slot = sample * self.window[i];
            }

            self.fft
                .process_with_scratch(&mut input, &mut spectrum, &mut scratch)
                .map_err(|e| Error::media("<stft>", e.to_string()))?;

            for (p, c) in power.iter_mut().zip(&spectrum) {
                *p = c.norm_sqr();
            }

            for (mel, filter) in self.filterbank.iter().enumerate() {
                let energy: f32 = filter.iter().zip(&power).map(|(w, p)| w * p).sum();
                values[mel * n_frames + frame] = energy;
            }
        }

        Ok(MelMatrix {
            n_mels,
            n_frames,
            values,
        })
    }
}

/// Periodic Hann window (the DFT-even variant).
fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * i as f64 / size as f64;
            (0.5 - 0.5 * phase.cos()) as f32
        })
        .collect()
}

/// Slaney Mel scale: linear below 1 kHz, logarithmic above.
pub fn hz_to_mel(hz: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f64.ln() / 27.0;

    if hz >= MIN_LOG_HZ {
        min_log_mel + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

pub fn mel_to_hz(mel: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    let min_log_mel = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f64.ln() / 27.0;

    if mel >= min_log_mel {
        MIN_LOG_HZ * (logstep * (mel - min_log_mel)).exp()
    } else {
        F_SP * mel
    }
}

/// Triangular Mel filters with Slaney area normalization.
fn mel_filterbank(sample_rate: f64, n_fft: usize, n_mels: usize) -> Vec<Vec<f32>> {
    let n_bins = n_fft / 2 + 1;
    let nyquist = sample_rate / 2.0;

    let fft_freqs: Vec<f64> = (0..n_bins)
        .map(|i| i as f64 * sample_rate / n_fft as f64)
        .collect();

    let mel_max = hz_to_mel(nyquist);
    let n_points = n_mels + 2;
    let mel_points: Vec<f64> = (0..n_points)
        .map(|i| mel_to_hz(mel_max * i as f64 / (n_points - 1) as f64))
        .collect();

    (0..n_mels)
        .map(|band| {
            let left = mel_points[band];
            let center = mel_points[band + 1];
            let right = mel_points[band + 2];
            let enorm = 2.0 / (right - left);

            fft_freqs
                .iter()
                .map(|&f| {
                    let lower = (f - left) / (center - left);
                    let upper = (right - f) / (right - center);
                    (lower.min(upper).max(0.0) * enorm) as f32
                })
                .collect()
        })
        .collect()
}
