//! Configuration system using TOML files.
//!
//! Config is stored in the OS-standard config directory:
//! - Windows: %APPDATA%\genre-lens\config.toml
//! - macOS: ~/Library/Application Support/genre-lens/config.toml
//! - Linux: ~/.config/genre-lens/config.toml
//!
//! The config file is human-readable and editable. Every section falls back
//! to its defaults, so a file only needs the keys it wants to change.
//! Command-line flags override whatever is loaded here.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalogue::GroupingPolicy;
use crate::dataset::SplitRatio;
use crate::error::{Error, Result};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// File and directory locations
    pub paths: PathsConfig,

    /// Working list construction
    pub catalogue: CatalogueConfig,

    /// Train/validation split
    pub split: SplitConfig,

    /// Spectrogram rendering parameters
    pub spectrogram: SpectrogramConfig,

    /// Audio resolver settings
    pub resolver: ResolverConfig,

    /// Classifier model settings
    pub classifier: ClassifierConfig,

    /// Inference request settings
    pub inference: InferenceConfig,
}

/// File and directory locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Raw genre-tagged catalogue (`title;genre;...`)
    pub raw_catalogue: PathBuf,

    /// Persisted working song list (`title;genre`)
    pub working_list: PathBuf,

    /// Per-genre spectrogram staging tree
    pub staging_root: PathBuf,

    /// Output root of the train/val split
    pub dataset_root: PathBuf,

    /// Temporary audio and per-request inference directories
    pub scratch_root: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            raw_catalogue: PathBuf::from("spotify_songs.csv"),
            working_list: PathBuf::from("listaCanciones.csv"),
            staging_root: PathBuf::from("espectrogramas"),
            dataset_root: PathBuf::from("dataset"),
            scratch_root: PathBuf::from("scratch"),
        }
    }
}

/// Working list construction
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogueConfig {
    /// Maximum number of songs kept per genre
    pub per_genre_cap: usize,

    /// How genre groups are detected in the raw catalogue
    pub grouping: GroupingPolicy,
}

impl Default for CatalogueConfig {
    fn default() -> Self {
        Self {
            per_genre_cap: 200,
            grouping: GroupingPolicy::Adjacent,
        }
    }
}

/// Train/validation split
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of each genre that goes to `train/` (the rest goes to `val/`)
    pub train_ratio: f64,

    /// Seed for the shuffle, fixed so splits are reproducible
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_ratio: 0.8,
            seed: 1337,
        }
    }
}

impl SplitConfig {
    pub fn ratio(&self) -> Result<SplitRatio> {
        SplitRatio::new(self.train_ratio, 1.0 - self.train_ratio)
    }
}

/// Spectrogram rendering parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectrogramConfig {
    /// Analysis sample rate; audio is resampled to this before the STFT
    pub sample_rate: u32,
    /// FFT window length in samples
    pub n_fft: usize,
    /// Hop between frames in samples
    pub hop_length: usize,
    /// Number of Mel bands
    pub n_mels: usize,
    /// Dynamic range kept below the loudest cell, in dB
    pub top_db: f32,
    /// Figure width in inches
    pub width_in: f32,
    /// Figure height in inches
    pub height_in: f32,
    /// Output resolution
    pub dpi: u32,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            n_fft: 2048,
            hop_length: 512,
            n_mels: 128,
            top_db: 80.0,
            width_in: 6.4,
            height_in: 4.8,
            dpi: 500,
        }
    }
}

impl SpectrogramConfig {
    /// Output image size in pixels.
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            (self.width_in * self.dpi as f32).round() as u32,
            (self.height_in * self.dpi as f32).round() as u32,
        )
    }
}

/// Audio resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Path or name of the yt-dlp executable
    pub yt_dlp_path: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: "yt-dlp".to_string(),
        }
    }
}

/// Classifier model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// ONNX model file
    pub model_path: PathBuf,
    /// Labels file, one label per line in class-index order
    pub labels_path: PathBuf,
    /// Square input size expected by the model
    pub input_size: u32,
    /// Name of the model's image input
    pub input_name: String,
    /// Number of predictions kept in a report
    pub top_k: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("classify_model.onnx"),
            labels_path: PathBuf::from("labels.txt"),
            input_size: 224,
            input_name: "images".to_string(),
            top_k: 5,
        }
    }
}

/// Inference request settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Image shown when the thumbnail can't be fetched
    pub fallback_thumbnail: Option<PathBuf>,
    /// Timeout for the thumbnail download
    pub thumbnail_timeout_secs: u64,
    /// Completed request directories a service keeps before deleting the oldest
    pub keep_requests: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            fallback_thumbnail: None,
            thumbnail_timeout_secs: 10,
            keep_requests: 8,
        }
    }
}

impl Config {
    /// Reject values the pipelines can't work with.
    pub fn validate(&self) -> Result<()> {
        if self.catalogue.per_genre_cap == 0 {
            return Err(Error::config("per_genre_cap must be at least 1"));
        }
        self.split.ratio()?;

        let s = &self.spectrogram;
        if s.sample_rate == 0 || s.n_fft < 2 || s.hop_length == 0 || s.n_mels == 0 {
            return Err(Error::config(
                "spectrogram sample_rate, n_fft, hop_length and n_mels must be positive",
            ));
        }
        if s.top_db <= 0.0 {
            return Err(Error::config("spectrogram top_db must be positive"));
        }
        let (w, h) = s.pixel_size();
        if w == 0 || h == 0 {
            return Err(Error::config("spectrogram image size must be positive"));
        }

        if self.classifier.input_size == 0 || self.classifier.top_k == 0 {
            return Err(Error::config("classifier input_size and top_k must be positive"));
        }
        if self.inference.keep_requests == 0 {
            return Err(Error::config("inference keep_requests must be at least 1"));
        }
        Ok(())
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("genre-lens"))
}

/// Get the full path to the config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Load configuration from the default location.
///
/// Returns default config if file doesn't exist or can't be parsed.
/// Logs warnings but doesn't fail - we always return a usable config.
pub fn load() -> Config {
    let Some(path) = config_path() else {
        tracing::warn!("Could not determine config directory, using defaults");
        return Config::default();
    };
    load_from(&path)
}

/// Load configuration from an explicit path, falling back to defaults.
pub fn load_from(path: &Path) -> Config {
    if !path.exists() {
        tracing::info!("No config file found at {:?}, using defaults", path);
        return Config::default();
    }

    match std::fs::read_to_string(path) {
        Ok(contents) => match toml::from_str(&contents) {
            Ok(config) => {
                tracing::info!("Loaded config from {:?}", path);
                config
            }
            Err(e) => {
                tracing::error!("Failed to parse config file {:?}: {}", path, e);
                tracing::warn!("Using default configuration");
                Config::default()
            }
        },
        Err(e) => {
            tracing::error!("Failed to read config file {:?}: {}", path, e);
            Config::default()
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
