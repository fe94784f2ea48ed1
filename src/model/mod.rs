//! Core data models shared by the curation and inference pipelines.
//!
//! Defines [`SongEntry`] (one row of the working song list), [`Prediction`]
//! (one classifier output) and [`ClassificationReport`] (what an inference
//! request hands back to its caller).

use std::fmt;
use std::path::PathBuf;

/// One song of the working list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SongEntry {
    /// Catalogue title with path separators removed
    pub title: String,
    /// Genre label, also the name of the genre directory
    pub genre: String,
}

impl SongEntry {
    /// Create an entry, normalizing the title and trimming the genre.
    pub fn new(title: &str, genre: &str) -> Self {
        Self {
            title: normalize_title(title),
            genre: genre.trim().to_string(),
        }
    }

    /// File name of this entry's spectrogram inside its genre directory.
    pub fn image_file_name(&self) -> String {
        format!("{}.png", self.title)
    }
}

/// Strip path separators so a title is safe to use as a single path segment.
///
/// Line breaks become spaces so the title fits on one working list line.
pub fn normalize_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !matches!(c, '/' | '\\'))
        .map(|c| if matches!(c, '\r' | '\n') { ' ' } else { c })
        .collect()
}

/// A single class prediction.
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// Class label (genre)
    pub label: String,
    /// Confidence in `[0, 1]`
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Confidence as a percentage rounded to two decimals.
    pub fn percent(&self) -> f64 {
        (self.confidence as f64 * 10_000.0).round() / 100.0
    }
}

/// Where the display image of a report came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayImage {
    /// Thumbnail downloaded for the resolved song
    Thumbnail(PathBuf),
    /// Fallback placeholder used because the thumbnail was unavailable
    Fallback(PathBuf),
}

impl DisplayImage {
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Thumbnail(p) | Self::Fallback(p) => p,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// Result of classifying one song.
#[derive(Debug, Clone)]
pub struct ClassificationReport {
    /// Title as typed by the requester
    pub song_title: String,
    /// Title reported by the resolver
    pub resolved_title: String,
    /// Up to five predictions, highest confidence first
    pub top: Vec<Prediction>,
    /// Thumbnail or fallback image for display
    pub image: DisplayImage,
    /// Rendered spectrogram that was classified
    pub spectrogram: PathBuf,
}

impl ClassificationReport {
    /// `(label, percent)` pairs with percent rounded to two decimals.
    pub fn formatted_top(&self) -> Vec<(String, f64)> {
        self.top
            .iter()
            .map(|p| (p.label.clone(), p.percent()))
            .collect()
    }
}

impl fmt::Display for ClassificationReport {
    /// One line, e.g. `pop 91.20%    rock 5.03%`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .formatted_top()
            .into_iter()
            .map(|(label, percent)| format!("{} {:.2}%", label, percent))
            .collect();
        write!(f, "{}", parts.join("    "))
    }
}
