//! Title to playable source resolution.
//!
//! The pipelines only see the [`AudioResolver`] trait. Production uses
//! [`YtDlpResolver`]; tests substitute a deterministic fake.

mod ytdlp;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

pub use ytdlp::YtDlpResolver;

/// A search hit for a free-text title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSource {
    /// Canonical display title reported by the source
    pub title: String,
    /// Playable source identifier (a page URL for yt-dlp)
    pub url: String,
    /// Thumbnail reference, if the source has one
    pub thumbnail_url: Option<String>,
}

/// Errors from resolving a title or acquiring its audio.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ResolutionError {
    #[error("No source found for '{0}'")]
    NotFound(String),

    #[error("Resolver tool not available: {0}")]
    ToolMissing(String),

    #[error("Resolver tool failed: {0}")]
    ToolFailed(String),

    #[error("Failed to parse resolver output: {0}")]
    Parse(String),

    #[error("Acquisition produced no file at {0}")]
    MissingOutput(PathBuf),
}

/// Resolves titles and downloads audio.
///
/// Implement this trait to create mock implementations for testing.
#[async_trait]
pub trait AudioResolver: Send + Sync {
    /// Find the best match for `title`.
    async fn search(&self, title: &str) -> Result<ResolvedSource, ResolutionError>;

    /// Write a complete, decodable audio file for `url` at `dest`.
    async fn acquire_audio(&self, url: &str, dest: &Path) -> Result<(), ResolutionError>;
}
