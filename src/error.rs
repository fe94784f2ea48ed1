//! Application-wide error types.
//!
//! This module provides a unified error hierarchy for the application.
//! Library modules use specific error types via `thiserror`, while
//! CLI/main uses `anyhow` for convenient error propagation.
//!
//! # Design
//!
//! - [`Error`]: Top-level application error enum
//! - Module-specific errors (e.g., [`ResolutionError`]) for detailed handling
//! - All errors implement `std::error::Error` for compatibility
//!
//! # Example
//!
//! ```ignore
//! use genre_lens::error::{Error, Result};
//!
//! fn process_entry(entry: &SongEntry) -> Result<()> {
//!     let source = resolver.search(&entry.title).await?; // Resolution errors auto-convert
//!     std::fs::create_dir_all(&dir)?;                     // IO errors auto-convert
//!     Ok(())
//! }
//! ```
//!
//! [`ResolutionError`]: crate::resolver::ResolutionError

use std::path::PathBuf;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
///
/// Aggregates errors from all subsystems for unified handling.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// File I/O error without a known path
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Raw catalogue or working list missing/malformed
    #[error("Catalogue error in {path}: {message}")]
    Catalogue { path: PathBuf, message: String },

    /// Title could not be resolved or its audio could not be acquired
    #[error("Resolution error: {0}")]
    Resolution(#[from] crate::resolver::ResolutionError),

    /// Audio unreadable, unsupported or empty; image encode/decode failure
    #[error("Media error for {path}: {message}")]
    Media { path: PathBuf, message: String },

    /// Directory creation, move, copy or delete failure
    #[error("Filesystem error at {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Model loading or inference failure
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create a catalogue error.
    pub fn catalogue(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Catalogue {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a media error.
    pub fn media(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Media {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a filesystem error.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Create a classifier error.
    pub fn classifier(message: impl Into<String>) -> Self {
        Self::Classifier(message.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error, with all context layers removed.
    pub fn root(&self) -> &Error {
        match self {
            Self::WithContext { source, .. } => source.root(),
            other => other,
        }
    }

    /// Whether this is a filesystem failure that should only skip the current entry.
    pub fn is_filesystem(&self) -> bool {
        matches!(self.root(), Self::Filesystem { .. } | Self::Io(_))
    }

    /// Whether the resolver reported that nothing matched the title.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self.root(),
            Self::Resolution(crate::resolver::ResolutionError::NotFound(_))
        )
    }
}

/// Attach a path to an I/O result, turning it into [`Error::Filesystem`].
pub trait IoPathExt<T> {
    fn at_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoPathExt<T> for std::result::Result<T, std::io::Error> {
    fn at_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| Error::filesystem(path, e))
    }
}
