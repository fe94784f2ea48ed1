//! Thumbnail download and fallback images.
//!
//! Thumbnails are decoration: every failure here degrades to a fallback and
//! is never allowed to fail an inference request.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};

use crate::error::{Error, IoPathExt, Result};

/// Placeholder size, 16:9 like most video thumbnails.
const PLACEHOLDER_SIZE: (u32, u32) = (320, 180);

/// Errors from downloading a thumbnail.
#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {0}")]
    Status(u16),
}

/// Downloads thumbnail bytes.
///
/// Implement this trait to create mock implementations for testing.
#[async_trait]
pub trait ThumbnailFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, ThumbnailError>;
}

/// HTTP(S) thumbnail client.
pub struct HttpThumbnailFetcher {
    http_client: reqwest::Client,
}

impl HttpThumbnailFetcher {
    pub fn new(timeout: Duration) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("genre-lens/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self { http_client }
    }
}

#[async_trait]
impl ThumbnailFetcher for HttpThumbnailFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<Vec<u8>, ThumbnailError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ThumbnailError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ThumbnailError::Status(status.as_u16()));
        }

        Ok(response
            .bytes()
            .await
            .map_err(|e| ThumbnailError::Network(e.to_string()))?
            .to_vec())
    }
}

/// Decode downloaded bytes and store them as PNG at `dest`.
pub fn save_as_png(bytes: &[u8], dest: &Path) -> Result<()> {
    let image = image::load_from_memory(bytes)
        .map_err(|e| Error::media(dest, format!("undecodable thumbnail: {}", e)))?;
    image
        .to_rgb8()
        .save_with_format(dest, ImageFormat::Png)
        .map_err(|e| Error::media(dest, format!("cannot write thumbnail: {}", e)))
}

/// Write a neutral placeholder image at `dest`.
pub fn write_placeholder(dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).at_path(parent)?;
    }

    let (width, height) = PLACEHOLDER_SIZE;
    // Vertical slate gradient.
    let image = RgbImage::from_fn(width, height, |_, y| {
        let shade = 40 + (y * 40 / height) as u8;
        Rgb([shade, shade, shade.saturating_add(12)])
    });
    image
        .save_with_format(dest, ImageFormat::Png)
        .map_err(|e| Error::media(dest, format!("cannot write placeholder: {}", e)))
}
