//! Decibel matrix to PNG.

use std::path::{Path, PathBuf};

use image::{ImageFormat, Rgb, RgbImage};

use super::colormap::magma;
use super::mel::MelMatrix;
use crate::error::{Error, IoPathExt, Result};

/// Paint a decibel matrix into an image of `width × height` pixels.
///
/// Time runs left to right, low Mel bands sit at the bottom. Cell values are
/// normalized between the matrix minimum and maximum before coloring; a
/// constant matrix paints the darkest color everywhere.
pub fn paint(db: &MelMatrix, width: u32, height: u32) -> RgbImage {
    let lo = db.min();
    let hi = db.max();
    let span = hi - lo;

    // Column and row lookups are shared by every pixel in a row/column.
    let frames: Vec<usize> = (0..width as usize)
        .map(|x| (x * db.n_frames / width as usize).min(db.n_frames.saturating_sub(1)))
        .collect();
    let bands: Vec<usize> = (0..height as usize)
        .map(|y| {
            let from_bottom = height as usize - 1 - y;
            (from_bottom * db.n_mels / height as usize).min(db.n_mels.saturating_sub(1))
        })
        .collect();

    RgbImage::from_fn(width, height, |x, y| {
        let value = db.get(bands[y as usize], frames[x as usize]);
        let t = if span > 0.0 { (value - lo) / span } else { 0.0 };
        Rgb(magma(t))
    })
}

/// Write `image` to `dest` as PNG without ever exposing a partial file.
///
/// The encoder writes to a hidden sibling, which is renamed over `dest` once
/// complete.
pub fn save_png(image: &RgbImage, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).at_path(parent)?;
    }

    let tmp = temp_sibling(dest);
    if let Err(e) = image.save_with_format(&tmp, ImageFormat::Png) {
        let _ = std::fs::remove_file(&tmp);
        return Err(Error::media(dest, format!("cannot encode PNG: {}", e)));
    }

    if let Err(e) = std::fs::rename(&tmp, dest) {
        let _ = std::fs::remove_file(&tmp);
        return Err(Error::filesystem(dest, e));
    }

    Ok(())
}

fn temp_sibling(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "spectrogram.png".to_string());
    dest.with_file_name(format!(".{}.partial", name))
}
