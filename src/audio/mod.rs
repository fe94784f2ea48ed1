//! Audio loading for analysis.
//!
//! [`load_mono`] is the single entry point the spectrogram renderer uses:
//! decode the whole file, downmix to mono, resample to the analysis rate.

mod decoder;
mod resampler;

use std::path::Path;

pub use decoder::{DecodedAudio, decode_file};
pub use resampler::resample_mono;

use crate::error::Result;

/// Decode `path` and resample it to `sample_rate`.
pub fn load_mono(path: &Path, sample_rate: u32) -> Result<DecodedAudio> {
    let decoded = decode_file(path)?;
    if decoded.sample_rate == sample_rate {
        return Ok(decoded);
    }

    let samples = resample_mono(&decoded.samples, decoded.sample_rate, sample_rate)?;
    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}
