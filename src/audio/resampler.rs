//! Sample rate conversion using rubato.
//!
//! Clips are brought to the analysis rate before the STFT so that Mel bins
//! mean the same frequencies for every song, whatever rate the source used.

use rubato::{FftFixedIn, Resampler as RubatoResampler};

use crate::error::{Error, Result};

/// Input chunk size fed to rubato per call.
const CHUNK_SIZE: usize = 1024;

/// Resample a whole mono clip from `input_rate` to `output_rate`.
///
/// If the rates match, the input is returned unchanged.
pub fn resample_mono(samples: &[f32], input_rate: u32, output_rate: u32) -> Result<Vec<f32>> {
    if input_rate == output_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = FftFixedIn::<f32>::new(
        input_rate as usize,
        output_rate as usize,
        CHUNK_SIZE,
        2, // Sub-chunks
        1,
    )
    .map_err(|e| Error::media("<resampler>", e.to_string()))?;

    tracing::debug!("Resampling {}Hz → {}Hz", input_rate, output_rate);

    let ratio = output_rate as f64 / input_rate as f64;
    let expected = (samples.len() as f64 * ratio).ceil() as usize;
    let mut output = Vec::with_capacity(expected + CHUNK_SIZE);

    for chunk in samples.chunks(CHUNK_SIZE) {
        // Pad the last chunk to a full block; the excess is trimmed below.
        let block: Vec<f32> = if chunk.len() == CHUNK_SIZE {
            chunk.to_vec()
        } else {
            let mut padded = chunk.to_vec();
            padded.resize(CHUNK_SIZE, 0.0);
            padded
        };

        let input = vec![block];
        let resampled = resampler
            .process(&input, None)
            .map_err(|e| Error::media("<resampler>", e.to_string()))?;
        if let Some(channel) = resampled.first() {
            output.extend_from_slice(channel);
        }
    }

    // Push the filter delay out with one block of silence.
    let silence = vec![vec![0.0f32; CHUNK_SIZE]];
    let tail = resampler
        .process(&silence, None)
        .map_err(|e| Error::media("<resampler>", e.to_string()))?;
    if let Some(channel) = tail.first() {
        output.extend_from_slice(channel);
    }

    // Drop the leading delay so the clip stays aligned, then trim to length.
    let delay = resampler.output_delay().min(output.len());
    output.drain(..delay);
    output.truncate(expected);

    Ok(output)
}
