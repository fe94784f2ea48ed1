//! Whole-file audio decoding using symphonia for multi-format support.
//!
//! Supported formats:
//! - MP3
//! - FLAC
//! - OGG Vorbis
//! - WAV/PCM
//! - AAC (in MP4 container)
//!
//! Every channel is averaged into one mono signal; the spectrogram only ever
//! looks at mono audio.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::AudioBufferRef;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Error, Result};

/// A fully decoded mono clip.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Mono samples in `[-1, 1]`
    pub samples: Vec<f32>,
    /// Sample rate of `samples`
    pub sample_rate: u32,
}

impl DecodedAudio {
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode an entire audio file to mono.
///
/// Fails with [`Error::Media`] if the file is missing, can't be probed,
/// or yields no samples.
pub fn decode_file(path: &Path) -> Result<DecodedAudio> {
    let file = File::open(path).map_err(|e| Error::media(path, format!("cannot open: {}", e)))?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Probe the format
    let mut hint = Hint::new();
    if let Some(ext) = path.extension() {
        hint.with_extension(&ext.to_string_lossy());
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::media(path, format!("unsupported format: {}", e)))?;

    let mut reader = probed.format;

    // Find the first audio track
    let track = reader
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::media(path, "no audio track found"))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::media(path, "unknown sample rate"))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::media(path, e.to_string()))?;

    let mut samples = Vec::new();

    loop {
        let packet = match reader.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break; // End of stream
            }
            Err(SymphoniaError::ResetRequired) => {
                decoder.reset();
                continue;
            }
            Err(e) => return Err(Error::media(path, e.to_string())),
        };

        // Skip packets from other tracks
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(e)) => {
                tracing::debug!(path = %path.display(), "Skipping bad frame: {}", e);
                continue;
            }
            Err(e) => return Err(Error::media(path, e.to_string())),
        };

        append_mono(&decoded, &mut samples);
    }

    if samples.is_empty() {
        return Err(Error::media(path, "decoded zero samples"));
    }

    tracing::debug!(
        path = %path.display(),
        sample_rate,
        frames = samples.len(),
        "Decoded audio"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Average all planes of a decoded buffer into `out`.
fn append_mono(buffer: &AudioBufferRef, out: &mut Vec<f32>) {
    match buffer {
        AudioBufferRef::F32(buf) => mix_planes(buf.planes().planes(), out, |s| s),
        AudioBufferRef::F64(buf) => mix_planes(buf.planes().planes(), out, |s| s as f32),
        AudioBufferRef::S16(buf) => {
            mix_planes(buf.planes().planes(), out, |s| s as f32 / 32768.0)
        }
        AudioBufferRef::S24(buf) => {
            mix_planes(buf.planes().planes(), out, |s| s.0 as f32 / 8388608.0)
        }
        AudioBufferRef::S32(buf) => {
            mix_planes(buf.planes().planes(), out, |s| s as f32 / 2147483648.0)
        }
        AudioBufferRef::U8(buf) => {
            mix_planes(buf.planes().planes(), out, |s| (s as f32 - 128.0) / 128.0)
        }
        _ => {
            tracing::warn!("Unsupported sample format, skipping packet");
        }
    }
}

fn mix_planes<S: Copy>(planes: &[&[S]], out: &mut Vec<f32>, to_f32: impl Fn(S) -> f32) {
    let Some(first) = planes.first() else {
        return;
    };
    let frames = first.len();
    let scale = 1.0 / planes.len() as f32;

    out.reserve(frames);
    for frame in 0..frames {
        let sum: f32 = planes.iter().map(|plane| to_f32(plane[frame])).sum();
        out.push(sum * scale);
    }
}
