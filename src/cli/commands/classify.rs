//! Inference commands: render, classify, purge-scratch.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::Runtime;

use crate::classifier::OnnxClassifier;
use crate::config::Config;
use crate::inference::InferenceService;
use crate::resolver::YtDlpResolver;
use crate::spectrogram::SpectrogramRenderer;
use crate::thumbnail::HttpThumbnailFetcher;

/// Render a single audio file
pub fn cmd_render(config: &Config, audio: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| audio.with_extension("png"));

    let renderer = SpectrogramRenderer::new(config.spectrogram.clone());
    let rendered = renderer.render(audio, &output)?;

    println!(
        "Rendered {:?} ({:.1}s, {} frames) -> {:?} [{}x{}]",
        audio,
        rendered.duration_secs,
        rendered.n_frames,
        rendered.path,
        rendered.width,
        rendered.height
    );
    Ok(())
}

fn service(config: &Config) -> anyhow::Result<InferenceService> {
    let classifier = OnnxClassifier::load(&config.classifier)?;

    Ok(InferenceService::new(
        Arc::new(YtDlpResolver::new(&config.resolver.yt_dlp_path)),
        SpectrogramRenderer::new(config.spectrogram.clone()),
        Arc::new(classifier),
        Arc::new(HttpThumbnailFetcher::new(Duration::from_secs(
            config.inference.thumbnail_timeout_secs,
        ))),
        &config.paths.scratch_root,
    )
    .fallback_thumbnail(config.inference.fallback_thumbnail.clone())
    .top_k(config.classifier.top_k)
    .keep_requests(config.inference.keep_requests))
}

/// Classify a song by title
pub fn cmd_classify(rt: &Runtime, config: &Config, title: &str) -> anyhow::Result<()> {
    let service = service(config)?;

    println!("Classifying \"{}\"...", title);
    let report = rt.block_on(service.classify(title))?;

    println!("\n{}", report.resolved_title);
    println!("{}", report);
    println!();
    let image_kind = if report.image.is_fallback() {
        "Image (fallback)"
    } else {
        "Thumbnail"
    };
    println!("{}: {:?}", image_kind, report.image.path());
    println!("Spectrogram: {:?}", report.spectrogram);
    Ok(())
}

/// Remove leftover inference request directories
pub fn cmd_purge_scratch(config: &Config) -> anyhow::Result<()> {
    let removed = crate::inference::purge_scratch(&config.paths.scratch_root)?;
    println!(
        "Removed {} request director{} from {:?}",
        removed,
        if removed == 1 { "y" } else { "ies" },
        config.paths.scratch_root
    );
    Ok(())
}
