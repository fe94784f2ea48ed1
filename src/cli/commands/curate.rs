//! Curation commands: working list, full pipeline, split.

use std::sync::Arc;

use tokio::runtime::Runtime;

use crate::catalogue::{CatalogueBuilder, WorkingSongList};
use crate::config::Config;
use crate::curation::Curator;
use crate::dataset::{self, SplitSummary};
use crate::resolver::YtDlpResolver;
use crate::spectrogram::SpectrogramRenderer;

fn build_list(config: &Config) -> anyhow::Result<WorkingSongList> {
    let list = CatalogueBuilder::new(&config.paths.raw_catalogue, &config.paths.working_list)
        .cap(config.catalogue.per_genre_cap)
        .policy(config.catalogue.grouping)
        .build()?;
    Ok(list)
}

/// Build or reload the working list and print per-genre counts
pub fn cmd_catalogue(config: &Config) -> anyhow::Result<()> {
    let list = build_list(config)?;

    println!("Working list: {:?}", config.paths.working_list);
    println!("{} songs", list.len());
    for (genre, count) in list.genre_counts() {
        println!("  {:<20} {}", genre, count);
    }
    Ok(())
}

/// Run the full curation pipeline
pub fn cmd_curate(rt: &Runtime, config: &Config) -> anyhow::Result<()> {
    let list = build_list(config)?;
    let ratio = config.split.ratio()?;

    println!(
        "Curating {} songs into {:?}",
        list.len(),
        config.paths.staging_root
    );

    let curator = Curator::new(
        Arc::new(YtDlpResolver::new(&config.resolver.yt_dlp_path)),
        SpectrogramRenderer::new(config.spectrogram.clone()),
        &config.paths.scratch_root,
    );

    let summary = rt.block_on(curator.curate(
        &list,
        &config.paths.staging_root,
        &config.paths.dataset_root,
        ratio,
        config.split.seed,
    ))?;

    println!("\n=== Curation Summary ===");
    println!("Rendered:          {}", summary.rendered);
    println!("Already present:   {}", summary.skipped);
    println!("Duplicates:        {}", summary.duplicates);
    println!("Filesystem errors: {}", summary.failed);
    print_split(&summary.split);
    Ok(())
}

/// Split an existing staging tree
pub fn cmd_split(config: &Config) -> anyhow::Result<()> {
    let summary = dataset::split_dataset(
        &config.paths.staging_root,
        &config.paths.dataset_root,
        config.split.ratio()?,
        config.split.seed,
    )?;

    println!(
        "Split {:?} into {:?} (seed {})",
        config.paths.staging_root, config.paths.dataset_root, config.split.seed
    );
    print_split(&summary);
    Ok(())
}

fn print_split(summary: &SplitSummary) {
    println!("\n{:<20} {:>6} {:>6}", "genre", "train", "val");
    for (genre, (train, val)) in &summary.per_genre {
        println!("{:<20} {:>6} {:>6}", genre, train, val);
    }
    println!(
        "{:<20} {:>6} {:>6}",
        "total",
        summary.train_total(),
        summary.val_total()
    );
}
