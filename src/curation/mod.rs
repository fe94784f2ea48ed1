//! Dataset curation: working list → spectrogram tree → train/val split.
//!
//! Entries are processed strictly in list order. Per entry:
//!
//! 1. Skip if `staging/<genre>/<title>.png` existed when the run started
//! 2. Resolve the title and download its audio into the scratch directory
//! 3. Render the spectrogram next to it, then delete the audio
//! 4. Move the image into its genre directory, unless one is already there
//!
//! Resolution and media failures abort the run, naming the title.
//! Filesystem failures while organizing are logged and the run moves on.

mod scratch;

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{error, info};

use crate::catalogue::WorkingSongList;
use crate::dataset::{self, SplitRatio, SplitSummary};
use crate::error::{IoPathExt, Result};
use crate::model::SongEntry;
use crate::resolver::AudioResolver;
use crate::spectrogram::SpectrogramRenderer;

pub use scratch::ScratchFile;

/// What a curation run did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CurationSummary {
    /// New images placed in the staging tree
    pub rendered: usize,
    /// Fresh renders discarded because the image already existed
    pub duplicates: usize,
    /// Entries skipped without resolving, completed by an earlier run
    pub skipped: usize,
    /// Entries lost to filesystem errors
    pub failed: usize,
    pub split: SplitSummary,
}

enum Placement {
    Moved,
    Duplicate,
}

/// Drives the curation pipeline.
pub struct Curator {
    resolver: Arc<dyn AudioResolver>,
    renderer: SpectrogramRenderer,
    scratch_root: PathBuf,
}

impl Curator {
    pub fn new(
        resolver: Arc<dyn AudioResolver>,
        renderer: SpectrogramRenderer,
        scratch_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            resolver,
            renderer,
            scratch_root: scratch_root.into(),
        }
    }

    /// Render every entry of `list` into `staging`, then split `staging`
    /// into `dataset`.
    pub async fn curate(
        &self,
        list: &WorkingSongList,
        staging: &Path,
        dataset: &Path,
        ratio: SplitRatio,
        seed: u64,
    ) -> Result<CurationSummary> {
        std::fs::create_dir_all(staging).at_path(staging)?;
        std::fs::create_dir_all(&self.scratch_root).at_path(&self.scratch_root)?;

        let completed = existing_images(staging)?;
        let mut summary = CurationSummary::default();
        let total = list.len();

        info!(
            entries = total,
            already_present = completed.len(),
            staging = %staging.display(),
            "Starting curation"
        );

        for (index, entry) in list.iter().enumerate() {
            let key = (entry.genre.clone(), entry.image_file_name());
            if completed.contains(&key) {
                tracing::debug!(title = %entry.title, genre = %entry.genre, "Already rendered, skipping");
                summary.skipped += 1;
                continue;
            }

            info!("[{}/{}] {} ({})", index + 1, total, entry.title, entry.genre);

            match self.process(entry, staging).await {
                Ok(Placement::Moved) => summary.rendered += 1,
                Ok(Placement::Duplicate) => {
                    info!(title = %entry.title, genre = %entry.genre, "Duplicate image discarded");
                    summary.duplicates += 1;
                }
                Err(e) if e.is_filesystem() => {
                    error!(title = %entry.title, genre = %entry.genre, "Skipping entry: {}", e);
                    summary.failed += 1;
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "while curating '{}' ({})",
                        entry.title, entry.genre
                    )));
                }
            }
        }

        info!(
            rendered = summary.rendered,
            duplicates = summary.duplicates,
            skipped = summary.skipped,
            failed = summary.failed,
            "Rendering complete, splitting dataset"
        );

        summary.split = dataset::split_dataset(staging, dataset, ratio, seed)?;
        Ok(summary)
    }

    async fn process(&self, entry: &SongEntry, staging: &Path) -> Result<Placement> {
        let source = self.resolver.search(&entry.title).await?;
        tracing::debug!(title = %entry.title, resolved = %source.title, "Resolved");

        let audio = ScratchFile::new(self.scratch_root.join(format!("{}.wav", entry.title)));
        let image = ScratchFile::new(self.scratch_root.join(entry.image_file_name()));

        self.resolver
            .acquire_audio(&source.url, audio.path())
            .await?;
        self.renderer
            .render_async(audio.path(), image.path())
            .await?;
        drop(audio);

        let genre_dir = staging.join(&entry.genre);
        std::fs::create_dir_all(&genre_dir).at_path(&genre_dir)?;

        let dest = genre_dir.join(entry.image_file_name());
        if dest.exists() {
            // The guard deletes the fresh render.
            return Ok(Placement::Duplicate);
        }

        move_file(image.path(), &dest)?;
        Ok(Placement::Moved)
    }
}

/// `(genre, file name)` of every image already in the staging tree.
fn existing_images(staging: &Path) -> Result<HashSet<(String, String)>> {
    let mut images = HashSet::new();
    for genre in dataset::scan_tree(staging)? {
        for file in &genre.files {
            if let Some(name) = file.file_name() {
                images.insert((genre.genre.clone(), name.to_string_lossy().into_owned()));
            }
        }
    }
    Ok(images)
}

/// Rename, falling back to copy + delete across devices.
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_err() {
        std::fs::copy(from, to).at_path(to)?;
        std::fs::remove_file(from).at_path(from)?;
    }
    Ok(())
}
