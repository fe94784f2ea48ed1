//! CLI command definitions and dispatch.
//!
//! Each group of subcommands is implemented in its own submodule:
//! - `curate`: working list, curation pipeline and dataset split
//! - `classify`: single-file rendering, inference and scratch cleanup

mod classify;
mod curate;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tokio::runtime::Runtime;

use crate::catalogue::GroupingPolicy;
use crate::config::{self, Config};

pub use classify::{cmd_classify, cmd_purge_scratch, cmd_render};
pub use curate::{cmd_catalogue, cmd_curate, cmd_split};

/// Genre Lens CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the OS config directory)
    #[arg(long, global = true, env = "GENRE_LENS_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Build (or reload) the working song list and show per-genre counts
    Catalogue {
        /// Raw genre-tagged catalogue
        #[arg(long)]
        raw: Option<PathBuf>,
        /// Working list to create or reuse
        #[arg(long)]
        list: Option<PathBuf>,
        #[command(flatten)]
        selection: SelectionArgs,
    },
    /// Run the full curation pipeline: list, spectrograms, split
    Curate {
        #[command(flatten)]
        selection: SelectionArgs,
        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Split an existing spectrogram tree into train/val
    Split {
        #[command(flatten)]
        layout: LayoutArgs,
    },
    /// Render one audio file to a spectrogram image
    Render {
        /// Audio file to render
        audio: PathBuf,
        /// Output PNG (defaults to the audio path with a .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Classify a song by title and print its top genres
    Classify {
        /// Song title to search for
        title: String,
        /// ONNX model file
        #[arg(long)]
        model: Option<PathBuf>,
        /// Labels file, one class per line
        #[arg(long)]
        labels: Option<PathBuf>,
    },
    /// Remove request directories left in the scratch directory
    PurgeScratch,
}

/// Options controlling working list selection.
#[derive(clap::Args)]
pub struct SelectionArgs {
    /// Maximum songs per genre
    #[arg(long)]
    cap: Option<usize>,
    /// Count each genre across the whole catalogue instead of per run
    #[arg(long)]
    grouped: bool,
}

/// Options locating the staging tree and split output.
#[derive(clap::Args)]
pub struct LayoutArgs {
    /// Spectrogram staging tree (`<genre>/<title>.png`)
    #[arg(long)]
    staging: Option<PathBuf>,
    /// Output root for `train/` and `val/`
    #[arg(long)]
    dataset: Option<PathBuf>,
    /// Fraction of each genre used for training
    #[arg(long)]
    train: Option<f64>,
    /// Shuffle seed
    #[arg(long)]
    seed: Option<u64>,
}

impl SelectionArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(cap) = self.cap {
            config.catalogue.per_genre_cap = cap;
        }
        if self.grouped {
            config.catalogue.grouping = GroupingPolicy::Grouped;
        }
    }
}

impl LayoutArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(staging) = &self.staging {
            config.paths.staging_root = staging.clone();
        }
        if let Some(dataset) = &self.dataset {
            config.paths.dataset_root = dataset.clone();
        }
        if let Some(train) = self.train {
            config.split.train_ratio = train;
        }
        if let Some(seed) = self.seed {
            config.split.seed = seed;
        }
    }
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    let mut config = match &cli.config {
        Some(path) => config::load_from(path),
        None => config::load(),
    };

    match &cli.command {
        Commands::Catalogue {
            raw,
            list,
            selection,
        } => {
            selection.apply(&mut config);
            if let Some(raw) = raw {
                config.paths.raw_catalogue = raw.clone();
            }
            if let Some(list) = list {
                config.paths.working_list = list.clone();
            }
            config.validate()?;
            cmd_catalogue(&config)
        }
        Commands::Curate { selection, layout } => {
            selection.apply(&mut config);
            layout.apply(&mut config);
            config.validate()?;
            let rt = Runtime::new()?;
            cmd_curate(&rt, &config)
        }
        Commands::Split { layout } => {
            layout.apply(&mut config);
            config.validate()?;
            cmd_split(&config)
        }
        Commands::Render { audio, output } => {
            config.validate()?;
            cmd_render(&config, audio, output.as_deref())
        }
        Commands::Classify {
            title,
            model,
            labels,
        } => {
            if let Some(model) = model {
                config.classifier.model_path = model.clone();
            }
            if let Some(labels) = labels {
                config.classifier.labels_path = labels.clone();
            }
            config.validate()?;
            let rt = Runtime::new()?;
            cmd_classify(&rt, &config, title)
        }
        Commands::PurgeScratch => cmd_purge_scratch(&config),
    }
}
