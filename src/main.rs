//! Genre Lens - music genre classification from spectrogram images.
//!
//! This application builds a genre-balanced dataset of Mel-spectrogram images
//! from a song catalogue, and classifies single songs by title with a
//! pretrained image classifier. Everything runs from CLI subcommands.

pub mod audio;
pub mod catalogue;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod curation;
pub mod dataset;
pub mod error;
pub mod inference;
pub mod model;
pub mod resolver;
pub mod spectrogram;
#[cfg(test)]
pub mod test_utils;
pub mod thumbnail;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    // Initialize logging
    let mut filter = EnvFilter::from_default_env();
    if let Ok(directive) = "genre_lens=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(filter)
        .init();

    cli::run_command(&args)
}
