//! Command-line interface for genre-lens.
//!
//! This module provides CLI commands for building the working song list,
//! curating the spectrogram dataset, splitting it, and classifying songs.

mod commands;

pub use commands::{Cli, Commands, run_command};
