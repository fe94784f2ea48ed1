//! Resolver backed by the `yt-dlp` command-line tool.
//!
//! Install yt-dlp:
//! - Windows: `winget install yt-dlp`
//! - macOS: `brew install yt-dlp`
//! - Linux: `pipx install yt-dlp` or the distribution package
//!
//! Audio extraction also needs `ffmpeg` on the `PATH`.

use std::path::Path;
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;

use super::{AudioResolver, ResolutionError, ResolvedSource};

/// Shells out to yt-dlp for search and download.
#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    program: String,
}

impl YtDlpResolver {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    async fn run(&self, args: &[&str]) -> Result<Output, ResolutionError> {
        let output = Command::new(&self.program)
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    ResolutionError::ToolMissing(format!(
                        "{} not found. Install it from https://github.com/yt-dlp/yt-dlp",
                        self.program
                    ))
                } else {
                    ResolutionError::ToolFailed(format!("Failed to run {}: {}", self.program, e))
                }
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ResolutionError::ToolFailed(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }

        Ok(output)
    }
}

#[async_trait]
impl AudioResolver for YtDlpResolver {
    async fn search(&self, title: &str) -> Result<ResolvedSource, ResolutionError> {
        let query = format!("ytsearch1:{}", title);
        tracing::debug!(%title, "Searching with yt-dlp");

        let output = self
            .run(&["--dump-json", "--skip-download", "--no-playlist", &query])
            .await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_search_output(title, &stdout)
    }

    async fn acquire_audio(&self, url: &str, dest: &Path) -> Result<(), ResolutionError> {
        // yt-dlp picks the extension itself; give it the stem and the codec.
        let format = dest
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_else(|| "wav".to_string());
        let template = format!("{}.%(ext)s", dest.with_extension("").display());

        tracing::debug!(%url, dest = %dest.display(), "Downloading audio");
        self.run(&[
            "--quiet",
            "--no-playlist",
            "-x",
            "--audio-format",
            &format,
            "-o",
            &template,
            url,
        ])
        .await?;

        if !dest.is_file() {
            return Err(ResolutionError::MissingOutput(dest.to_path_buf()));
        }
        Ok(())
    }
}

/// Parse the first JSON object yt-dlp printed for a search.
fn parse_search_output(title: &str, stdout: &str) -> Result<ResolvedSource, ResolutionError> {
    let Some(line) = stdout.lines().map(str::trim).find(|l| !l.is_empty()) else {
        return Err(ResolutionError::NotFound(title.to_string()));
    };

    let parsed: YtDlpEntry = serde_json::from_str(line)
        .map_err(|e| ResolutionError::Parse(format!("yt-dlp search output: {}", e)))?;

    let url = parsed
        .webpage_url
        .or(parsed.original_url)
        .ok_or_else(|| ResolutionError::Parse("entry has no URL".to_string()))?;

    Ok(ResolvedSource {
        title: parsed.title.unwrap_or_else(|| title.to_string()),
        url,
        thumbnail_url: parsed.thumbnail,
    })
}

/// The fields of a yt-dlp info dict we use.
#[derive(serde::Deserialize)]
struct YtDlpEntry {
    title: Option<String>,
    webpage_url: Option<String>,
    original_url: Option<String>,
    thumbnail: Option<String>,
}
