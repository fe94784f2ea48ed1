//! Working song list construction.
//!
//! The raw catalogue is a semicolon-delimited file (`title;genre;...`, no
//! header) that is expected to be grouped by genre. The builder streams it
//! once, keeps at most `cap` songs per genre and appends every kept record to
//! the working list file as soon as it is selected. Once that file exists it
//! is the source of truth: later runs load it verbatim, even if the raw
//! catalogue has changed since.
//!
//! # Grouping
//!
//! [`GroupingPolicy::Adjacent`] counts songs per run of identical genres, so a
//! genre that reappears later in the file starts a fresh count.
//! [`GroupingPolicy::Grouped`] counts per distinct genre across the whole
//! file, which is what you want when the catalogue is not sorted.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use csv::StringRecord;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, IoPathExt, Result};
use crate::model::SongEntry;

/// How genre groups are recognised while applying the per-genre cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupingPolicy {
    /// A group is a run of consecutive records with the same genre
    #[default]
    Adjacent,
    /// A group is every record with the same genre, wherever it appears
    Grouped,
}

/// Ordered list of songs selected for curation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSongList {
    entries: Vec<SongEntry>,
}

impl WorkingSongList {
    pub fn new(entries: Vec<SongEntry>) -> Self {
        Self { entries }
    }

    /// Load a persisted working list (`title;genre` per line).
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).at_path(path)?;
        let mut entries = Vec::new();

        for (idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.at_path(path)?;
            let line = line.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            // Titles may contain ';' but genres never do.
            let (title, genre) = line.rsplit_once(';').ok_or_else(|| {
                Error::catalogue(path, format!("line {}: expected 'title;genre'", idx + 1))
            })?;
            entries.push(checked_entry(title, genre, idx as u64 + 1, path)?);
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[SongEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SongEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries per genre, sorted by genre name.
    pub fn genre_counts(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for entry in &self.entries {
            *counts.entry(entry.genre.clone()).or_insert(0) += 1;
        }
        counts
    }
}

impl<'a> IntoIterator for &'a WorkingSongList {
    type Item = &'a SongEntry;
    type IntoIter = std::slice::Iter<'a, SongEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Builds (or reloads) the working song list.
#[derive(Debug, Clone)]
pub struct CatalogueBuilder {
    raw_catalogue: PathBuf,
    working_list: PathBuf,
    cap: usize,
    policy: GroupingPolicy,
}

impl CatalogueBuilder {
    pub fn new(raw_catalogue: impl Into<PathBuf>, working_list: impl Into<PathBuf>) -> Self {
        Self {
            raw_catalogue: raw_catalogue.into(),
            working_list: working_list.into(),
            cap: 200,
            policy: GroupingPolicy::Adjacent,
        }
    }

    /// Maximum songs per genre group.
    pub fn cap(mut self, cap: usize) -> Self {
        self.cap = cap;
        self
    }

    pub fn policy(mut self, policy: GroupingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Return the persisted working list, deriving it from the raw catalogue first if needed.
    pub fn build(&self) -> Result<WorkingSongList> {
        if self.working_list.exists() {
            info!(path = %self.working_list.display(), "Loading existing working list");
            return WorkingSongList::load(&self.working_list);
        }
        self.derive()
    }

    fn derive(&self) -> Result<WorkingSongList> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .from_path(&self.raw_catalogue)
            .map_err(|e| {
                Error::catalogue(&self.raw_catalogue, format!("cannot open raw catalogue: {}", e))
            })?;

        if let Some(parent) = self.working_list.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).at_path(parent)?;
        }
        let mut out = File::create(&self.working_list).at_path(&self.working_list)?;

        info!(
            raw = %self.raw_catalogue.display(),
            cap = self.cap,
            policy = ?self.policy,
            "Building working list"
        );

        let mut selector = CapSelector::new(self.cap, self.policy);
        let mut entries = Vec::new();
        let mut record = StringRecord::new();

        while reader
            .read_record(&mut record)
            .map_err(|e| csv_error(&self.raw_catalogue, &e))?
        {
            let Some(entry) = parse_raw_record(&record, &self.raw_catalogue)? else {
                continue;
            };

            if !selector.admit(&entry.genre) {
                continue;
            }

            // One write per record so an interrupted build leaves whole lines only.
            let line = format!("{};{}\n", entry.title, entry.genre);
            out.write_all(line.as_bytes()).at_path(&self.working_list)?;
            entries.push(entry);
        }
        out.flush().at_path(&self.working_list)?;

        debug!(entries = entries.len(), "Working list written");
        Ok(WorkingSongList { entries })
    }
}

/// Applies the per-genre cap to a stream of genres.
#[derive(Debug)]
struct CapSelector {
    cap: usize,
    policy: GroupingPolicy,
    last_genre: Option<String>,
    run_count: usize,
    totals: HashMap<String, usize>,
}

impl CapSelector {
    fn new(cap: usize, policy: GroupingPolicy) -> Self {
        Self {
            cap,
            policy,
            last_genre: None,
            run_count: 0,
            totals: HashMap::new(),
        }
    }

    /// Whether the next record with `genre` should be kept.
    ///
    /// The first record of a group is always kept.
    fn admit(&mut self, genre: &str) -> bool {
        match self.policy {
            GroupingPolicy::Adjacent => {
                if self.last_genre.as_deref() != Some(genre) {
                    self.last_genre = Some(genre.to_string());
                    self.run_count = 1;
                    true
                } else if self.run_count < self.cap {
                    self.run_count += 1;
                    true
                } else {
                    false
                }
            }
            GroupingPolicy::Grouped => {
                let count = self.totals.entry(genre.to_string()).or_insert(0);
                if *count == 0 || *count < self.cap {
                    *count += 1;
                    true
                } else {
                    false
                }
            }
        }
    }
}

/// Turn one raw catalogue record into an entry. Blank records yield `None`.
fn parse_raw_record(record: &StringRecord, path: &Path) -> Result<Option<SongEntry>> {
    let line = record.position().map_or(0, |p| p.line());
    if record.iter().all(|field| field.trim().is_empty()) {
        return Ok(None);
    }

    let (Some(title), Some(genre)) = (record.get(0), record.get(1)) else {
        return Err(Error::catalogue(
            path,
            format!("line {}: expected at least 'title;genre'", line),
        ));
    };

    checked_entry(title.trim_start_matches('\u{feff}'), genre, line, path).map(Some)
}

/// Build an entry whose title and genre are both usable as single path segments.
fn checked_entry(title: &str, genre: &str, line: u64, path: &Path) -> Result<SongEntry> {
    let entry = SongEntry::new(title, genre);

    if entry.title.trim().is_empty() {
        return Err(Error::catalogue(path, format!("line {}: empty title", line)));
    }
    if entry.genre.is_empty() {
        return Err(Error::catalogue(path, format!("line {}: empty genre", line)));
    }
    let reserved = entry.genre == "." || entry.genre == "..";
    if reserved || entry.genre.contains(['/', '\\', ';', '\r', '\n']) {
        return Err(Error::catalogue(
            path,
            format!("line {}: genre '{}' is not a valid directory name", line, entry.genre),
        ));
    }
    Ok(entry)
}

fn csv_error(path: &Path, err: &csv::Error) -> Error {
    match err.position() {
        Some(pos) => Error::catalogue(path, format!("line {}: {}", pos.line(), err)),
        None => Error::catalogue(path, err.to_string()),
    }
}
