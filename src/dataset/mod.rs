//! Genre directory trees and the train/validation split.
//!
//! A genre tree is `root/<genre>/<file>`. [`split_dataset`] copies it into
//! `out/train/<genre>/` and `out/val/<genre>/`, shuffling each genre with a
//! seeded PRNG so the same seed always yields the same partition.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use walkdir::WalkDir;

use crate::error::{Error, IoPathExt, Result};

/// Seed used when none is configured.
pub const DEFAULT_SEED: u64 = 1337;

const TOLERANCE: f64 = 1e-6;

/// Train and validation fractions.
///
/// Validated on construction; only the train share is kept since the
/// validation share is whatever remains.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitRatio {
    train: f64,
}

impl SplitRatio {
    /// Both fractions must lie in `[0, 1]` and sum to 1.
    pub fn new(train: f64, val: f64) -> Result<Self> {
        let in_range = |f: f64| (0.0..=1.0).contains(&f);
        if !in_range(train) || !in_range(val) {
            return Err(Error::config(format!(
                "split fractions must be within [0, 1], got ({}, {})",
                train, val
            )));
        }
        if (train + val - 1.0).abs() > TOLERANCE {
            return Err(Error::config(format!(
                "split fractions must sum to 1, got {} + {}",
                train, val
            )));
        }
        Ok(Self { train })
    }

    /// Files out of `n` that go to `train/`: `floor(train · n)`.
    pub fn train_count(&self, n: usize) -> usize {
        // The epsilon keeps products like 0.7 · 10 from landing on 6.999….
        ((self.train * n as f64 + 1e-9).floor() as usize).min(n)
    }
}

impl Default for SplitRatio {
    fn default() -> Self {
        Self { train: 0.8 }
    }
}

/// Files of one genre directory, sorted by name.
#[derive(Debug, Clone)]
pub struct GenreFiles {
    pub genre: String,
    pub files: Vec<PathBuf>,
}

/// List `root/<genre>/<file>`, genres and files sorted by name.
///
/// Non-directory entries at the top level are ignored. Only regular files
/// inside a genre directory are listed.
pub fn scan_tree(root: &Path) -> Result<Vec<GenreFiles>> {
    if !fs::metadata(root).at_path(root)?.is_dir() {
        return Err(Error::filesystem(
            root,
            std::io::Error::new(std::io::ErrorKind::NotADirectory, "not a genre tree"),
        ));
    }

    let mut genres = Vec::new();
    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| Error::filesystem(root, e.into()))?;
        if !entry.file_type().is_dir() {
            tracing::debug!(path = %entry.path().display(), "Ignoring non-directory entry");
            continue;
        }

        let mut files = Vec::new();
        for file in WalkDir::new(entry.path())
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let file = file.map_err(|e| Error::filesystem(entry.path(), e.into()))?;
            if file.file_type().is_file() {
                files.push(file.into_path());
            }
        }

        genres.push(GenreFiles {
            genre: entry.file_name().to_string_lossy().into_owned(),
            files,
        });
    }

    Ok(genres)
}

/// Per-genre outcome of a split.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitSummary {
    /// genre → (train, val)
    pub per_genre: BTreeMap<String, (usize, usize)>,
}

impl SplitSummary {
    pub fn train_total(&self) -> usize {
        self.per_genre.values().map(|(t, _)| t).sum()
    }

    pub fn val_total(&self) -> usize {
        self.per_genre.values().map(|(_, v)| v).sum()
    }
}

/// Copy a genre tree into `output/train` and `output/val`.
///
/// The source tree is left untouched. Existing `train/` and `val/` contents
/// are removed first, so the output mirrors the tree exactly. Each genre is shuffled independently after sorting, with
/// one PRNG seeded from `seed` shared across genres in name order.
pub fn split_dataset(
    tree: &Path,
    output: &Path,
    ratio: SplitRatio,
    seed: u64,
) -> Result<SplitSummary> {
    let genres = scan_tree(tree)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut summary = SplitSummary::default();

    let train_root = output.join("train");
    let val_root = output.join("val");
    if tree.starts_with(&train_root) || tree.starts_with(&val_root) {
        return Err(Error::config(format!(
            "genre tree {} lies inside the split output {}",
            tree.display(),
            output.display()
        )));
    }
    clear_partition(&train_root)?;
    clear_partition(&val_root)?;

    for GenreFiles { genre, mut files } in genres {
        files.shuffle(&mut rng);
        let cut = ratio.train_count(files.len());
        let (train, val) = files.split_at(cut);

        copy_into(train, &train_root.join(&genre))?;
        copy_into(val, &val_root.join(&genre))?;

        tracing::debug!(%genre, train = train.len(), val = val.len(), "Split genre");
        summary.per_genre.insert(genre, (train.len(), val.len()));
    }

    tracing::info!(
        genres = summary.per_genre.len(),
        train = summary.train_total(),
        val = summary.val_total(),
        "Dataset split complete"
    );
    Ok(summary)
}

fn clear_partition(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            tracing::debug!(path = %dir.display(), "Cleared previous split");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::filesystem(dir, e)),
    }
}

fn copy_into(files: &[PathBuf], dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).at_path(dir)?;
    for file in files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let dest = dir.join(name);
        fs::copy(file, &dest).at_path(&dest)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn make_tree(root: &Path, layout: &[(&str, usize)]) {
        for (genre, count) in layout {
            let dir = root.join(genre);
            fs::create_dir_all(&dir).unwrap();
            for i in 0..*count {
                fs::write(dir.join(format!("song{:02}.png", i)), format!("{}-{}", genre, i))
                    .unwrap();
            }
        }
    }

    fn names(dir: &Path) -> BTreeSet<String> {
        match fs::read_dir(dir) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => BTreeSet::new(),
        }
    }

    #[test]
    fn test_ratio_validation() {
        assert!(SplitRatio::new(0.8, 0.2).is_ok());
        assert!(SplitRatio::new(1.0, 0.0).is_ok());
        assert!(matches!(SplitRatio::new(0.8, 0.3), Err(Error::Config(_))));
        assert!(matches!(SplitRatio::new(1.2, -0.2), Err(Error::Config(_))));
    }

    #[test]
    fn test_train_count_floors() {
        let ratio = SplitRatio::new(0.8, 0.2).unwrap();
        assert_eq!(ratio.train_count(10), 8);
        assert_eq!(ratio.train_count(3), 2);
        assert_eq!(ratio.train_count(1), 0);
        assert_eq!(ratio.train_count(0), 0);
        assert_eq!(SplitRatio::new(0.7, 0.3).unwrap().train_count(10), 7);
    }

    #[test]
    fn test_ten_images_split_eight_two() {
        let dir = tempdir().unwrap();
        let tree = dir.path().join("espectrogramas");
        let out = dir.path().join("dataset");
        make_tree(&tree, &[("pop", 10)]);

        let summary = split_dataset(&tree, &out, SplitRatio::default(), DEFAULT_SEED).unwrap();

        assert_eq!(summary.per_genre["pop"], (8, 2));
        assert_eq!(names(&out.join("train/pop")).len(), 8);
        assert_eq!(names(&out.join("val/pop")).len(), 2);
    }

    #[test]
    fn test_split_is_deterministic() {
        let dir = tempdir().unwrap();
        let tree = dir.path().join("tree");
        make_tree(&tree, &[("pop", 10), ("rock", 7)]);

        let first = dir.path().join("a");
        let second = dir.path().join("b");
        split_dataset(&tree, &first, SplitRatio::default(), 42).unwrap();
        split_dataset(&tree, &second, SplitRatio::default(), 42).unwrap();

        for part in ["train/pop", "val/pop", "train/rock", "val/rock"] {
            assert_eq!(names(&first.join(part)), names(&second.join(part)));
        }
    }

    #[test]
    fn test_source_tree_left_intact() {
        let dir = tempdir().unwrap();
        let tree = dir.path().join("tree");
        make_tree(&tree, &[("rock", 4)]);
        fs::write(tree.join("notes.txt"), "ignored").unwrap();

        let out = dir.path().join("out");
        let summary = split_dataset(&tree, &out, SplitRatio::default(), DEFAULT_SEED).unwrap();

        assert_eq!(names(&tree.join("rock")).len(), 4);
        assert_eq!(summary.per_genre.len(), 1);
        // Both partitions get the genre directory even when one side is empty.
        let everything = SplitRatio::new(1.0, 0.0).unwrap();
        let all_train = split_dataset(&tree, &dir.path().join("all"), everything, 1).unwrap();
        assert_eq!(all_train.per_genre["rock"], (4, 0));
        assert!(dir.path().join("all/val/rock").is_dir());
    }

    #[test]
    fn test_missing_tree_is_filesystem_error() {
        let dir = tempdir().unwrap();
        let result = split_dataset(
            &dir.path().join("nope"),
            &dir.path().join("out"),
            SplitRatio::default(),
            DEFAULT_SEED,
        );
        assert!(result.unwrap_err().is_filesystem());
    }

    #[test]
    fn test_resplit_after_growth_stays_disjoint() {
        let dir = tempdir().unwrap();
        let tree = dir.path().join("tree");
        let out = dir.path().join("out");
        make_tree(&tree, &[("pop", 9), ("rock", 3)]);
        split_dataset(&tree, &out, SplitRatio::default(), DEFAULT_SEED).unwrap();

        fs::write(tree.join("pop/song09.png"), "pop-9").unwrap();
        fs::remove_dir_all(tree.join("rock")).unwrap();
        let summary = split_dataset(&tree, &out, SplitRatio::default(), DEFAULT_SEED).unwrap();

        let train = names(&out.join("train/pop"));
        let val = names(&out.join("val/pop"));
        assert_eq!(summary.per_genre["pop"], (8, 2));
        assert!(train.is_disjoint(&val));
        assert_eq!(train.len() + val.len(), 10);
        // A genre gone from the tree is gone from the split too.
        assert!(!out.join("train/rock").exists());
        assert!(!out.join("val/rock").exists());
    }

    #[test]
    fn test_tree_inside_output_is_rejected() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out");
        let tree = out.join("train");
        make_tree(&tree, &[("pop", 2)]);

        let err = split_dataset(&tree, &out, SplitRatio::default(), DEFAULT_SEED).unwrap_err();

        assert!(matches!(err, Error::Config(_)));
        assert_eq!(names(&tree.join("pop")).len(), 2);
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn split_is_complete_and_disjoint(
            counts in prop::collection::vec(0usize..12, 1..4),
            train in 0.0f64..=1.0,
            seed in any::<u64>(),
        ) {
            let dir = tempdir().unwrap();
            let tree = dir.path().join("tree");
            let out = dir.path().join("out");
            let genres: Vec<String> = (0..counts.len()).map(|i| format!("g{}", i)).collect();
            let layout: Vec<(&str, usize)> =
                genres.iter().map(String::as_str).zip(counts.iter().copied()).collect();
            make_tree(&tree, &layout);

            let ratio = SplitRatio::new(train, 1.0 - train).unwrap();
            split_dataset(&tree, &out, ratio, seed).unwrap();

            for (genre, count) in &layout {
                let source = names(&tree.join(genre));
                let train_set = names(&out.join("train").join(genre));
                let val_set = names(&out.join("val").join(genre));

                prop_assert!(train_set.is_disjoint(&val_set));
                let union: BTreeSet<_> = train_set.union(&val_set).cloned().collect();
                prop_assert_eq!(&union, &source);
                prop_assert_eq!(train_set.len(), ratio.train_count(*count));
            }
        }
    }
}
