// ============================================================
// Layer 4 — Dataset Directory Loader
// ============================================================
// Reads a prepared dataset from disk. The directory layout is:
//
//   <dataset>/
//     dataset_info.json   → split sizes + image metadata
//     train.jsonl         → one FlowSample per line
//     test.jsonl
//
// dataset_info.json:
//   {
//     "splits":       { "train": 800, "test": 200 },
//     "img_size":     [64, 64],
//     "in_channels":  1,
//     "out_channels": 3
//   }
//
// The metadata must agree with the experiment config, and every
// split file must hold exactly the number of rows its entry in
// `splits` announces. Any mismatch is a hard error.
//
// Reference: serde_json documentation (from_reader, from_str)
//            Rust Book §9 (Error Handling)

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{ensure, Context, Result};
use serde::{Deserialize, Serialize};

use crate::domain::config::ExperimentConfig;
use crate::domain::sample::FlowSample;
use crate::domain::traits::SplitSource;

pub const INFO_FILE: &str = "dataset_info.json";

// ─── DatasetInfo ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    /// Split name → number of examples
    pub splits:       BTreeMap<String, usize>,
    pub img_size:     [usize; 2],
    pub in_channels:  usize,
    pub out_channels: usize,
}

impl DatasetInfo {
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(INFO_FILE);
        let raw  = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read dataset metadata '{}'", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Malformed dataset metadata '{}'", path.display()))
    }

    #[cfg(test)]
    pub fn save(&self, dir: &Path) -> Result<()> {
        fs::create_dir_all(dir)
            .with_context(|| format!("Cannot create dataset directory '{}'", dir.display()))?;
        let path = dir.join(INFO_FILE);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)
            .with_context(|| format!("Cannot write dataset metadata '{}'", path.display()))
    }

    /// Check that the stored images have the shape the model expects.
    pub fn check_against(&self, cfg: &ExperimentConfig) -> Result<()> {
        ensure!(
            self.img_size == cfg.vit.img_size,
            "Dataset img_size {:?} does not match vit.img_size {:?}",
            self.img_size,
            cfg.vit.img_size
        );
        ensure!(
            self.in_channels == cfg.vit.in_channels,
            "Dataset has {} input channels, vit.in_channels is {}",
            self.in_channels,
            cfg.vit.in_channels
        );
        ensure!(
            self.out_channels == cfg.vit.out_channels,
            "Dataset has {} output channels, vit.out_channels is {}",
            self.out_channels,
            cfg.vit.out_channels
        );
        Ok(())
    }

    fn input_len(&self) -> usize {
        self.in_channels * self.img_size[0] * self.img_size[1]
    }

    fn target_len(&self) -> usize {
        self.out_channels * self.img_size[0] * self.img_size[1]
    }
}

// ─── DatasetDir ───────────────────────────────────────────────────────────────
/// A dataset directory on disk. Implements SplitSource.
#[derive(Debug, Clone)]
pub struct DatasetDir {
    root: PathBuf,
    info: DatasetInfo,
}

impl DatasetDir {
    /// Open `root` and read its metadata. Split files are read lazily.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        ensure!(
            root.is_dir(),
            "Dataset directory '{}' does not exist",
            root.display()
        );
        let info = DatasetInfo::load(&root)?;
        tracing::debug!("Opened dataset '{}' with splits {:?}", root.display(), info.splits);
        Ok(Self { root, info })
    }

    pub fn info(&self) -> &DatasetInfo {
        &self.info
    }

    fn split_path(&self, split: &str) -> PathBuf {
        self.root.join(format!("{split}.jsonl"))
    }
}

impl SplitSource for DatasetDir {
    fn split_len(&self, split: &str) -> Result<usize> {
        self.info.splits.get(split).copied().with_context(|| {
            format!(
                "Dataset '{}' has no split '{split}' (available: {:?})",
                self.root.display(),
                self.info.splits.keys().collect::<Vec<_>>()
            )
        })
    }

    fn load_split(&self, split: &str) -> Result<Vec<FlowSample>> {
        let expected = self.split_len(split)?;
        let path     = self.split_path(split);
        let file     = File::open(&path)
            .with_context(|| format!("Cannot open split file '{}'", path.display()))?;

        let input_len  = self.info.input_len();
        let target_len = self.info.target_len();
        let mut samples = Vec::with_capacity(expected);

        for (line_no, line) in BufReader::new(file).lines().enumerate() {
            let line = line
                .with_context(|| format!("Cannot read '{}'", path.display()))?;
            // Tolerate a trailing newline / blank separator lines
            if line.trim().is_empty() {
                continue;
            }
            let sample: FlowSample = serde_json::from_str(&line).with_context(|| {
                format!("Malformed sample at {}:{}", path.display(), line_no + 1)
            })?;
            ensure!(
                sample.has_shape(input_len, target_len),
                "Sample at {}:{} has {} inputs / {} targets, expected {input_len} / {target_len}",
                path.display(),
                line_no + 1,
                sample.inputs.len(),
                sample.targets.len()
            );
            samples.push(sample);
        }

        ensure!(
            samples.len() == expected,
            "Split '{split}' announces {expected} examples but '{}' holds {}",
            path.display(),
            samples.len()
        );
        tracing::info!("Loaded {} examples from split '{split}'", samples.len());
        Ok(samples)
    }
}

/// Write `samples` as `<dir>/<split>.jsonl`.
#[cfg(test)]
pub fn write_split(dir: &Path, split: &str, samples: &[FlowSample]) -> Result<()> {
    use std::io::{BufWriter, Write};

    let path = dir.join(format!("{split}.jsonl"));
    let file = File::create(&path)
        .with_context(|| format!("Cannot create split file '{}'", path.display()))?;
    let mut out = BufWriter::new(file);
    for sample in samples {
        serde_json::to_writer(&mut out, sample)?;
        out.write_all(b"\n")?;
    }
    out.flush()
        .with_context(|| format!("Cannot write split file '{}'", path.display()))
}

// ─── Test fixtures ────────────────────────────────────────────────────────────
/// Build a small dataset directory with `train`/`test` splits whose
/// sample `k` is filled with the value `k` (handy for order checks).
#[cfg(test)]
pub(crate) fn write_fixture(
    dir:   &Path,
    cfg:   &ExperimentConfig,
    train: usize,
    test:  usize,
) -> Result<()> {
    let info = DatasetInfo {
        splits:       BTreeMap::from([("train".to_string(), train), ("test".to_string(), test)]),
        img_size:     cfg.vit.img_size,
        in_channels:  cfg.vit.in_channels,
        out_channels: cfg.vit.out_channels,
    };
    info.save(dir)?;
    for (split, n) in [("train", train), ("test", test)] {
        let samples: Vec<FlowSample> = (0..n)
            .map(|k| {
                FlowSample::new(
                    vec![k as f32; cfg.image_len(cfg.vit.in_channels)],
                    vec![k as f32; cfg.image_len(cfg.vit.out_channels)],
                )
            })
            .collect();
        write_split(dir, split, &samples)?;
    }
    Ok(())
}
