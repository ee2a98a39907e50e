// ============================================================
// Layer 4 — Batch Pipeline
// ============================================================
// Turns one split of the dataset directory into a lazy stream
// of tensor batches for this process:
//
//   DatasetDir::load_split(mode)
//       │
//       ▼
//   shard_for_process     → contiguous window for this process
//       │
//       ▼
//   ShuffleBuffer (train) → seed 0, 1024 slots, drained per epoch,
//       │                   RNG state carried to the next epoch
//       ▼
//   repeat (train)        → num_epochs passes over the shard
//       │
//       ▼
//   FlowBatcher           → fixed batch_size, final partial batch dropped
//       │
//       ▼
//   sync_channel(2)       → a worker thread prepares batches ahead
//       │
//       ▼
//   BatchStream           → Iterator<Item = FlowBatch<B>>
//
// Batches are formed across epoch boundaries, so a training
// stream yields exactly floor(shard_len * num_epochs / batch_size)
// batches. Evaluation splits are read once, in stored order; the
// trainer preloads its test split so each epoch skips the disk.
//
// Dropping a BatchStream closes the channel; the worker notices
// on its next send and exits.
//
// Reference: Rust Book §16.2 (Using Message Passing to Transfer Data)
//            Burn Book §4 (Batcher)

use std::mem;
use std::sync::mpsc::{self, Receiver, SyncSender};
use std::thread::{self, JoinHandle};

use anyhow::{ensure, Context, Result};
use burn::{
    data::{dataloader::batcher::Batcher, dataset::Dataset},
    prelude::*,
};
use rand::{rngs::StdRng, SeedableRng};

use crate::data::batcher::{FlowBatch, FlowBatcher};
use crate::data::dataset::FlowDataset;
use crate::data::loader::DatasetDir;
use crate::data::shuffle::ShuffleBuffer;
use crate::data::splitter::shard_for_process;
use crate::domain::config::ExperimentConfig;
use crate::domain::sample::FlowSample;
use crate::domain::topology::ProcessTopology;
use crate::domain::traits::SplitSource;

pub const TRAIN_SPLIT:    &str  = "train";
pub const SHUFFLE_SEED:   u64   = 0;
pub const SHUFFLE_BUFFER: usize = 1024;
pub const PREFETCH_DEPTH: usize = 2;

// ─── Entry points ─────────────────────────────────────────────────────────────
/// Open the configured dataset directory and stream `mode` for this process.
///
/// `mode` is `"train"` or the name of an evaluation split such as `"test"`.
/// Every call starts a fresh, independent stream.
pub fn get_data<B: Backend>(
    cfg:      &ExperimentConfig,
    mode:     &str,
    topology: &ProcessTopology,
    device:   &B::Device,
) -> Result<BatchStream<B>> {
    let source = DatasetDir::open(&cfg.dataset)
        .with_context(|| format!("Cannot open dataset '{}'", cfg.dataset))?;
    source.info().check_against(cfg)?;
    build_stream(&source, cfg, mode, topology, device)
}

/// Read one split of the configured dataset into memory so later
/// streams over it skip the disk.
pub fn preload_split(cfg: &ExperimentConfig, mode: &str) -> Result<LoadedSplit> {
    let source = DatasetDir::open(&cfg.dataset)
        .with_context(|| format!("Cannot open dataset '{}'", cfg.dataset))?;
    source.info().check_against(cfg)?;
    let samples = source
        .load_split(mode)
        .with_context(|| format!("Cannot load split '{mode}'"))?;
    tracing::debug!("Preloaded {} examples of split '{mode}'", samples.len());
    Ok(LoadedSplit { name: mode.to_string(), samples })
}

/// Same as `get_data`, reading from any SplitSource.
pub fn build_stream<B: Backend, S: SplitSource>(
    source:   &S,
    cfg:      &ExperimentConfig,
    mode:     &str,
    topology: &ProcessTopology,
    device:   &B::Device,
) -> Result<BatchStream<B>> {
    ensure!(cfg.batch_size > 0, "batch_size must be positive");

    let samples = source
        .load_split(mode)
        .with_context(|| format!("Cannot load split '{mode}'"))?;
    let shard = shard_for_process(FlowDataset::new(samples), topology);

    let training   = mode == TRAIN_SPLIT;
    let epochs     = if training { cfg.num_epochs } else { 1 };
    let batch_size = cfg.batch_size;
    let batches    = shard
        .len()
        .checked_mul(epochs)
        .map(|examples| examples / batch_size)
        .with_context(|| {
            format!("{} examples x {epochs} epochs of split '{mode}' overflows the batch count", shard.len())
        })?;

    tracing::info!(
        "Split '{mode}' on {topology}: {} examples x {epochs} epoch(s) → {batches} batches of {batch_size}",
        shard.len()
    );

    let plan    = StreamPlan { epochs, batch_size, shuffle: training };
    let batcher = FlowBatcher::from_config(cfg);
    let device  = device.clone();
    let (tx, rx) = mpsc::sync_channel(PREFETCH_DEPTH);

    let worker = thread::Builder::new()
        .name(format!("prefetch-{mode}"))
        .spawn(move || produce::<B, _>(shard, plan, batcher, device, tx))
        .context("Cannot spawn prefetch worker")?;

    Ok(BatchStream {
        receiver:  Some(rx),
        worker:    Some(worker),
        remaining: batches,
    })
}

// ─── LoadedSplit ──────────────────────────────────────────────────────────────
/// A single split held in memory.
#[derive(Debug, Clone)]
pub struct LoadedSplit {
    name:    String,
    samples: Vec<FlowSample>,
}

impl LoadedSplit {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl SplitSource for LoadedSplit {
    fn split_len(&self, split: &str) -> Result<usize> {
        ensure!(split == self.name, "Only split '{}' is loaded, not '{split}'", self.name);
        Ok(self.samples.len())
    }

    fn load_split(&self, split: &str) -> Result<Vec<FlowSample>> {
        self.split_len(split)?;
        Ok(self.samples.clone())
    }
}

// ─── Worker ───────────────────────────────────────────────────────────────────
#[derive(Clone, Copy, Debug)]
struct StreamPlan {
    epochs:     usize,
    batch_size: usize,
    shuffle:    bool,
}

fn produce<B, D>(
    shard:   D,
    plan:    StreamPlan,
    batcher: FlowBatcher,
    device:  B::Device,
    tx:      SyncSender<FlowBatch<B>>,
) where
    B: Backend,
    D: Dataset<FlowSample>,
{
    let mut rng     = StdRng::seed_from_u64(SHUFFLE_SEED);
    let mut pending = Vec::with_capacity(plan.batch_size);

    for _ in 0..plan.epochs {
        let ordered = (0..shard.len()).filter_map(|i| shard.get(i));
        let epoch: Box<dyn Iterator<Item = FlowSample> + '_> = if plan.shuffle {
            Box::new(ShuffleBuffer::new(ordered, SHUFFLE_BUFFER, &mut rng))
        } else {
            Box::new(ordered)
        };

        for sample in epoch {
            pending.push(sample);
            if pending.len() < plan.batch_size {
                continue;
            }
            let items = mem::replace(&mut pending, Vec::with_capacity(plan.batch_size));
            let batch = <FlowBatcher as Batcher<B, FlowSample, FlowBatch<B>>>::batch(
                &batcher, items, &device,
            );
            if tx.send(batch).is_err() {
                tracing::debug!("Batch stream dropped, prefetch worker exiting");
                return;
            }
        }
    }

    if !pending.is_empty() {
        tracing::debug!("Dropping final partial batch of {} examples", pending.len());
    }
}

// ─── BatchStream ──────────────────────────────────────────────────────────────
/// Lazy stream of batches fed by a prefetch worker.
pub struct BatchStream<B: Backend> {
    receiver:  Option<Receiver<FlowBatch<B>>>,
    worker:    Option<JoinHandle<()>>,
    remaining: usize,
}

impl<B: Backend> Iterator for BatchStream<B> {
    type Item = FlowBatch<B>;

    fn next(&mut self) -> Option<FlowBatch<B>> {
        let batch = self.receiver.as_ref()?.recv().ok()?;
        self.remaining = self.remaining.saturating_sub(1);
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<B: Backend> ExactSizeIterator for BatchStream<B> {}

impl<B: Backend> Drop for BatchStream<B> {
    fn drop(&mut self) {
        // Close the channel first so a blocked worker wakes up
        drop(self.receiver.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!("Prefetch worker panicked");
            }
        }
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use anyhow::bail;
    use burn::backend::NdArray;

    use crate::data::loader::write_fixture;

    type TestBackend = NdArray;

    /// In-memory splits; example `k` carries the value `k` everywhere.
    struct MemorySource {
        splits: BTreeMap<String, Vec<FlowSample>>,
    }

    impl MemorySource {
        fn new(cfg: &ExperimentConfig, train: usize, test: usize) -> Self {
            let make = |n: usize| -> Vec<FlowSample> {
                (0..n)
                    .map(|k| {
                        FlowSample::new(
                            vec![k as f32; cfg.image_len(cfg.vit.in_channels)],
                            vec![k as f32; cfg.image_len(cfg.vit.out_channels)],
                        )
                    })
                    .collect()
            };
            let splits = BTreeMap::from([
                ("train".to_string(), make(train)),
                ("test".to_string(), make(test)),
            ]);
            Self { splits }
        }
    }

    impl SplitSource for MemorySource {
        fn split_len(&self, split: &str) -> Result<usize> {
            Ok(self.load_split(split)?.len())
        }

        fn load_split(&self, split: &str) -> Result<Vec<FlowSample>> {
            match self.splits.get(split) {
                Some(samples) => Ok(samples.clone()),
                None          => bail!("no split {split}"),
            }
        }
    }

    fn small_config(batch_size: usize, num_epochs: usize) -> ExperimentConfig {
        let mut cfg = ExperimentConfig { batch_size, num_epochs, ..Default::default() };
        cfg.vit.img_size   = [2, 2];
        cfg.vit.patch_size = 1;
        cfg
    }

    /// Example ids of every row in a batch
    fn row_ids(batch: FlowBatch<TestBackend>) -> Vec<usize> {
        let rows   = batch.batch_size();
        let values = batch.inputs.into_data().convert::<f32>().to_vec::<f32>().unwrap();
        let plane  = values.len() / rows;
        (0..rows).map(|r| values[r * plane] as usize).collect()
    }

    fn stream(
        source:   &MemorySource,
        cfg:      &ExperimentConfig,
        mode:     &str,
        topology: &ProcessTopology,
    ) -> BatchStream<TestBackend> {
        build_stream(source, cfg, mode, topology, &Default::default()).unwrap()
    }

    #[test]
    fn test_train_length_spans_epochs() {
        let cfg    = small_config(4, 3);
        let source = MemorySource::new(&cfg, 10, 2);
        let s      = stream(&source, &cfg, "train", &ProcessTopology::single());

        // floor(10 * 3 / 4) = 7
        assert_eq!(s.len(), 7);
        let batches: Vec<_> = s.collect();
        assert_eq!(batches.len(), 7);
        assert!(batches.iter().all(|b| b.batch_size() == 4));
    }

    #[test]
    fn test_eval_split_is_single_ordered_pass() {
        let cfg    = small_config(2, 5);
        let source = MemorySource::new(&cfg, 4, 5);
        let ids: Vec<usize> = stream(&source, &cfg, "test", &ProcessTopology::single())
            .flat_map(row_ids)
            .collect();
        // 5 examples, batches of 2, remainder dropped
        assert_eq!(ids, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_each_epoch_is_a_permutation_in_a_new_order() {
        let cfg    = small_config(1, 2);
        let source = MemorySource::new(&cfg, 12, 1);
        let ids: Vec<usize> = stream(&source, &cfg, "train", &ProcessTopology::single())
            .flat_map(row_ids)
            .collect();

        let (first, second) = ids.split_at(12);
        let mut a = first.to_vec();
        let mut b = second.to_vec();
        a.sort_unstable();
        b.sort_unstable();
        assert_eq!(a, (0..12).collect::<Vec<_>>());
        assert_eq!(b, (0..12).collect::<Vec<_>>());
        assert_ne!(first, second);
    }

    #[test]
    fn test_streams_are_reproducible() {
        let cfg    = small_config(3, 2);
        let source = MemorySource::new(&cfg, 9, 1);
        let topo   = ProcessTopology::single();
        let a: Vec<usize> = stream(&source, &cfg, "train", &topo).flat_map(row_ids).collect();
        let b: Vec<usize> = stream(&source, &cfg, "train", &topo).flat_map(row_ids).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn test_processes_read_disjoint_shards() {
        let cfg    = small_config(1, 1);
        let source = MemorySource::new(&cfg, 2, 7);
        let mut all = Vec::new();
        for index in 0..2 {
            let topo = ProcessTopology::new(index, 2).unwrap();
            all.extend(stream(&source, &cfg, "test", &topo).flat_map(row_ids));
        }
        assert_eq!(all, (0..7).collect::<Vec<_>>());
    }

    #[test]
    fn test_dropping_early_stops_worker() {
        let cfg    = small_config(1, 50);
        let source = MemorySource::new(&cfg, 20, 1);
        let mut s  = stream(&source, &cfg, "train", &ProcessTopology::single());
        assert!(s.next().is_some());
        drop(s); // must not hang
    }

    #[test]
    fn test_missing_split_is_an_error() {
        let cfg    = small_config(1, 1);
        let source = MemorySource::new(&cfg, 1, 1);
        let result = build_stream::<TestBackend, _>(
            &source, &cfg, "validation", &ProcessTopology::single(), &Default::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_get_data_reads_dataset_directory() {
        let dir     = tempfile::tempdir().unwrap();
        let mut cfg = small_config(2, 2);
        cfg.dataset = dir.path().to_string_lossy().into_owned();
        write_fixture(dir.path(), &cfg, 6, 3).unwrap();

        let train = get_data::<TestBackend>(&cfg, "train", &ProcessTopology::single(), &Default::default())
            .unwrap();
        assert_eq!(train.count(), 6);

        let test = get_data::<TestBackend>(&cfg, "test", &ProcessTopology::single(), &Default::default())
            .unwrap();
        assert_eq!(test.count(), 1);
    }

    #[test]
    fn test_epoch_overflow_is_an_error() {
        let cfg    = small_config(1, usize::MAX);
        let source = MemorySource::new(&cfg, 3, 1);
        let result = build_stream::<TestBackend, _>(
            &source, &cfg, "train", &ProcessTopology::single(), &Default::default(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_preloaded_split_outlives_directory() {
        let dir     = tempfile::tempdir().unwrap();
        let mut cfg = small_config(2, 1);
        cfg.dataset = dir.path().join("data").to_string_lossy().into_owned();
        write_fixture(std::path::Path::new(&cfg.dataset), &cfg, 2, 5).unwrap();

        let split = preload_split(&cfg, "test").unwrap();
        assert_eq!(split.name(), "test");
        std::fs::remove_dir_all(&cfg.dataset).unwrap();

        for _ in 0..2 {
            let ids: Vec<usize> = build_stream::<TestBackend, _>(
                &split, &cfg, "test", &ProcessTopology::single(), &Default::default(),
            )
            .unwrap()
            .flat_map(row_ids)
            .collect();
            assert_eq!(ids, vec![0, 1, 2, 3]);
        }
        assert!(split.load_split("train").is_err());
    }

    #[test]
    fn test_get_data_rejects_missing_directory() {
        let mut cfg = small_config(2, 1);
        cfg.dataset = "/definitely/not/a/dataset".to_string();
        let result = get_data::<TestBackend>(&cfg, "train", &ProcessTopology::single(), &Default::default());
        assert!(result.is_err());
    }
}
