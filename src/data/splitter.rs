// ============================================================
// Layer 4 — Shard Splitter
// ============================================================
// Selects the slice of a split that belongs to this process.
//
// Every process of a distributed job loads the same split and
// keeps a contiguous, disjoint window of it. The windows cover
// the whole split; the first `len % count` processes receive
// one extra example (see ProcessTopology::shard_range).
//
//   process 0  [■■■■ . . . . . .]
//   process 1  [. . . . ■■■ . . .]
//   process 2  [. . . . . . . ■■■]
//
// The window is a lazy view (Burn's PartialDataset), so nothing
// is copied until the pipeline asks for an example.
//
// Reference: Burn Book §4 (Datasets, transform::PartialDataset)

use burn::data::dataset::{transform::PartialDataset, Dataset};

use crate::domain::sample::FlowSample;
use crate::domain::topology::ProcessTopology;

/// Window of `dataset` owned by the process described by `topology`.
pub fn shard_for_process<D>(dataset: D, topology: &ProcessTopology) -> PartialDataset<D, FlowSample>
where
    D: Dataset<FlowSample>,
{
    let total = dataset.len();
    let range = topology.shard_range(total);

    tracing::debug!(
        "Shard for {topology}: examples {}..{} of {total}",
        range.start,
        range.end
    );

    PartialDataset::new(dataset, range.start, range.end)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::dataset::FlowDataset;

    fn numbered(n: usize) -> FlowDataset {
        FlowDataset::new(
            (0..n).map(|k| FlowSample::new(vec![k as f32], vec![k as f32])).collect(),
        )
    }

    fn ids<D: Dataset<FlowSample>>(ds: &D) -> Vec<usize> {
        (0..ds.len())
            .map(|i| ds.get(i).unwrap().inputs[0] as usize)
            .collect()
    }

    #[test]
    fn test_single_process_keeps_everything() {
        let shard = shard_for_process(numbered(6), &ProcessTopology::single());
        assert_eq!(ids(&shard), vec![0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_shards_are_disjoint_and_complete() {
        let mut seen = Vec::new();
        for index in 0..3 {
            let topology = ProcessTopology::new(index, 3).unwrap();
            seen.extend(ids(&shard_for_process(numbered(11), &topology)));
        }
        assert_eq!(seen, (0..11).collect::<Vec<_>>());
    }

    #[test]
    fn test_uneven_split_sizes() {
        let sizes: Vec<usize> = (0..4)
            .map(|i| {
                let topology = ProcessTopology::new(i, 4).unwrap();
                shard_for_process(numbered(10), &topology).len()
            })
            .collect();
        assert_eq!(sizes, vec![3, 3, 2, 2]);
    }
}
