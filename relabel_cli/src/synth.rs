//! Deterministic synthetic datasets.
//!
//! Plays the part of an upstream tracker and a downstream re-segmentation:
//! - boxes drift over a 2-D grid and occasionally divide (input labeling,
//!   raw lineage in input ids)
//! - every box gets a stable output id; some boxes go missing in the output
//!   at a timestep and some are painted with a neighbour's output id
//!   (output labeling)
//!
//! All randomness comes from one seed, so a seed reproduces the dataset.

use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use relabel_env::{
    DirectoryStore, LabelId, LabelVolume, MemoryStore, Move, RawLineage, Split, StoreError,
    Timestep, VolumeSource,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Parameters of a generated dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthConfig {
    /// Master seed
    pub seed: u64,

    /// Number of timesteps (frames 0..timesteps)
    pub timesteps: u32,

    /// Grid extent
    pub width: usize,
    pub height: usize,

    /// Boxes alive at t=0
    pub objects: usize,

    /// Upper bound on boxes alive at once (divisions stop beyond it)
    pub max_objects: usize,

    /// Per box and timestep: chance of dividing
    pub split_rate: f64,

    /// Per box and timestep: chance of being absent from the output
    pub drop_rate: f64,

    /// Per box and timestep: chance of taking another box's output id
    pub fuse_rate: f64,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            timesteps: 10,
            width: 64,
            height: 64,
            objects: 6,
            max_objects: 24,
            split_rate: 0.05,
            drop_rate: 0.05,
            fuse_rate: 0.05,
        }
    }
}

#[derive(Debug, Clone)]
struct Blob {
    id: LabelId,
    output_id: LabelId,
    x: i64,
    y: i64,
    w: i64,
    h: i64,
    vx: i64,
    vy: i64,
}

impl Blob {
    fn step(&mut self, width: i64, height: i64) {
        self.x += self.vx;
        self.y += self.vy;
        if self.x < 0 || self.x + self.w > width {
            self.vx = -self.vx;
            self.x = self.x.clamp(0, (width - self.w).max(0));
        }
        if self.y < 0 || self.y + self.h > height {
            self.vy = -self.vy;
            self.y = self.y.clamp(0, (height - self.h).max(0));
        }
    }

    fn paint(&self, volume: &mut LabelVolume, width: usize, id: LabelId) {
        let data = volume.as_mut_slice();
        let height = data.len() / width.max(1);
        for row in self.y.max(0)..(self.y + self.h) {
            for col in self.x.max(0)..(self.x + self.w) {
                let (r, c) = (row as usize, col as usize);
                if r < height && c < width {
                    data[r * width + c] = id;
                }
            }
        }
    }
}

struct Generator {
    config: SynthConfig,
    rng: ChaCha8Rng,
    next_id: LabelId,
    next_output_id: LabelId,
}

impl Generator {
    fn new(config: SynthConfig) -> Self {
        let rng = ChaCha8Rng::seed_from_u64(config.seed);
        Self {
            config,
            rng,
            next_id: 1,
            next_output_id: 1,
        }
    }

    fn allocate(&mut self) -> (LabelId, LabelId) {
        let id = self.next_id;
        self.next_id += 1;
        // Output ids advance by irregular strides so the two id spaces differ.
        self.next_output_id += self.rng.gen_range(1..4);
        (id, self.next_output_id)
    }

    fn spawn(&mut self) -> Blob {
        let (id, output_id) = self.allocate();
        let (width, height) = (self.config.width as i64, self.config.height as i64);
        let w = self.rng.gen_range(3..=8).min(width.max(1));
        let h = self.rng.gen_range(3..=8).min(height.max(1));
        Blob {
            id,
            output_id,
            x: self.rng.gen_range(0..=(width - w).max(0)),
            y: self.rng.gen_range(0..=(height - h).max(0)),
            w,
            h,
            vx: self.rng.gen_range(-2..=2),
            vy: self.rng.gen_range(-2..=2),
        }
    }

    fn divide(&mut self, parent: &Blob) -> (Blob, Blob) {
        let half = (parent.w / 2).max(1);
        let (first_id, first_out) = self.allocate();
        let (second_id, second_out) = self.allocate();
        let first = Blob {
            id: first_id,
            output_id: first_out,
            w: half,
            vx: -parent.vx.abs().max(1),
            ..parent.clone()
        };
        let second = Blob {
            id: second_id,
            output_id: second_out,
            x: parent.x + half,
            w: (parent.w - half).max(1),
            vx: parent.vx.abs().max(1),
            ..parent.clone()
        };
        (first, second)
    }

    fn chance(&mut self, p: f64) -> bool {
        self.rng.gen_bool(p.clamp(0.0, 1.0))
    }

    fn output_frame(&mut self, blobs: &[Blob]) -> LabelVolume {
        let (width, height) = (self.config.width, self.config.height);
        let mut volume = LabelVolume::background(vec![height, width]);
        for blob in blobs {
            if self.chance(self.config.drop_rate) {
                continue;
            }
            let id = if blobs.len() > 1 && self.chance(self.config.fuse_rate) {
                blobs
                    .choose(&mut self.rng)
                    .map_or(blob.output_id, |other| other.output_id)
            } else {
                blob.output_id
            };
            blob.paint(&mut volume, width, id);
        }
        volume
    }

    fn run(mut self) -> MemoryStore {
        let mut store = MemoryStore::new();
        let (width, height) = (self.config.width, self.config.height);

        let mut blobs: Vec<Blob> = (0..self.config.objects).map(|_| self.spawn()).collect();

        for t in 0..self.config.timesteps as Timestep {
            let mut lineage = RawLineage::default();

            if t > 0 {
                let mut next = Vec::with_capacity(blobs.len());
                for mut blob in std::mem::take(&mut blobs) {
                    let room = next.len() + 2 <= self.config.max_objects;
                    if room && blob.w >= 2 && self.chance(self.config.split_rate) {
                        let (mut a, mut b) = self.divide(&blob);
                        a.step(width as i64, height as i64);
                        b.step(width as i64, height as i64);
                        lineage.splits.push(Split::new(blob.id, a.id, b.id));
                        next.push(a);
                        next.push(b);
                    } else {
                        blob.step(width as i64, height as i64);
                        lineage.moves.push(Move::new(blob.id, blob.id));
                        next.push(blob);
                    }
                }
                blobs = next;
            }

            let mut input = LabelVolume::background(vec![height, width]);
            for blob in &blobs {
                blob.paint(&mut input, width, blob.id);
            }
            let output = self.output_frame(&blobs);

            store.insert_volume(VolumeSource::Input, t, input);
            store.insert_volume(VolumeSource::Output, t, output);
            // Empty tracking entries too: the default end follows tracking keys.
            if t > 0 {
                store.insert_lineage(t, lineage);
            }
        }
        store
    }
}

/// Generates a dataset into memory.
pub fn generate(config: &SynthConfig) -> MemoryStore {
    Generator::new(config.clone()).run()
}

/// Copies the inputs of a generated dataset into a directory layout.
///
/// Returns the number of files written.
pub fn export(dataset: &MemoryStore, target: &DirectoryStore) -> Result<usize, StoreError> {
    let mut written = 0;
    for (source, t, volume) in dataset.volumes() {
        target.put_volume(source, t, volume)?;
        written += 1;
    }
    for (t, lineage) in dataset.lineage() {
        target.put_lineage(t, lineage)?;
        written += 1;
    }
    Ok(written)
}

/// Input id → output id pairs of one timestep, for inspection.
pub fn identity_pairs(dataset: &MemoryStore, timestep: Timestep) -> BTreeMap<LabelId, Vec<LabelId>> {
    let mut pairs: BTreeMap<LabelId, Vec<LabelId>> = BTreeMap::new();
    let volumes: BTreeMap<_, _> = dataset
        .volumes()
        .filter(|&(_, t, _)| t == timestep)
        .map(|(source, _, v)| (source, v))
        .collect();
    if let (Some(input), Some(output)) = (
        volumes.get(&VolumeSource::Input),
        volumes.get(&VolumeSource::Output),
    ) {
        for (&a, &b) in input.as_slice().iter().zip(output.as_slice()) {
            if a != 0 && b != 0 {
                let targets = pairs.entry(a).or_default();
                if !targets.contains(&b) {
                    targets.push(b);
                }
            }
        }
    }
    for targets in pairs.values_mut() {
        targets.sort_unstable();
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use relabel_env::LineageStore;

    #[test]
    fn test_same_seed_same_dataset() {
        let config = SynthConfig::default();
        let a = generate(&config);
        let b = generate(&config);
        let va: Vec<_> = a.volumes().map(|(s, t, v)| (s, t, v.clone())).collect();
        let vb: Vec<_> = b.volumes().map(|(s, t, v)| (s, t, v.clone())).collect();
        assert_eq!(va, vb);
        let la: Vec<_> = a.lineage().map(|(t, l)| (t, l.clone())).collect();
        let lb: Vec<_> = b.lineage().map(|(t, l)| (t, l.clone())).collect();
        assert_eq!(la, lb);
    }

    #[test]
    fn test_every_timestep_has_both_volumes() {
        let config = SynthConfig { timesteps: 5, ..Default::default() };
        let store = generate(&config);
        for t in 0..5 {
            let input = store.read_label_volume(VolumeSource::Input, t).unwrap();
            let output = store.read_label_volume(VolumeSource::Output, t).unwrap();
            assert_eq!(input.shape(), output.shape());
            assert_eq!(input.shape(), &[64, 64]);
        }
        assert_eq!(store.last_timestep().unwrap(), 4);
    }

    #[test]
    fn test_lineage_never_references_background() {
        let config = SynthConfig { split_rate: 0.3, timesteps: 12, ..Default::default() };
        let store = generate(&config);
        let mut splits = 0;
        for (_, lineage) in store.lineage() {
            for m in &lineage.moves {
                assert!(m.source != 0 && m.target != 0);
            }
            for s in &lineage.splits {
                assert!(s.children().iter().all(|&c| c != 0) && s.parent != 0);
                splits += 1;
            }
        }
        assert!(splits > 0);
    }

    #[test]
    fn test_clean_output_is_a_relabeling() {
        let config = SynthConfig { drop_rate: 0.0, fuse_rate: 0.0, split_rate: 0.0, objects: 1, ..Default::default() };
        let store = generate(&config);
        let pairs = identity_pairs(&store, 0);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs.values().next().unwrap().len(), 1);
    }
}
