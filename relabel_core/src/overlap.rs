//! Overlap correspondence between two aligned label volumes.
//!
//! For every non-background id of one volume, the set of non-background ids
//! of the other volume found at the same positions, together with how many
//! positions they share. Both directions come out of one pass over the
//! voxels, so `y ∈ forward[x]` holds exactly when `x ∈ backward[y]`.

use crate::error::ShapeMismatch;
use relabel_env::{LabelId, LabelVolume, BACKGROUND};
use std::collections::btree_map;
use std::collections::BTreeMap;

/// Shared-position counts keyed by destination id.
pub type OverlapCounts = BTreeMap<LabelId, u64>;

/// One direction of an overlap: source id → destination ids (with counts).
///
/// Every non-background id of the source volume is a key, including ids
/// that overlap nothing (empty count map).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Correspondence {
    entries: BTreeMap<LabelId, OverlapCounts>,
}

impl Correspondence {
    /// Destination ids overlapping `source`, or `None` if `source` isn't
    /// present in the source volume.
    pub fn get(&self, source: LabelId) -> Option<&OverlapCounts> {
        self.entries.get(&source)
    }

    /// Whether `target` overlaps `source`.
    pub fn overlaps(&self, source: LabelId, target: LabelId) -> bool {
        self.entries
            .get(&source)
            .is_some_and(|targets| targets.contains_key(&target))
    }

    /// Source ids, ascending.
    pub fn sources(&self) -> impl Iterator<Item = LabelId> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, LabelId, OverlapCounts> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn record(&mut self, source: LabelId, target: LabelId) {
        let targets = self.entries.entry(source).or_default();
        if target != BACKGROUND {
            *targets.entry(target).or_insert(0) += 1;
        }
    }
}

impl FromIterator<(LabelId, OverlapCounts)> for Correspondence {
    fn from_iter<I: IntoIterator<Item = (LabelId, OverlapCounts)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Both directions of the overlap at one timestep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overlap {
    /// input id → output ids
    pub forward: Correspondence,
    /// output id → input ids
    pub backward: Correspondence,
}

/// Computes the overlap of `input` against `output`.
///
/// Only the flat row-major order matters, so any dimensionality works as
/// long as both shapes match.
pub fn compute_overlap(input: &LabelVolume, output: &LabelVolume) -> Result<Overlap, ShapeMismatch> {
    if input.shape() != output.shape() {
        return Err(ShapeMismatch {
            input: input.shape().to_vec(),
            output: output.shape().to_vec(),
        });
    }

    let mut overlap = Overlap::default();
    for (&a, &b) in input.as_slice().iter().zip(output.as_slice()) {
        if a != BACKGROUND {
            overlap.forward.record(a, b);
        }
        if b != BACKGROUND {
            overlap.backward.record(b, a);
        }
    }
    Ok(overlap)
}
