//! Common types shared by the storage backends and the relabeling core.

use crate::error::VolumeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Object id inside a label volume.
pub type LabelId = u32;

/// Index of a frame in the time series.
pub type Timestep = u32;

/// Reserved id for "no object here". Never part of an id set or a mapping.
pub const BACKGROUND: LabelId = 0;

/// Which of the two labelings a volume belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolumeSource {
    /// The labeling the lineage graph was defined over
    Input,
    /// The labeling whose ids the lineage graph is rewritten into
    Output,
}

impl std::fmt::Display for VolumeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Input => write!(f, "input"),
            Self::Output => write!(f, "output"),
        }
    }
}

// ============================================================================
// LABEL VOLUME
// ============================================================================

/// An n-dimensional array of object ids, stored row-major.
///
/// The core never looks at the individual axes: two volumes are comparable
/// when their shapes are equal, and positions are compared by flat index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "VolumeDocument")]
pub struct LabelVolume {
    shape: Vec<usize>,
    data: Vec<LabelId>,
}

#[derive(Deserialize)]
struct VolumeDocument {
    shape: Vec<usize>,
    data: Vec<LabelId>,
}

impl TryFrom<VolumeDocument> for LabelVolume {
    type Error = VolumeError;

    fn try_from(doc: VolumeDocument) -> Result<Self, Self::Error> {
        LabelVolume::new(doc.shape, doc.data)
    }
}

impl LabelVolume {
    /// Create a volume from its shape and flat row-major buffer.
    pub fn new(shape: Vec<usize>, data: Vec<LabelId>) -> Result<Self, VolumeError> {
        let expected = shape.iter().product::<usize>();
        if data.len() != expected {
            return Err(VolumeError::Length {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { shape, data })
    }

    /// A volume of the given shape filled with background.
    pub fn background(shape: Vec<usize>) -> Self {
        let len = shape.iter().product::<usize>();
        Self {
            shape,
            data: vec![BACKGROUND; len],
        }
    }

    /// Extent along each axis.
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Flat row-major view of the ids.
    pub fn as_slice(&self) -> &[LabelId] {
        &self.data
    }

    /// Mutable flat view, for generators that paint objects into a volume.
    pub fn as_mut_slice(&mut self) -> &mut [LabelId] {
        &mut self.data
    }

    /// Number of positions.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The distinct non-background ids present, ascending.
    pub fn id_set(&self) -> BTreeSet<LabelId> {
        self.data
            .iter()
            .copied()
            .filter(|&id| id != BACKGROUND)
            .collect()
    }
}

// ============================================================================
// LINEAGE EVENTS
// ============================================================================

/// A transition of one object from `t-1` to `t`.
///
/// Serialized as a two-element row `[source, target]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[LabelId; 2]", into = "[LabelId; 2]")]
pub struct Move {
    pub source: LabelId,
    pub target: LabelId,
}

impl Move {
    pub fn new(source: LabelId, target: LabelId) -> Self {
        Self { source, target }
    }
}

impl From<[LabelId; 2]> for Move {
    fn from([source, target]: [LabelId; 2]) -> Self {
        Self { source, target }
    }
}

impl From<Move> for [LabelId; 2] {
    fn from(m: Move) -> Self {
        [m.source, m.target]
    }
}

/// A division of one object at `t-1` into two objects at `t`.
///
/// Serialized as a three-element row `[parent, first, second]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[LabelId; 3]", into = "[LabelId; 3]")]
pub struct Split {
    pub parent: LabelId,
    pub first: LabelId,
    pub second: LabelId,
}

impl Split {
    pub fn new(parent: LabelId, first: LabelId, second: LabelId) -> Self {
        Self {
            parent,
            first,
            second,
        }
    }

    /// Both daughters, in record order.
    pub fn children(&self) -> [LabelId; 2] {
        [self.first, self.second]
    }
}

impl From<[LabelId; 3]> for Split {
    fn from([parent, first, second]: [LabelId; 3]) -> Self {
        Self {
            parent,
            first,
            second,
        }
    }
}

impl From<Split> for [LabelId; 3] {
    fn from(s: Split) -> Self {
        [s.parent, s.first, s.second]
    }
}

/// An id whose correspondence set held `count` ids of the other labeling.
///
/// Persisted records take mergers from the output→input direction, where
/// `id` is an output object covering `count` input objects. Informational
/// only. Serialized as `[id, count]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct Merger {
    pub id: LabelId,
    pub count: u32,
}

impl From<[u32; 2]> for Merger {
    fn from([id, count]: [u32; 2]) -> Self {
        Self { id, count }
    }
}

impl From<Merger> for [u32; 2] {
    fn from(m: Merger) -> Self {
        [m.id, m.count]
    }
}

/// The lineage of one timestep as produced upstream, in input-id space.
///
/// Missing keys deserialize as empty lists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawLineage {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub moves: Vec<Move>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub splits: Vec<Split>,
}

impl RawLineage {
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty() && self.splits.is_empty()
    }
}

// ============================================================================
// PERSISTED RECORDS
// ============================================================================

/// Everything persisted for one timestep, in output-id space.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingRecord {
    pub timestep: Timestep,
    #[serde(default)]
    pub moves: Vec<Move>,
    #[serde(default)]
    pub splits: Vec<Split>,
    #[serde(default)]
    pub mergers: Vec<Merger>,
    #[serde(default)]
    pub appearances: Vec<LabelId>,
    #[serde(default)]
    pub disappearances: Vec<LabelId>,
}

impl TrackingRecord {
    pub fn new(timestep: Timestep) -> Self {
        Self {
            timestep,
            ..Default::default()
        }
    }
}

/// The list of output objects present at a timestep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub ids: Vec<LabelId>,
    /// One flag per id. Always 1; reserved for later invalidation.
    pub valid: Vec<u8>,
}

impl ObjectMeta {
    /// Meta for the given ids, all marked valid.
    pub fn from_ids(ids: impl IntoIterator<Item = LabelId>) -> Self {
        let ids: Vec<LabelId> = ids.into_iter().collect();
        let valid = vec![1; ids.len()];
        Self { ids, valid }
    }
}
