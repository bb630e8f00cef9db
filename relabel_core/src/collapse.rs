//! Id collapsing: one representative per source id.
//!
//! A correspondence maps a source id to a *set* of destination ids. The
//! collapser turns it into a total function:
//! - empty set → [`Resolution::Unresolved`]
//! - one id → that id
//! - several ids → the id picked by the [`RepresentativePolicy`], plus an
//!   [`Ambiguity`] record carrying the set's cardinality
//!
//! Ambiguity records are informational. They never change which
//! representative downstream rewriting sees.

use crate::overlap::{Correspondence, OverlapCounts};
use relabel_env::{LabelId, Merger};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// How to pick one destination id out of several overlapping ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepresentativePolicy {
    /// The numerically smallest id wins
    #[default]
    SmallestId,

    /// The id sharing the most positions wins; ties go to the smallest id
    LargestOverlap,
}

impl RepresentativePolicy {
    /// Chooses the representative among `candidates`, `None` if empty.
    pub fn choose(&self, candidates: &OverlapCounts) -> Option<LabelId> {
        match self {
            Self::SmallestId => candidates.keys().next().copied(),
            // Keys ascend and the incumbent survives equal counts, so ties keep the smallest id.
            Self::LargestOverlap => candidates
                .iter()
                .fold(None, |best: Option<(LabelId, u64)>, (&id, &count)| match best {
                    Some((_, best_count)) if best_count >= count => best,
                    _ => Some((id, count)),
                })
                .map(|(id, _)| id),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::SmallestId => "smallest_id",
            Self::LargestOverlap => "largest_overlap",
        }
    }
}

impl std::str::FromStr for RepresentativePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "smallest_id" | "smallest" | "min" => Ok(Self::SmallestId),
            "largest_overlap" | "overlap" => Ok(Self::LargestOverlap),
            _ => Err(format!(
                "Unknown policy: {}. Use 'smallest_id' or 'largest_overlap'",
                s
            )),
        }
    }
}

/// Outcome of resolving one source id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Resolution {
    Resolved(LabelId),
    Unresolved,
}

impl Resolution {
    /// The resolved id, if any.
    #[inline]
    pub fn id(self) -> Option<LabelId> {
        match self {
            Self::Resolved(id) => Some(id),
            Self::Unresolved => None,
        }
    }

    #[inline]
    pub fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved(_))
    }
}

/// Total function from the source id set to a single destination id or
/// [`Resolution::Unresolved`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedMapping {
    entries: BTreeMap<LabelId, Resolution>,
}

impl ResolvedMapping {
    /// Resolves `source`. Ids outside the domain are unresolved too.
    pub fn get(&self, source: LabelId) -> Resolution {
        self.entries
            .get(&source)
            .copied()
            .unwrap_or(Resolution::Unresolved)
    }

    /// Whether `source` belongs to the domain.
    pub fn contains(&self, source: LabelId) -> bool {
        self.entries.contains_key(&source)
    }

    /// Source ids, ascending.
    pub fn domain(&self) -> impl Iterator<Item = LabelId> + '_ {
        self.entries.keys().copied()
    }

    /// Distinct destination ids reached by the mapping, ascending.
    pub fn image(&self) -> BTreeSet<LabelId> {
        self.entries.values().filter_map(|r| r.id()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (LabelId, Resolution)> + '_ {
        self.entries.iter().map(|(&s, &r)| (s, r))
    }

    /// Number of unresolved source ids.
    pub fn unresolved_count(&self) -> usize {
        self.entries.values().filter(|r| !r.is_resolved()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(LabelId, Resolution)> for ResolvedMapping {
    fn from_iter<I: IntoIterator<Item = (LabelId, Resolution)>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

/// A source id that overlapped several destination ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ambiguity {
    pub source: LabelId,
    pub representative: LabelId,
    /// Size of the correspondence set (≥ 2)
    pub multiplicity: u32,
}

/// Result of collapsing one direction of an overlap.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collapsed {
    pub mapping: ResolvedMapping,
    /// One entry per ambiguous source id, ascending by source
    pub ambiguities: Vec<Ambiguity>,
}

impl Collapsed {
    /// `(source, multiplicity)` for each ambiguous source id.
    pub fn mergers(&self) -> Vec<Merger> {
        self.ambiguities
            .iter()
            .map(|a| Merger {
                id: a.source,
                count: a.multiplicity,
            })
            .collect()
    }
}

/// Collapses `correspondence` under `policy`.
pub fn collapse(correspondence: &Correspondence, policy: RepresentativePolicy) -> Collapsed {
    let mut collapsed = Collapsed::default();
    let mut entries = BTreeMap::new();

    for (&source, candidates) in correspondence.iter() {
        let resolution = match policy.choose(candidates) {
            Some(representative) => {
                if candidates.len() > 1 {
                    collapsed.ambiguities.push(Ambiguity {
                        source,
                        representative,
                        multiplicity: candidates.len() as u32,
                    });
                }
                Resolution::Resolved(representative)
            }
            None => Resolution::Unresolved,
        };
        entries.insert(source, resolution);
    }

    collapsed.mapping = ResolvedMapping { entries };
    collapsed
}
