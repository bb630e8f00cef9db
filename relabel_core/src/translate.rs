//! Event translation: rewrites raw lineage from input-id space into
//! output-id space.
//!
//! Each endpoint of a raw event resolves through a [`ResolvedMapping`]
//! (sources through the previous timestep's mapping, destinations through
//! the current one) and the event is classified by which endpoints
//! resolved:
//!
//! | event | source | destinations | emitted                              |
//! |-------|--------|--------------|--------------------------------------|
//! | move  | ok     | ok           | Move                                  |
//! | move  | -      | ok           | Appearance(dst)                       |
//! | move  | ok     | -            | Disappearance(src)                    |
//! | move  | -      | -            | nothing                               |
//! | split | ok     | both ok      | Split                                 |
//! | split | ok     | some/none ok | Disappearance(src) + Move per ok dst  |
//! | split | -      | any          | Appearance per ok dst (or nothing)    |
//!
//! Afterwards, every current object no emitted Move/Split leads into
//! becomes an Appearance, and every previous object no emitted Move/Split
//! leaves from becomes a Disappearance.

use crate::collapse::{ResolvedMapping, Resolution};
use crate::error::IntegrityFault;
use relabel_env::{LabelId, Move, RawLineage, Split, BACKGROUND};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::{debug, warn};

/// How a single raw event was classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventOutcome {
    /// All endpoints resolved; emitted as the same kind of event
    Translated,
    /// Source unresolved; resolved destinations became appearances
    Appeared,
    /// Destinations unresolved; the source became a disappearance
    Vanished,
    /// Split lost a daughter; emitted as disappearance plus move
    Demoted,
    /// Nothing resolved; no trace left
    Dropped,
}

/// Per-outcome tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeCounts {
    pub translated: usize,
    pub appeared: usize,
    pub vanished: usize,
    pub demoted: usize,
    pub dropped: usize,
}

impl OutcomeCounts {
    pub fn add(&mut self, outcome: EventOutcome) {
        match outcome {
            EventOutcome::Translated => self.translated += 1,
            EventOutcome::Appeared => self.appeared += 1,
            EventOutcome::Vanished => self.vanished += 1,
            EventOutcome::Demoted => self.demoted += 1,
            EventOutcome::Dropped => self.dropped += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.translated + self.appeared + self.vanished + self.demoted + self.dropped
    }
}

/// Output-space events of one timestep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Translation {
    /// Translated moves, then moves demoted from splits, in raw order
    pub moves: Vec<Move>,
    pub splits: Vec<Split>,
    /// Ascending, each id at most once
    pub appearances: Vec<LabelId>,
    /// Ascending, each id at most once
    pub disappearances: Vec<LabelId>,
    /// One entry per raw move, then one per raw split
    pub outcomes: Vec<EventOutcome>,
}

impl Translation {
    pub fn outcome_counts(&self) -> OutcomeCounts {
        let mut counts = OutcomeCounts::default();
        for &outcome in &self.outcomes {
            counts.add(outcome);
        }
        counts
    }
}

/// Rejects raw records that point at background.
pub fn check_integrity(raw: &RawLineage) -> Result<(), IntegrityFault> {
    if let Some(m) = raw
        .moves
        .iter()
        .find(|m| m.source == BACKGROUND || m.target == BACKGROUND)
    {
        return Err(IntegrityFault {
            record: format!("move [{}, {}]", m.source, m.target),
        });
    }
    if let Some(s) = raw
        .splits
        .iter()
        .find(|s| [s.parent, s.first, s.second].contains(&BACKGROUND))
    {
        return Err(IntegrityFault {
            record: format!("split [{}, {}, {}]", s.parent, s.first, s.second),
        });
    }
    Ok(())
}

#[derive(Default)]
struct EventSink {
    moves: Vec<Move>,
    demoted_moves: Vec<Move>,
    splits: Vec<Split>,
    appearances: BTreeSet<LabelId>,
    disappearances: BTreeSet<LabelId>,
}

impl EventSink {
    fn classify_move(&mut self, prev: &ResolvedMapping, cur: &ResolvedMapping, raw: &Move) -> EventOutcome {
        match (prev.get(raw.source), cur.get(raw.target)) {
            (Resolution::Resolved(source), Resolution::Resolved(target)) => {
                self.moves.push(Move::new(source, target));
                EventOutcome::Translated
            }
            (Resolution::Unresolved, Resolution::Resolved(target)) => {
                debug!("move [{}, {}]: source unresolved, appearance {}", raw.source, raw.target, target);
                self.appearances.insert(target);
                EventOutcome::Appeared
            }
            (Resolution::Resolved(source), Resolution::Unresolved) => {
                debug!("move [{}, {}]: target unresolved, disappearance {}", raw.source, raw.target, source);
                self.disappearances.insert(source);
                EventOutcome::Vanished
            }
            (Resolution::Unresolved, Resolution::Unresolved) => {
                warn!("move [{}, {}]: no endpoint resolves, dropped", raw.source, raw.target);
                EventOutcome::Dropped
            }
        }
    }

    fn classify_split(&mut self, prev: &ResolvedMapping, cur: &ResolvedMapping, raw: &Split) -> EventOutcome {
        let children: Vec<LabelId> = raw
            .children()
            .iter()
            .filter_map(|&child| cur.get(child).id())
            .collect();

        match prev.get(raw.parent) {
            Resolution::Resolved(parent) if children.len() == 2 => {
                self.splits.push(Split::new(parent, children[0], children[1]));
                EventOutcome::Translated
            }
            Resolution::Resolved(parent) => {
                debug!(
                    "split [{}, {}, {}]: {} daughter(s) resolved, disappearance {}",
                    raw.parent, raw.first, raw.second, children.len(), parent
                );
                self.disappearances.insert(parent);
                for &child in &children {
                    self.demoted_moves.push(Move::new(parent, child));
                }
                if children.is_empty() {
                    EventOutcome::Vanished
                } else {
                    EventOutcome::Demoted
                }
            }
            Resolution::Unresolved if children.is_empty() => {
                warn!("split [{}, {}, {}]: no endpoint resolves, dropped", raw.parent, raw.first, raw.second);
                EventOutcome::Dropped
            }
            Resolution::Unresolved => {
                debug!("split [{}, {}, {}]: parent unresolved, appearance of {:?}", raw.parent, raw.first, raw.second, children);
                self.appearances.extend(children);
                EventOutcome::Appeared
            }
        }
    }

    /// Accounts for objects no emitted transition explains.
    fn sweep(&mut self, prev: &ResolvedMapping, cur: &ResolvedMapping) {
        let all_moves = self.moves.iter().chain(&self.demoted_moves);

        let mut targets: BTreeSet<LabelId> = BTreeSet::new();
        let mut sources: BTreeSet<LabelId> = BTreeSet::new();
        for m in all_moves {
            sources.insert(m.source);
            targets.insert(m.target);
        }
        for s in &self.splits {
            sources.insert(s.parent);
            targets.extend(s.children());
        }

        for id in cur.image() {
            if !targets.contains(&id) && self.appearances.insert(id) {
                debug!("object {} unexplained at this timestep, appearance", id);
            }
        }
        for id in prev.image() {
            if !sources.contains(&id) && self.disappearances.insert(id) {
                debug!("object {} unexplained at previous timestep, disappearance", id);
            }
        }
    }

    fn finish(mut self, outcomes: Vec<EventOutcome>) -> Translation {
        self.moves.append(&mut self.demoted_moves);
        Translation {
            moves: self.moves,
            splits: self.splits,
            appearances: self.appearances.into_iter().collect(),
            disappearances: self.disappearances.into_iter().collect(),
            outcomes,
        }
    }
}

/// Translates the raw lineage of a timestep.
///
/// # Arguments
/// * `prev` - input→output mapping of the previous timestep (sources)
/// * `cur` - input→output mapping of this timestep (destinations)
/// * `raw` - moves and splits in input-id space
///
/// # Returns
/// * `Err(IntegrityFault)` - a raw record references background
pub fn translate(
    prev: &ResolvedMapping,
    cur: &ResolvedMapping,
    raw: &RawLineage,
) -> Result<Translation, IntegrityFault> {
    check_integrity(raw)?;

    let mut sink = EventSink::default();
    let mut outcomes = Vec::with_capacity(raw.moves.len() + raw.splits.len());
    for m in &raw.moves {
        outcomes.push(sink.classify_move(prev, cur, m));
    }
    for s in &raw.splits {
        outcomes.push(sink.classify_split(prev, cur, s));
    }
    sink.sweep(prev, cur);

    Ok(sink.finish(outcomes))
}
