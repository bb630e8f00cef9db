//! The timestep orchestrator.
//!
//! Walks `[start, end]` in order. Each timestep reads both volumes,
//! computes the overlap, collapses it in both directions, translates the
//! raw lineage against the previous timestep's mapping, and hands the
//! resulting record to the store. The current input→output mapping is then
//! carried forward as the next timestep's source mapping; it is the only
//! state that outlives a timestep.

use crate::collapse::{collapse, Ambiguity, RepresentativePolicy, ResolvedMapping};
use crate::error::RelabelError;
use crate::overlap::compute_overlap;
use crate::translate::{translate, OutcomeCounts};
use relabel_env::{
    LabelVolume, LineageStore, ObjectMeta, RawLineage, Timestep, TrackingRecord, VolumeSource,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Configuration for a [`Reconciler`] run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// First timestep processed (default: 0)
    pub start: Timestep,

    /// Last timestep processed, inclusive (default: last in the lineage source)
    pub end: Option<Timestep>,

    /// Tie-break among overlapping ids (default: smallest id)
    pub policy: RepresentativePolicy,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            start: 0,
            end: None,
            policy: RepresentativePolicy::SmallestId,
        }
    }
}

// ============================================================================
// SUMMARIES
// ============================================================================

/// What happened at one timestep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestepSummary {
    pub timestep: Timestep,
    pub input_objects: usize,
    pub output_objects: usize,
    /// Input objects overlapping no output object
    pub unresolved_inputs: usize,
    pub moves: usize,
    pub splits: usize,
    pub mergers: usize,
    pub appearances: usize,
    pub disappearances: usize,
    /// Input objects covering several output objects
    pub input_ambiguities: Vec<Ambiguity>,
    pub outcomes: OutcomeCounts,
}

/// What happened over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub start: Timestep,
    pub end: Timestep,
    pub policy: RepresentativePolicy,
    pub timesteps: Vec<TimestepSummary>,
}

impl RunSummary {
    /// Outcome tallies summed over all timesteps.
    pub fn outcomes(&self) -> OutcomeCounts {
        let mut total = OutcomeCounts::default();
        for t in &self.timesteps {
            total.translated += t.outcomes.translated;
            total.appeared += t.outcomes.appeared;
            total.vanished += t.outcomes.vanished;
            total.demoted += t.outcomes.demoted;
            total.dropped += t.outcomes.dropped;
        }
        total
    }
}

// ============================================================================
// SINGLE TIMESTEP
// ============================================================================

/// Everything one timestep produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestepOutput {
    pub record: TrackingRecord,
    pub meta: ObjectMeta,
    /// input→output mapping, the next timestep's source mapping
    pub mapping: ResolvedMapping,
    pub summary: TimestepSummary,
}

/// Reconciles one timestep without touching storage.
///
/// `previous` is `None` at the first timestep of a run: no translation
/// happens there and no appearance/disappearance sweep either. `raw` is
/// ignored in that case.
pub fn reconcile_timestep(
    timestep: Timestep,
    input: &LabelVolume,
    output: &LabelVolume,
    previous: Option<(&ResolvedMapping, &RawLineage)>,
    policy: RepresentativePolicy,
) -> Result<TimestepOutput, RelabelError> {
    let overlap = compute_overlap(input, output)
        .map_err(|source| RelabelError::ShapeMismatch { timestep, source })?;

    let forward = collapse(&overlap.forward, policy);
    let backward = collapse(&overlap.backward, policy);

    let mut record = TrackingRecord::new(timestep);

    // Output objects covering several input objects, keyed by the output id.
    record.mergers = backward.mergers();

    let mut outcomes = OutcomeCounts::default();
    if let Some((prev_map, raw)) = previous {
        let translation = translate(prev_map, &forward.mapping, raw)
            .map_err(|source| RelabelError::DataIntegrityFault { timestep, source })?;
        outcomes = translation.outcome_counts();
        record.moves = translation.moves;
        record.splits = translation.splits;
        record.appearances = translation.appearances;
        record.disappearances = translation.disappearances;
    }

    for a in &forward.ambiguities {
        debug!(
            "t={} input object {} covers {} output objects, representative {}",
            timestep, a.source, a.multiplicity, a.representative
        );
    }

    let meta = ObjectMeta::from_ids(output.id_set());

    let summary = TimestepSummary {
        timestep,
        input_objects: forward.mapping.len(),
        output_objects: meta.ids.len(),
        unresolved_inputs: forward.mapping.unresolved_count(),
        moves: record.moves.len(),
        splits: record.splits.len(),
        mergers: record.mergers.len(),
        appearances: record.appearances.len(),
        disappearances: record.disappearances.len(),
        input_ambiguities: forward.ambiguities,
        outcomes,
    };

    Ok(TimestepOutput {
        record,
        meta,
        mapping: forward.mapping,
        summary,
    })
}

// ============================================================================
// RECONCILER (The Orchestrator)
// ============================================================================

/// Drives a run over a [`LineageStore`].
pub struct Reconciler<S: LineageStore> {
    store: S,
    config: ReconcileConfig,
}

impl<S: LineageStore> Reconciler<S> {
    pub fn new(store: S, config: ReconcileConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Resolves the configured range against the store.
    pub fn range(&self) -> Result<(Timestep, Timestep), RelabelError> {
        let start = self.config.start;
        let end = match self.config.end {
            Some(end) => end,
            None => self.store.last_timestep().map_err(RelabelError::EndUnknown)?,
        };
        if start > end {
            return Err(RelabelError::InvalidRange { start, end });
        }
        Ok((start, end))
    }

    /// Processes every timestep of the range, persisting one record each.
    ///
    /// Stops at the first fault; records already written stay written.
    pub fn run(&mut self) -> Result<RunSummary, RelabelError> {
        let (start, end) = self.range()?;
        info!(
            "Reconciling timesteps {}..={} (policy {})",
            start,
            end,
            self.config.policy.name()
        );

        let mut summary = RunSummary {
            start,
            end,
            policy: self.config.policy,
            timesteps: Vec::new(),
        };

        let mut prev_map: Option<ResolvedMapping> = None;
        for timestep in start..=end {
            let output = match self.step(timestep, prev_map.take()) {
                Ok(output) => output,
                Err(e) => {
                    error!("Run aborted at timestep {}: {} ({})", timestep, e, e.kind());
                    return Err(e);
                }
            };

            let s = &output.summary;
            info!(
                "t={} | objects in={} out={} | moves={} splits={} app={} disapp={} mergers={}",
                timestep,
                s.input_objects,
                s.output_objects,
                s.moves,
                s.splits,
                s.appearances,
                s.disappearances,
                s.mergers
            );

            prev_map = Some(output.mapping);
            summary.timesteps.push(output.summary);
        }

        Ok(summary)
    }

    fn step(
        &mut self,
        timestep: Timestep,
        prev_map: Option<ResolvedMapping>,
    ) -> Result<TimestepOutput, RelabelError> {
        let storage = |source| RelabelError::Storage { timestep, source };

        let input = self
            .store
            .read_label_volume(VolumeSource::Input, timestep)
            .map_err(storage)?;
        let output = self
            .store
            .read_label_volume(VolumeSource::Output, timestep)
            .map_err(storage)?;

        let raw = match prev_map {
            Some(_) => self.store.read_lineage_events(timestep).map_err(storage)?,
            None => RawLineage::default(),
        };

        let result = reconcile_timestep(
            timestep,
            &input,
            &output,
            prev_map.as_ref().map(|m| (m, &raw)),
            self.config.policy,
        )?;

        self.store
            .write_tracking_record(timestep, &result.record)
            .map_err(storage)?;
        self.store
            .write_object_meta(timestep, &result.meta)
            .map_err(storage)?;

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collapse::Resolution;
    use relabel_env::{LabelId, MemoryStore, Merger, Move, Split, StoreError};

    fn volume(data: &[LabelId]) -> LabelVolume {
        LabelVolume::new(vec![data.len()], data.to_vec()).unwrap()
    }

    fn store_with(frames: &[(&[LabelId], &[LabelId])]) -> MemoryStore {
        let mut store = MemoryStore::new();
        for (t, (input, output)) in frames.iter().enumerate() {
            store.insert_volume(VolumeSource::Input, t as Timestep, volume(input));
            store.insert_volume(VolumeSource::Output, t as Timestep, volume(output));
        }
        store
    }

    fn run(store: MemoryStore, config: ReconcileConfig) -> (Result<RunSummary, RelabelError>, MemoryStore) {
        let mut reconciler = Reconciler::new(store, config);
        let result = reconciler.run();
        (result, reconciler.into_store())
    }

    #[test]
    fn test_object_vanishing_in_output() {
        // Input object 5 at t=0 and t=1; output object 9 covers it at t=0
        // and nothing is there at t=1.
        let mut store = store_with(&[(&[5, 5, 0], &[9, 9, 0]), (&[5, 5, 0], &[0, 0, 0])]);
        store.insert_lineage(1, RawLineage { moves: vec![Move::new(5, 5)], splits: vec![] });

        let (result, store) = run(store, ReconcileConfig::default());
        result.unwrap();

        let record = store.record(1).unwrap();
        assert_eq!(record.disappearances, vec![9]);
        assert!(record.moves.is_empty());
        assert!(record.appearances.is_empty());
        assert!(store.meta(1).unwrap().ids.is_empty());
    }

    #[test]
    fn test_split_losing_a_daughter() {
        // t=0: input 4 -> output 11. t=1: input 4 -> output 20, input 6 -> nothing.
        let mut store = store_with(&[
            (&[4, 4, 0, 0], &[11, 11, 0, 0]),
            (&[4, 4, 6, 6], &[20, 20, 0, 0]),
        ]);
        store.insert_lineage(1, RawLineage { moves: vec![], splits: vec![Split::new(4, 4, 6)] });

        let (result, store) = run(store, ReconcileConfig::default());
        let summary = result.unwrap();

        let record = store.record(1).unwrap();
        assert_eq!(record.disappearances, vec![11]);
        assert_eq!(record.moves, vec![Move::new(11, 20)]);
        assert!(record.splits.is_empty());
        assert!(record.appearances.is_empty());
        assert_eq!(summary.timesteps[1].outcomes.demoted, 1);
    }

    #[test]
    fn test_unreferenced_object_appears_once() {
        // Input 2 at t=1 maps onto 7, no raw event leads into it.
        let mut store = store_with(&[(&[1, 0, 0], &[3, 0, 0]), (&[1, 2, 2], &[3, 7, 7])]);
        store.insert_lineage(1, RawLineage { moves: vec![Move::new(1, 1)], splits: vec![] });

        let (result, store) = run(store, ReconcileConfig::default());
        result.unwrap();

        let record = store.record(1).unwrap();
        assert_eq!(record.moves, vec![Move::new(3, 3)]);
        assert_eq!(record.appearances, vec![7]);
        assert!(record.disappearances.is_empty());
    }

    #[test]
    fn test_first_timestep_has_no_transitions() {
        let mut store = store_with(&[(&[1, 2, 2], &[3, 3, 4])]);
        // Raw lineage at the start timestep is never consulted.
        store.insert_lineage(0, RawLineage { moves: vec![Move::new(0, 1)], splits: vec![] });

        let (result, store) = run(store, ReconcileConfig::default());
        result.unwrap();

        let record = store.record(0).unwrap();
        assert!(record.moves.is_empty());
        assert!(record.appearances.is_empty());
        assert!(record.disappearances.is_empty());
        // Output 3 covers inputs 1 and 2.
        assert_eq!(record.mergers, vec![Merger { id: 3, count: 2 }]);
        assert_eq!(store.meta(0).unwrap(), &ObjectMeta::from_ids([3, 4]));
    }

    #[test]
    fn test_meta_matches_output_ids() {
        let store = store_with(&[(&[1, 1, 0, 0], &[0, 5, 6, 0]), (&[0, 2, 2, 0], &[8, 0, 8, 9])]);
        let (result, store) = run(store, ReconcileConfig::default());
        result.unwrap();

        for t in 0..2 {
            let output = store.read_label_volume(VolumeSource::Output, t).unwrap();
            let ids: Vec<LabelId> = output.id_set().into_iter().collect();
            assert_eq!(store.meta(t).unwrap().ids, ids);
        }
    }

    #[test]
    fn test_rerun_is_identical() {
        let mut store = store_with(&[
            (&[1, 1, 2, 2], &[3, 3, 4, 4]),
            (&[1, 1, 2, 2], &[4, 4, 0, 5]),
            (&[1, 0, 2, 2], &[6, 0, 6, 6]),
        ]);
        store.insert_lineage(1, RawLineage { moves: vec![Move::new(1, 1), Move::new(2, 2)], splits: vec![] });
        store.insert_lineage(2, RawLineage { moves: vec![Move::new(1, 1)], splits: vec![Split::new(2, 1, 2)] });

        let (first, mut store) = run(store, ReconcileConfig::default());
        let first_records: Vec<String> = store
            .records()
            .map(|r| serde_json::to_string(r).unwrap())
            .collect();

        store.clear_outputs();
        let (second, store) = run(store, ReconcileConfig::default());
        let second_records: Vec<String> = store
            .records()
            .map(|r| serde_json::to_string(r).unwrap())
            .collect();

        assert_eq!(first.unwrap(), second.unwrap());
        assert_eq!(first_records, second_records);
        assert_eq!(first_records.len(), 3);
    }

    #[test]
    fn test_shape_mismatch_aborts() {
        let mut store = store_with(&[(&[1], &[1])]);
        store.insert_volume(VolumeSource::Input, 1, volume(&[1, 1]));
        store.insert_volume(VolumeSource::Output, 1, volume(&[1]));

        let (result, store) = run(store, ReconcileConfig::default());
        let err = result.unwrap_err();
        assert!(matches!(err, RelabelError::ShapeMismatch { timestep: 1, .. }));
        assert_eq!(err.timestep(), Some(1));
        assert!(store.record(0).is_some());
        assert!(store.record(1).is_none());
    }

    #[test]
    fn test_background_reference_aborts() {
        let mut store = store_with(&[(&[1], &[1]), (&[1], &[1]), (&[1], &[1])]);
        store.insert_lineage(1, RawLineage { moves: vec![Move::new(1, 0)], splits: vec![] });

        let (result, store) = run(store, ReconcileConfig::default());
        match result {
            Err(RelabelError::DataIntegrityFault { timestep, source }) => {
                assert_eq!(timestep, 1);
                assert_eq!(source.record, "move [1, 0]");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(store.record(1).is_none());
        assert!(store.record(2).is_none());
    }

    #[test]
    fn test_missing_volume_aborts() {
        let store = store_with(&[(&[1], &[1])]);
        let config = ReconcileConfig { end: Some(1), ..Default::default() };
        let (result, _) = run(store, config);
        let err = result.unwrap_err();
        assert!(matches!(
            err,
            RelabelError::Storage { timestep: 1, source: StoreError::NotFound { .. } }
        ));
        assert_eq!(err.kind(), "storage_not_found");
    }

    #[test]
    fn test_unbounded_end_stops_at_first_gap() {
        let store = store_with(&[(&[1], &[1])]);
        let config = ReconcileConfig { end: Some(Timestep::MAX), ..Default::default() };
        let (result, store) = run(store, config);
        assert!(matches!(
            result,
            Err(RelabelError::Storage { timestep: 1, source: StoreError::NotFound { .. } })
        ));
        assert!(store.record(0).is_some());
    }

    #[test]
    fn test_invalid_range() {
        let store = store_with(&[(&[1], &[1])]);
        let config = ReconcileConfig { start: 3, end: Some(1), ..Default::default() };
        let (result, _) = run(store, config);
        assert!(matches!(result, Err(RelabelError::InvalidRange { start: 3, end: 1 })));
    }

    #[test]
    fn test_end_defaults_to_last_timestep() {
        let store = store_with(&[(&[1], &[1]), (&[1], &[1]), (&[1], &[2])]);
        let reconciler = Reconciler::new(store, ReconcileConfig::default());
        assert_eq!(reconciler.range().unwrap(), (0, 2));

        let empty = Reconciler::new(MemoryStore::new(), ReconcileConfig::default());
        assert!(matches!(empty.range(), Err(RelabelError::EndUnknown(_))));
    }

    #[test]
    fn test_start_offset_skips_sweep() {
        let mut store = store_with(&[(&[1], &[1]), (&[1], &[1]), (&[2], &[7])]);
        store.insert_lineage(2, RawLineage { moves: vec![Move::new(1, 2)], splits: vec![] });

        let config = ReconcileConfig { start: 2, ..Default::default() };
        let (result, store) = run(store, config);
        assert_eq!(result.unwrap().timesteps.len(), 1);
        let record = store.record(2).unwrap();
        assert!(record.moves.is_empty());
        assert!(record.appearances.is_empty());
        assert!(store.record(1).is_none());
    }

    #[test]
    fn test_reconcile_timestep_exposes_mapping() {
        let input = volume(&[7, 7, 7, 0]);
        let output = volume(&[3, 3, 2, 0]);
        let out = reconcile_timestep(0, &input, &output, None, RepresentativePolicy::SmallestId).unwrap();
        assert_eq!(out.mapping.get(7), Resolution::Resolved(2));
        assert_eq!(out.summary.input_ambiguities.len(), 1);
        assert_eq!(out.summary.input_ambiguities[0].multiplicity, 2);
        assert!(out.record.mergers.is_empty());

        let largest = reconcile_timestep(0, &input, &output, None, RepresentativePolicy::LargestOverlap).unwrap();
        assert_eq!(largest.mapping.get(7), Resolution::Resolved(3));
    }
}
