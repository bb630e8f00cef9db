use proptest::prelude::*;
use relabel_cli::{export, generate, SynthConfig};
use relabel_core::{ReconcileConfig, Reconciler};
use relabel_env::{DirectoryStore, LineageStore, MemoryStore, StoreLayout, VolumeSource};
use std::fs;
use std::path::Path;

fn layout(root: &Path) -> StoreLayout {
    StoreLayout::new(root.join("gt"), root.join("input"), root.join("output"))
}

fn reconcile(store: MemoryStore) -> (relabel_core::RunSummary, MemoryStore) {
    let mut reconciler = Reconciler::new(store, ReconcileConfig::default());
    let summary = reconciler.run().expect("run succeeds");
    (summary, reconciler.into_store())
}

#[test]
fn test_directory_run_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let dataset = generate(&SynthConfig { timesteps: 6, ..Default::default() });
    let target = DirectoryStore::new(layout(dir.path()));
    export(&dataset, &target).unwrap();

    let snapshot = |store: &DirectoryStore| -> Vec<Vec<u8>> {
        (0..6)
            .flat_map(|t| {
                let l = store.layout();
                vec![
                    fs::read(l.record_path(t)).unwrap(),
                    fs::read(l.meta_path(t)).unwrap(),
                ]
            })
            .collect()
    };

    let mut first = Reconciler::new(target.clone(), ReconcileConfig::default());
    first.run().unwrap();
    let before = snapshot(first.store());

    let mut second = Reconciler::new(target, ReconcileConfig::default());
    second.run().unwrap();
    let after = snapshot(second.store());

    assert_eq!(before, after);
    assert_eq!(first.store().load_record(5).unwrap().timestep, 5);
}

#[test]
fn test_meta_lists_exactly_the_output_objects() {
    let (_, store) = reconcile(generate(&SynthConfig::default()));
    for t in 0..10 {
        let output = store.read_label_volume(VolumeSource::Output, t).unwrap();
        let ids: Vec<_> = output.id_set().into_iter().collect();
        let meta = store.meta(t).unwrap();
        assert_eq!(meta.ids, ids);
        assert_eq!(meta.valid.len(), ids.len());
    }
}

#[test]
fn test_partial_range_matches_full_run() {
    let dataset = generate(&SynthConfig { timesteps: 8, ..Default::default() });
    let (_, full) = reconcile(dataset.clone());

    let mut store = dataset;
    store.clear_outputs();
    let mut partial = Reconciler::new(store, ReconcileConfig { end: Some(4), ..Default::default() });
    partial.run().unwrap();
    let partial = partial.into_store();

    for t in 0..=4 {
        assert_eq!(full.record(t), partial.record(t));
    }
    assert!(partial.record(5).is_none());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_generated_runs_are_consistent(seed in any::<u64>()) {
        let config = SynthConfig {
            seed,
            timesteps: 6,
            width: 24,
            height: 24,
            objects: 4,
            split_rate: 0.2,
            drop_rate: 0.2,
            fuse_rate: 0.2,
            ..Default::default()
        };
        let dataset = generate(&config);
        let raw_events: Vec<usize> = (0..6)
            .map(|t| {
                let raw = dataset.read_lineage_events(t).unwrap();
                raw.moves.len() + raw.splits.len()
            })
            .collect();
        let (summary, store) = reconcile(dataset);

        for s in &summary.timesteps {
            let expected = if s.timestep == 0 { 0 } else { raw_events[s.timestep as usize] };
            prop_assert_eq!(s.outcomes.total(), expected);
        }

        for t in 1..6u32 {
            let record = store.record(t).unwrap();
            let now = store.read_label_volume(VolumeSource::Output, t).unwrap().id_set();
            let before = store.read_label_volume(VolumeSource::Output, t - 1).unwrap().id_set();
            for m in &record.moves {
                prop_assert!(before.contains(&m.source));
                prop_assert!(now.contains(&m.target));
            }
            for id in &record.appearances {
                prop_assert!(now.contains(id));
            }
            for id in &record.disappearances {
                prop_assert!(before.contains(id));
            }
            for merger in &record.mergers {
                prop_assert!(now.contains(&merger.id));
                prop_assert!(merger.count >= 2);
            }
        }
    }
}
