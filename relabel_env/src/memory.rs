//! In-process implementation of [`LineageStore`].

use crate::error::StoreError;
use crate::store::LineageStore;
use crate::types::{LabelVolume, ObjectMeta, RawLineage, Timestep, TrackingRecord, VolumeSource};
use std::collections::BTreeMap;

/// Store backed by ordered maps.
///
/// Used by the test suites and by the synthetic dataset generator. The
/// lineage source's last timestep is the last one holding raw lineage, or
/// the last input volume when there is no lineage at all.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    volumes: BTreeMap<(VolumeSource, Timestep), LabelVolume>,
    lineage: BTreeMap<Timestep, RawLineage>,
    records: BTreeMap<Timestep, TrackingRecord>,
    meta: BTreeMap<Timestep, ObjectMeta>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts (or replaces) a label volume.
    pub fn insert_volume(&mut self, source: VolumeSource, timestep: Timestep, volume: LabelVolume) {
        self.volumes.insert((source, timestep), volume);
    }

    /// Inserts (or replaces) the raw lineage of a timestep.
    pub fn insert_lineage(&mut self, timestep: Timestep, lineage: RawLineage) {
        self.lineage.insert(timestep, lineage);
    }

    /// The record written for `timestep`, if any.
    pub fn record(&self, timestep: Timestep) -> Option<&TrackingRecord> {
        self.records.get(&timestep)
    }

    /// The object meta written for `timestep`, if any.
    pub fn meta(&self, timestep: Timestep) -> Option<&ObjectMeta> {
        self.meta.get(&timestep)
    }

    /// All written records in timestep order.
    pub fn records(&self) -> impl Iterator<Item = &TrackingRecord> {
        self.records.values()
    }

    /// All stored volumes in (source, timestep) order.
    pub fn volumes(&self) -> impl Iterator<Item = (VolumeSource, Timestep, &LabelVolume)> {
        self.volumes.iter().map(|(&(s, t), v)| (s, t, v))
    }

    /// All stored raw lineage in timestep order.
    pub fn lineage(&self) -> impl Iterator<Item = (Timestep, &RawLineage)> {
        self.lineage.iter().map(|(&t, l)| (t, l))
    }

    /// Drops everything written by a previous run.
    pub fn clear_outputs(&mut self) {
        self.records.clear();
        self.meta.clear();
    }
}

impl LineageStore for MemoryStore {
    fn read_label_volume(
        &self,
        source: VolumeSource,
        timestep: Timestep,
    ) -> Result<LabelVolume, StoreError> {
        self.volumes
            .get(&(source, timestep))
            .cloned()
            .ok_or_else(|| StoreError::not_found(source, timestep))
    }

    fn read_lineage_events(&self, timestep: Timestep) -> Result<RawLineage, StoreError> {
        Ok(self.lineage.get(&timestep).cloned().unwrap_or_default())
    }

    fn write_tracking_record(
        &mut self,
        timestep: Timestep,
        record: &TrackingRecord,
    ) -> Result<(), StoreError> {
        self.records.insert(timestep, record.clone());
        Ok(())
    }

    fn write_object_meta(
        &mut self,
        timestep: Timestep,
        meta: &ObjectMeta,
    ) -> Result<(), StoreError> {
        self.meta.insert(timestep, meta.clone());
        Ok(())
    }

    fn last_timestep(&self) -> Result<Timestep, StoreError> {
        if let Some(&t) = self.lineage.keys().next_back() {
            return Ok(t);
        }
        self.volumes
            .keys()
            .filter(|(source, _)| *source == VolumeSource::Input)
            .map(|&(_, t)| t)
            .max()
            .ok_or(StoreError::LineageEmpty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_volume_is_not_found() {
        let store = MemoryStore::new();
        let err = store.read_label_volume(VolumeSource::Output, 3).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_missing_lineage_is_empty() {
        let store = MemoryStore::new();
        assert!(store.read_lineage_events(5).unwrap().is_empty());
    }

    #[test]
    fn test_last_timestep() {
        let mut store = MemoryStore::new();
        assert!(matches!(store.last_timestep(), Err(StoreError::LineageEmpty)));

        store.insert_volume(VolumeSource::Input, 2, LabelVolume::background(vec![1]));
        store.insert_volume(VolumeSource::Output, 9, LabelVolume::background(vec![1]));
        assert_eq!(store.last_timestep().unwrap(), 2);

        store.insert_lineage(4, RawLineage::default());
        assert_eq!(store.last_timestep().unwrap(), 4);
    }

    #[test]
    fn test_last_timestep_prefers_lineage_over_labels() {
        let mut store = MemoryStore::new();
        store.insert_lineage(2, RawLineage::default());
        store.insert_volume(VolumeSource::Input, 6, LabelVolume::background(vec![1]));
        assert_eq!(store.last_timestep().unwrap(), 2);
    }

    #[test]
    fn test_write_overwrites() {
        let mut store = MemoryStore::new();
        let mut record = TrackingRecord::new(1);
        store.write_tracking_record(1, &record).unwrap();
        record.appearances.push(3);
        store.write_tracking_record(1, &record).unwrap();
        assert_eq!(store.record(1).unwrap().appearances, vec![3]);
        assert_eq!(store.records().count(), 1);
    }
}
