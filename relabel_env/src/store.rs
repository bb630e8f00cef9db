//! The storage backend contract seen by the relabeling core.

use crate::error::StoreError;
use crate::types::{LabelVolume, ObjectMeta, RawLineage, Timestep, TrackingRecord, VolumeSource};

/// Abstraction over wherever label images and lineage tables live.
///
/// # Implementations
///
/// - **Tests / generated data**: [`MemoryStore`](crate::MemoryStore)
/// - **Files on disk**: [`DirectoryStore`](crate::DirectoryStore)
///
/// All calls are synchronous and are made once per timestep, in timestep
/// order, by the reconciler.
pub trait LineageStore {
    /// Reads the label volume of `source` at `timestep`.
    ///
    /// # Returns
    /// * `Err(StoreError::NotFound)` - the timestep or the source is absent
    fn read_label_volume(
        &self,
        source: VolumeSource,
        timestep: Timestep,
    ) -> Result<LabelVolume, StoreError>;

    /// Reads the raw moves and splits whose destinations live at `timestep`.
    ///
    /// A timestep without lineage data yields an empty [`RawLineage`].
    fn read_lineage_events(&self, timestep: Timestep) -> Result<RawLineage, StoreError>;

    /// Persists the record for `timestep`, replacing any earlier one.
    fn write_tracking_record(
        &mut self,
        timestep: Timestep,
        record: &TrackingRecord,
    ) -> Result<(), StoreError>;

    /// Persists the object list for `timestep`, replacing any earlier one.
    fn write_object_meta(&mut self, timestep: Timestep, meta: &ObjectMeta)
        -> Result<(), StoreError>;

    /// Returns the last timestep with tracking in the lineage source, or the
    /// last input label volume when the source holds no tracking at all.
    fn last_timestep(&self) -> Result<Timestep, StoreError>;
}
