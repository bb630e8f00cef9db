//! JSON-on-disk implementation of [`LineageStore`].
//!
//! ```text
//! <input_lineage_source>/labels/<key>.json     input LabelVolume
//! <input_lineage_source>/tracking/<key>.json   RawLineage (optional per timestep)
//! <output_label_source>/<key>.json             output LabelVolume
//! <output_directory>/<NNNN>.tracking.json      TrackingRecord
//! <output_directory>/<NNNN>.meta.json          ObjectMeta
//! ```

use crate::error::StoreError;
use crate::key::TimestepKeyFormat;
use crate::store::LineageStore;
use crate::types::{LabelVolume, ObjectMeta, RawLineage, Timestep, TrackingRecord, VolumeSource};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

const LABELS_DIR: &str = "labels";
const TRACKING_DIR: &str = "tracking";

/// Where a [`DirectoryStore`] reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLayout {
    /// Where per-timestep records land
    pub output_directory: PathBuf,

    /// Root holding the input labels and the raw lineage
    pub input_lineage_source: PathBuf,

    /// Directory holding the output labels
    pub output_label_source: PathBuf,

    /// Rendering of timesteps as file stems in the two sources
    pub key_format: TimestepKeyFormat,
}

impl StoreLayout {
    pub fn new(
        output_directory: impl Into<PathBuf>,
        input_lineage_source: impl Into<PathBuf>,
        output_label_source: impl Into<PathBuf>,
    ) -> Self {
        Self {
            output_directory: output_directory.into(),
            input_lineage_source: input_lineage_source.into(),
            output_label_source: output_label_source.into(),
            key_format: TimestepKeyFormat::default(),
        }
    }

    pub fn with_key_format(mut self, key_format: TimestepKeyFormat) -> Self {
        self.key_format = key_format;
        self
    }

    /// Path of the label volume of `source` at `timestep`.
    pub fn volume_path(&self, source: VolumeSource, timestep: Timestep) -> PathBuf {
        let file = format!("{}.json", self.key_format.render(timestep));
        match source {
            VolumeSource::Input => self.input_lineage_source.join(LABELS_DIR).join(file),
            VolumeSource::Output => self.output_label_source.join(file),
        }
    }

    /// Path of the raw lineage at `timestep`.
    pub fn lineage_path(&self, timestep: Timestep) -> PathBuf {
        self.input_lineage_source
            .join(TRACKING_DIR)
            .join(format!("{}.json", self.key_format.render(timestep)))
    }

    /// Path of the persisted tracking record at `timestep`.
    pub fn record_path(&self, timestep: Timestep) -> PathBuf {
        self.output_directory
            .join(format!("{:04}.tracking.json", timestep))
    }

    /// Path of the persisted object meta at `timestep`.
    pub fn meta_path(&self, timestep: Timestep) -> PathBuf {
        self.output_directory.join(format!("{:04}.meta.json", timestep))
    }
}

/// Store reading and writing pretty-printed JSON documents.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    layout: StoreLayout,
}

impl DirectoryStore {
    pub fn new(layout: StoreLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &StoreLayout {
        &self.layout
    }

    /// Writes a label volume into its source directory.
    ///
    /// Used to lay out generated datasets.
    pub fn put_volume(
        &self,
        source: VolumeSource,
        timestep: Timestep,
        volume: &LabelVolume,
    ) -> Result<(), StoreError> {
        write_json(&self.layout.volume_path(source, timestep), volume)
    }

    /// Writes the raw lineage of a timestep into the lineage source.
    pub fn put_lineage(&self, timestep: Timestep, lineage: &RawLineage) -> Result<(), StoreError> {
        write_json(&self.layout.lineage_path(timestep), lineage)
    }

    /// Reads back a persisted record.
    pub fn load_record(&self, timestep: Timestep) -> Result<TrackingRecord, StoreError> {
        read_json(&self.layout.record_path(timestep))
    }

    /// Reads back a persisted object meta.
    pub fn load_meta(&self, timestep: Timestep) -> Result<ObjectMeta, StoreError> {
        read_json(&self.layout.meta_path(timestep))
    }

    fn keys_in(&self, dir: &Path) -> Result<Vec<Timestep>, StoreError> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StoreError::io(dir, e)),
        };

        let mut keys = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| StoreError::io(dir, e))?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(t) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(|s| self.layout.key_format.parse_key(s))
            {
                keys.push(t);
            }
        }
        Ok(keys)
    }
}

impl LineageStore for DirectoryStore {
    fn read_label_volume(
        &self,
        source: VolumeSource,
        timestep: Timestep,
    ) -> Result<LabelVolume, StoreError> {
        let path = self.layout.volume_path(source, timestep);
        if !path.exists() {
            return Err(StoreError::not_found(source, timestep));
        }
        read_json(&path)
    }

    fn read_lineage_events(&self, timestep: Timestep) -> Result<RawLineage, StoreError> {
        let path = self.layout.lineage_path(timestep);
        if !path.exists() {
            debug!("no lineage file for timestep {} ({})", timestep, path.display());
            return Ok(RawLineage::default());
        }
        read_json(&path)
    }

    fn write_tracking_record(
        &mut self,
        timestep: Timestep,
        record: &TrackingRecord,
    ) -> Result<(), StoreError> {
        write_json(&self.layout.record_path(timestep), record)
    }

    fn write_object_meta(
        &mut self,
        timestep: Timestep,
        meta: &ObjectMeta,
    ) -> Result<(), StoreError> {
        write_json(&self.layout.meta_path(timestep), meta)
    }

    fn last_timestep(&self) -> Result<Timestep, StoreError> {
        let root = &self.layout.input_lineage_source;
        let tracking = self.keys_in(&root.join(TRACKING_DIR))?;
        let keys = if tracking.is_empty() {
            self.keys_in(&root.join(LABELS_DIR))?
        } else {
            tracking
        };
        keys.into_iter().max().ok_or(StoreError::LineageEmpty)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let bytes = fs::read(path).map_err(|e| StoreError::io(path, e))?;
    serde_json::from_slice(&bytes).map_err(|source| StoreError::Serialization {
        path: path.to_path_buf(),
        source,
    })
}

/// Serializes `value` into a temp file next to `path`, then renames it over
/// the target.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir).map_err(|e| StoreError::io(dir, e))?;

    let mut json = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Serialization {
        path: path.to_path_buf(),
        source,
    })?;
    json.push(b'\n');

    let mut temp = tempfile::NamedTempFile::new_in(dir).map_err(|e| StoreError::io(dir, e))?;
    temp.write_all(&json).map_err(|e| StoreError::io(temp.path(), e))?;
    temp.persist(path)
        .map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}
