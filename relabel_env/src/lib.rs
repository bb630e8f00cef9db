//! Relabel Environment Abstraction Layer
//!
//! This crate is the storage seam between the relabeling core and whatever
//! holds the label images and lineage tables. The core only ever talks to a
//! [`LineageStore`]:
//! - `read_label_volume(source, t)` for the input and output labelings
//! - `read_lineage_events(t)` for the raw moves/splits in input-id space
//! - `write_tracking_record(t, record)` / `write_object_meta(t, meta)`
//!
//! Two backends ship with the crate: [`MemoryStore`] for tests and
//! generated datasets, and [`DirectoryStore`] for JSON files on disk.
//!
//! # Example
//!
//! ```ignore
//! use relabel_env::{LineageStore, MemoryStore, VolumeSource};
//!
//! let store = MemoryStore::new();
//! let volume = store.read_label_volume(VolumeSource::Input, 0)?;
//! ```

mod directory;
mod error;
mod key;
mod memory;
mod store;
mod types;

pub use directory::{DirectoryStore, StoreLayout};
pub use error::{StoreError, VolumeError};
pub use key::TimestepKeyFormat;
pub use memory::MemoryStore;
pub use store::LineageStore;
pub use types::{
    LabelId, LabelVolume, Merger, Move, ObjectMeta, RawLineage, Split, Timestep, TrackingRecord,
    VolumeSource, BACKGROUND,
};
