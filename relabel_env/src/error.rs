//! Error types for the relabel storage abstraction.

use crate::types::{Timestep, VolumeSource};
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while building a [`LabelVolume`](crate::LabelVolume).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VolumeError {
    /// The flat buffer does not hold exactly `product(shape)` values
    #[error("volume data holds {actual} values, shape requires {expected}")]
    Length { expected: usize, actual: usize },
}

/// Errors that can occur in a storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested timestep or source is absent
    #[error("{volume} label volume for timestep {timestep} not found")]
    NotFound {
        volume: VolumeSource,
        timestep: Timestep,
    },

    /// The lineage source holds no timesteps at all
    #[error("lineage source contains no timesteps")]
    LineageEmpty,

    /// Filesystem failure
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A stored document could not be encoded or decoded
    #[error("serialization error on {path}: {source}")]
    Serialization {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(volume: VolumeSource, timestep: Timestep) -> Self {
        Self::NotFound { volume, timestep }
    }

    /// Creates an I/O error tagged with the offending path.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns true when the error means "absent" rather than "broken".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::LineageEmpty)
    }
}
