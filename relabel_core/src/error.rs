//! Fault taxonomy of a relabeling run.
//!
//! Every variant is fatal for the run: later timesteps depend on the
//! mapping resolved at earlier ones, so nothing past a fault is written.
//! Endpoints that fail to resolve are not errors; they are reclassified
//! by [`translate`](crate::translate).

use relabel_env::{StoreError, Timestep};
use thiserror::Error;

/// The two volumes of a timestep are not positionally aligned.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("input shape {input:?} differs from output shape {output:?}")]
pub struct ShapeMismatch {
    pub input: Vec<usize>,
    pub output: Vec<usize>,
}

/// A raw lineage record references the background id.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("lineage record {record} references background")]
pub struct IntegrityFault {
    /// The offending record, rendered as its row
    pub record: String,
}

/// Errors that abort a run.
#[derive(Debug, Error)]
pub enum RelabelError {
    #[error("timestep {timestep}: {source}")]
    ShapeMismatch {
        timestep: Timestep,
        #[source]
        source: ShapeMismatch,
    },

    #[error("timestep {timestep}: data integrity fault: {source}")]
    DataIntegrityFault {
        timestep: Timestep,
        #[source]
        source: IntegrityFault,
    },

    #[error("timestep {timestep}: storage failure: {source}")]
    Storage {
        timestep: Timestep,
        #[source]
        source: StoreError,
    },

    /// No end timestep was configured and the lineage source can't supply one
    #[error("cannot determine last timestep: {0}")]
    EndUnknown(#[source] StoreError),

    #[error("invalid timestep range: start {start} > end {end}")]
    InvalidRange { start: Timestep, end: Timestep },
}

impl RelabelError {
    /// The timestep the run failed at, when the fault belongs to one.
    pub fn timestep(&self) -> Option<Timestep> {
        match self {
            Self::ShapeMismatch { timestep, .. }
            | Self::DataIntegrityFault { timestep, .. }
            | Self::Storage { timestep, .. } => Some(*timestep),
            Self::EndUnknown(_) | Self::InvalidRange { .. } => None,
        }
    }

    /// Short name of the fault kind, for reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ShapeMismatch { .. } => "shape_mismatch",
            Self::DataIntegrityFault { .. } => "data_integrity_fault",
            Self::Storage { source, .. } if source.is_not_found() => "storage_not_found",
            Self::Storage { .. } => "storage",
            Self::EndUnknown(_) => "end_unknown",
            Self::InvalidRange { .. } => "invalid_range",
        }
    }
}
