//! Relabel Core - Lineage Ground Truth in a New Identity Space
//!
//! Re-expresses an object lineage graph defined over one labeling in terms of
//! the ids of a second, spatially aligned labeling:
//! 1. **Overlap**: which ids of the other labeling share positions with each id
//! 2. **Collapse**: one representative per id (smallest id wins), merges flagged
//! 3. **Translate**: moves/splits rewritten, broken endpoints demoted to
//!    appearances/disappearances
//! 4. **Reconcile**: timesteps in order, previous mapping threaded forward

pub mod collapse;
pub mod error;
pub mod overlap;
pub mod reconcile;
pub mod translate;

// Re-export key types for convenience
pub use collapse::{collapse, Ambiguity, Collapsed, RepresentativePolicy, Resolution, ResolvedMapping};
pub use error::{IntegrityFault, RelabelError, ShapeMismatch};
pub use overlap::{compute_overlap, Correspondence, Overlap};
pub use reconcile::{reconcile_timestep, ReconcileConfig, Reconciler, RunSummary, TimestepSummary};
pub use translate::{translate, EventOutcome, OutcomeCounts, Translation};
