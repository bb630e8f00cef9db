//! Relabel command line harness
//!
//! Library half of the `relabel-gt` binary: the synthetic dataset
//! generator used by the `synth` subcommand and by end-to-end tests.

pub mod synth;

pub use synth::{export, generate, identity_pairs, SynthConfig};
