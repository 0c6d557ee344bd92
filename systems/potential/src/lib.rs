#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Static potential fields that guide individuals toward exits.
//!
//! The [`PotentialSolver`] expands a wavefront from a group of exit cells over
//! any [`CellGraph`](evacsim_core::CellGraph) and produces an immutable
//! [`StaticPotential`]. Potentials are shared between many individuals through
//! `Arc` and collected in a [`PotentialManager`].

mod manager;
mod potential;
mod solver;

pub use manager::PotentialManager;
pub use potential::{PotentialEntry, StaticPotential, DEFAULT_ATTRACTIVITY};
pub use solver::{ExitGroup, PotentialSolver, SolverTuning};
