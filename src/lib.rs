//! # staggrid
//!
//! staggrid maps a spatially decomposed, block-structured grid of
//! face-centered (staggered) unknowns into a single distributed linear
//! system. It provides the degree-of-freedom numbering and partitioning over
//! a multi-rank patch level, the box algebra that computes the exact
//! geometric overlap between staggered data regions (including the
//! boundary-ownership rule that attributes a face lying exactly on a patch
//! boundary to one side only), and the communication schedules and
//! copy-in/copy-out machinery that connect patch data to a backend solver.
//!
//! ## Structure
//! - [`geometry`]: integer box algebra, staggered descriptors, fill patterns
//! - [`level`]: patches, patch levels, per-axis side data
//! - [`dof`]: global indices, ownership state, the level partitioner
//! - [`schedule`]: reusable data-synch and ghost-fill communication plans
//! - [`assembly`]: backend trait, reference serial backend, stencil
//!   providers, vector/matrix assembly
//! - [`solver`]: the level solver lifecycle
//! - [`comm`]: pluggable communication backends (serial, rank-per-thread,
//!   MPI behind `mpi-support`)
//!
//! ## Collective-call discipline
//! Schedule execution, DOF assignment, and the solver entry points are
//! collective: every rank of a level must call them in the same relative
//! order. Violations deadlock and are not detectable from inside the
//! library; this is a documented caller obligation.

pub mod assembly;
pub mod comm;
pub mod debug_invariants;
pub mod dof;
pub mod geometry;
pub mod grid_error;
pub mod level;
pub mod schedule;
pub mod solver;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude importing the most-used traits and types.
pub mod prelude {
    pub use crate::assembly::backend::{LinearBackend, SerialBackend, SolveStatus, SolverOptions};
    pub use crate::assembly::stencil::{PoissonStencil, StencilProvider};
    pub use crate::assembly::{assemble_matrix, copy_from_vec, copy_to_vec, setup_rhs};
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::comm::{Communicator, NoComm, RayonComm};
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::dof::{
        DofEntry, DofPartition, GlobalDof, assign_level_dofs, resolve_duplicate_dofs,
    };
    pub use crate::geometry::fill_pattern::{DefaultSidePattern, FillPattern, SideSynchPattern};
    pub use crate::geometry::region::Region;
    pub use crate::geometry::side::{SideGeometry, SideOverlap, baseline_overlap};
    pub use crate::grid_error::StagGridError;
    pub use crate::level::patch::{Patch, PatchId, PatchLevel};
    pub use crate::level::side_data::{LevelData, SideData};
    pub use crate::schedule::delta::{CopyDelta, Delta, DofIndexDelta};
    pub use crate::schedule::{SynchSchedule, build_data_synch_schedule, build_ghost_fill_schedule};
    pub use crate::solver::LevelSolver;
}
